//! Calm AI - a mood-aware chat companion
//!
//! Serves a small local API for a chat front end: pick a mood, send a
//! message, get a warm reply from a remote LLM. The conversation and mood are
//! kept in local storage and restored on startup.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod conversation;
mod core;
mod providers;
mod routes;

use crate::config::{Config, Persona, StorageBackend};
use crate::core::{
    Companion, ConversationStore, MemoryStorage, ReplyService, RetryPolicy, SqliteStorage, Storage,
};
use crate::providers::{Generator, Provider};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub companion: Arc<Companion>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "calm_ai=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;

    let storage: Arc<dyn Storage> = match config.storage {
        StorageBackend::Sqlite => Arc::new(SqliteStorage::new(&config.database_path()).await?),
        StorageBackend::Memory => {
            tracing::warn!("Using in-memory storage; the conversation will not survive a restart");
            Arc::new(MemoryStorage::new())
        }
    };
    let store = ConversationStore::hydrate(storage).await;

    let persona = match &config.persona_file {
        Some(path) => Persona::load_from_file(path).await?,
        None => Persona::calm_ai(),
    };

    let provider = Provider::from_config(&config)?;
    tracing::info!("🤖 Replying as {} via {}", persona.name, provider.name());

    let replies = ReplyService::new(
        Arc::new(provider),
        persona,
        RetryPolicy::new(config.retry_attempts, config.retry_backoff()),
    );

    let state = AppState {
        companion: Arc::new(Companion::new(store, replies)),
    };

    let app = Router::new()
        .merge(routes::router())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    tracing::info!("🌸 Calm AI running at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
