//! API routes

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::conversation::Mood;
use crate::core::{Exchange, SessionError, Snapshot, StoreError};
use crate::AppState;

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

#[derive(Debug, Serialize)]
struct MoodOption {
    mood: Mood,
    emoji: &'static str,
    title: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub message: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct MoodRequest {
    pub mood: Mood,
}

#[derive(Debug, Deserialize)]
pub struct ClearParams {
    #[serde(default)]
    pub confirm: bool,
}

/// Error body returned to clients
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({
                "error": self.message,
                "code": self.code,
            })),
        )
            .into_response()
    }
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        let (status, code) = match &err {
            SessionError::EmptyMessage => (StatusCode::BAD_REQUEST, "EMPTY_MESSAGE"),
            SessionError::Busy => (StatusCode::CONFLICT, "REPLY_IN_PROGRESS"),
            SessionError::Store(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            SessionError::Task(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        };
        Self {
            status,
            code,
            message: err.to_string(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        tracing::error!("Storage failure: {}", err);
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "STORAGE_ERROR",
            message: err.to_string(),
        }
    }
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn moods() -> Json<Vec<MoodOption>> {
    Json(
        Mood::ALL
            .iter()
            .map(|mood| MoodOption {
                mood: *mood,
                emoji: mood.emoji(),
                title: mood.title(),
            })
            .collect(),
    )
}

async fn conversation(State(state): State<AppState>) -> Json<Snapshot> {
    Json(state.companion.snapshot().await)
}

async fn send_message(
    State(state): State<AppState>,
    Json(request): Json<SendRequest>,
) -> Result<(StatusCode, Json<Exchange>), ApiError> {
    let exchange = state.companion.send(&request.message).await?;
    Ok((StatusCode::CREATED, Json(exchange)))
}

async fn set_mood(
    State(state): State<AppState>,
    Json(request): Json<MoodRequest>,
) -> Result<Json<MoodRequest>, ApiError> {
    state.companion.set_mood(request.mood).await?;
    Ok(Json(request))
}

async fn clear_conversation(
    State(state): State<AppState>,
    Query(params): Query<ClearParams>,
) -> Result<StatusCode, ApiError> {
    if !params.confirm {
        return Err(ApiError {
            status: StatusCode::PRECONDITION_REQUIRED,
            code: "CONFIRMATION_REQUIRED",
            message: "Are you sure you want to clear all messages? Repeat with ?confirm=true".into(),
        });
    }

    state.companion.clear().await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/v1/moods", get(moods))
        .route(
            "/v1/conversation",
            get(conversation).delete(clear_conversation),
        )
        .route("/v1/messages", post(send_message))
        .route("/v1/mood", put(set_mood))
}
