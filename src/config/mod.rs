//! Application configuration

pub mod prompts;

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use prompts::Persona;

/// Where the conversation and mood slots are kept
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub data_dir: PathBuf,
    pub storage: StorageBackend,
    /// "gemini", "ollama" or "openai"
    pub provider: String,
    pub model: Option<String>,
    pub gemini_api_key: Option<String>,
    /// Override for proxies and tests
    pub gemini_base_url: Option<String>,
    pub ollama_url: Option<String>,
    pub openai_api_key: Option<String>,
    pub openai_base_url: Option<String>,
    pub retry_attempts: u32,
    pub retry_backoff_ms: u64,
    pub persona_file: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3000,
            data_dir: PathBuf::from("./data"),
            storage: StorageBackend::Sqlite,
            provider: "gemini".into(),
            model: None,
            gemini_api_key: None,
            gemini_base_url: None,
            ollama_url: None,
            openai_api_key: None,
            openai_base_url: None,
            retry_attempts: 3,
            retry_backoff_ms: 1000,
            persona_file: None,
        }
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        let defaults = Self::default();

        let storage = match env::var("CALM_STORAGE").ok().as_deref() {
            None | Some("sqlite") => StorageBackend::Sqlite,
            Some("memory") => StorageBackend::Memory,
            Some(other) => anyhow::bail!("Unsupported CALM_STORAGE backend: {other}"),
        };

        let retry_attempts = parse_var("CALM_RETRY_ATTEMPTS")?.unwrap_or(defaults.retry_attempts);
        if retry_attempts == 0 {
            anyhow::bail!("CALM_RETRY_ATTEMPTS must be at least 1");
        }

        Ok(Self {
            host: env::var("HOST").unwrap_or(defaults.host),
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            data_dir: env::var("CALM_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            storage,
            provider: env::var("CALM_PROVIDER").unwrap_or(defaults.provider),
            model: env::var("CALM_MODEL").ok(),
            gemini_api_key: env::var("GEMINI_API_KEY").ok(),
            gemini_base_url: env::var("GEMINI_BASE_URL").ok(),
            ollama_url: env::var("OLLAMA_URL").ok(),
            openai_api_key: env::var("OPENAI_API_KEY").ok(),
            openai_base_url: env::var("OPENAI_BASE_URL").ok(),
            retry_attempts,
            retry_backoff_ms: parse_var("CALM_RETRY_BACKOFF_MS")?.unwrap_or(defaults.retry_backoff_ms),
            persona_file: env::var("CALM_PERSONA_FILE").ok().map(PathBuf::from),
        })
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("calm.db")
    }
}

fn parse_var<T>(name: &str) -> anyhow::Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e| anyhow::anyhow!("Invalid {name}={raw}: {e}")),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_reply_policy() {
        let config = Config::default();
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.retry_backoff(), Duration::from_secs(1));
        assert_eq!(config.provider, "gemini");
        assert!(config.database_path().ends_with("calm.db"));
    }
}
