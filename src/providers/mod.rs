//! AI provider integrations

mod gemini;
mod ollama;
mod openai_compat;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::Config;

pub use gemini::GeminiProvider;
pub use ollama::OllamaProvider;
pub use openai_compat::{OpenAICompatConfig, OpenAICompatProvider};

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    /// 503 Service Unavailable. The only failure worth retrying.
    #[error("Model overloaded (503): {message}")]
    Overloaded { message: String },

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Request failed: {0}")]
    RequestFailed(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ProviderError {
    pub fn is_transient_overload(&self) -> bool {
        matches!(self, ProviderError::Overloaded { .. })
    }

    /// Classify a non-success HTTP status returned by a provider
    pub(crate) fn from_status(status: reqwest::StatusCode, message: String) -> Self {
        if status == reqwest::StatusCode::SERVICE_UNAVAILABLE {
            ProviderError::Overloaded { message }
        } else {
            ProviderError::Api {
                status: status.as_u16(),
                message,
            }
        }
    }
}

/// Something that turns a single composed prompt into text
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError>;

    fn name(&self) -> &str;
}

pub enum Provider {
    Gemini(GeminiProvider),
    Ollama(OllamaProvider),
    OpenAICompat(OpenAICompatProvider),
}

impl Provider {
    pub fn from_config(config: &Config) -> Result<Self, ProviderError> {
        match config.provider.to_lowercase().as_str() {
            "gemini" => {
                let api_key = config
                    .gemini_api_key
                    .clone()
                    .ok_or_else(|| ProviderError::NotConfigured("GEMINI_API_KEY is not set".into()))?;
                let mut provider = GeminiProvider::new(api_key)?;
                if let Some(model) = &config.model {
                    provider = provider.with_model(model.clone());
                }
                if let Some(base_url) = &config.gemini_base_url {
                    provider = provider.with_base_url(base_url.clone());
                }
                Ok(Provider::Gemini(provider))
            }
            "ollama" => {
                let url = config
                    .ollama_url
                    .clone()
                    .unwrap_or_else(|| "http://localhost:11434".into());
                let model = config.model.clone().unwrap_or_else(|| "llama3.2".into());
                Ok(Provider::Ollama(OllamaProvider::new(url, model)?))
            }
            "openai" => {
                let mut provider_config = match (&config.openai_api_key, &config.openai_base_url) {
                    (Some(api_key), _) => OpenAICompatConfig::openai(api_key.clone()),
                    // Keyless local servers (vLLM, LM Studio)
                    (None, Some(base_url)) => OpenAICompatConfig::local(
                        base_url.clone(),
                        config.model.clone().unwrap_or_else(|| "local-model".into()),
                    ),
                    (None, None) => {
                        return Err(ProviderError::NotConfigured(
                            "OPENAI_API_KEY or OPENAI_BASE_URL must be set".into(),
                        ))
                    }
                };
                if let Some(base_url) = &config.openai_base_url {
                    provider_config.base_url = base_url.clone();
                }
                if let Some(model) = &config.model {
                    provider_config.default_model = model.clone();
                }
                Ok(Provider::OpenAICompat(OpenAICompatProvider::new(provider_config)?))
            }
            other => Err(ProviderError::UnknownProvider(other.to_string())),
        }
    }
}

#[async_trait]
impl Generator for Provider {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        match self {
            Provider::Gemini(p) => p.generate(prompt).await,
            Provider::Ollama(p) => p.generate(prompt).await,
            Provider::OpenAICompat(p) => p.generate(prompt).await,
        }
    }

    fn name(&self) -> &str {
        match self {
            Provider::Gemini(p) => p.name(),
            Provider::Ollama(p) => p.name(),
            Provider::OpenAICompat(p) => p.name(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_only_503_is_transient() {
        let overloaded = ProviderError::from_status(StatusCode::SERVICE_UNAVAILABLE, "busy".into());
        assert!(overloaded.is_transient_overload());

        for status in [
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::INTERNAL_SERVER_ERROR,
            StatusCode::BAD_REQUEST,
        ] {
            let err = ProviderError::from_status(status, "nope".into());
            assert!(!err.is_transient_overload(), "{status} should not be retried");
        }
    }

    #[test]
    fn test_from_config_requires_keys() {
        let mut config = Config::default();
        config.provider = "gemini".into();
        assert!(matches!(
            Provider::from_config(&config),
            Err(ProviderError::NotConfigured(_))
        ));

        config.gemini_api_key = Some("key".into());
        let provider = Provider::from_config(&config).unwrap();
        assert_eq!(provider.name(), "gemini");

        config.provider = "claude-desktop".into();
        assert!(matches!(
            Provider::from_config(&config),
            Err(ProviderError::UnknownProvider(_))
        ));
    }

    #[test]
    fn test_openai_local_server_without_key() {
        let mut config = Config::default();
        config.provider = "openai".into();
        assert!(Provider::from_config(&config).is_err());

        config.openai_base_url = Some("http://localhost:1234/v1".into());
        let provider = Provider::from_config(&config).unwrap();
        assert_eq!(provider.name(), "openai");
    }

    #[test]
    fn test_ollama_needs_no_key() {
        let mut config = Config::default();
        config.provider = "Ollama".into();
        let provider = Provider::from_config(&config).unwrap();
        assert_eq!(provider.name(), "ollama");
    }
}
