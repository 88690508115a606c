//! Ollama provider implementation

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{Generator, ProviderError};

/// Local models can be slow to load on first use
const DEFAULT_TIMEOUT_SECS: u64 = 300;

pub struct OllamaProvider {
    client: Client,
    base_url: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct OllamaResponse {
    #[serde(default)]
    response: String,
}

impl OllamaProvider {
    pub fn new(base_url: String, model: String) -> Result<Self, ProviderError> {
        Self::with_timeout(base_url, model, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(base_url: String, model: String, timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url,
            model,
        })
    }
}

#[async_trait]
impl Generator for OllamaProvider {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        let request = OllamaRequest {
            model: &self.model,
            prompt,
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, body));
        }

        let ollama_response: OllamaResponse = response.json().await?;

        Ok(ollama_response.response)
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_generate_reads_response_field() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/generate")
            .match_body(mockito::Matcher::PartialJson(serde_json::json!({
                "model": "llama3.2",
                "stream": false
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"model":"llama3.2","response":"I'm right here with you ✨","done":true}"#)
            .create_async()
            .await;

        let provider = OllamaProvider::new(server.url(), "llama3.2".into()).unwrap();
        let text = provider.generate("User: hi").await.unwrap();

        assert_eq!(text, "I'm right here with you ✨");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_model_not_found_is_not_transient() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/generate")
            .with_status(404)
            .with_body(r#"{"error":"model 'nope' not found"}"#)
            .create_async()
            .await;

        let provider = OllamaProvider::new(server.url(), "nope".into()).unwrap();
        let err = provider.generate("hi").await.unwrap_err();

        assert!(matches!(err, ProviderError::Api { status: 404, .. }));
        assert!(!err.is_transient_overload());
    }

    #[tokio::test]
    async fn test_unresponsive_server_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let provider = OllamaProvider::with_timeout(
            format!("http://{addr}"),
            "llama3.2".into(),
            Duration::from_millis(200),
        )
        .unwrap();

        let err = provider.generate("hi").await.unwrap_err();
        assert!(matches!(&err, ProviderError::RequestFailed(e) if e.is_timeout()), "{err}");
        assert!(!err.is_transient_overload());
        server.abort();
    }
}
