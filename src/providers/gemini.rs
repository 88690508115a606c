//! Google Gemini provider (REST `generateContent`)

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{Generator, ProviderError};

const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

pub struct GeminiProvider {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
}

#[derive(Debug, Serialize)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<PartResponse>,
}

#[derive(Debug, Deserialize)]
struct PartResponse {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

impl GeminiProvider {
    pub fn new(api_key: impl Into<String>) -> Result<Self, ProviderError> {
        Self::with_timeout(api_key, Duration::from_secs(DEFAULT_TIMEOUT_SECS))
    }

    pub fn with_timeout(api_key: impl Into<String>, timeout: Duration) -> Result<Self, ProviderError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: BASE_URL.to_string(),
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

#[async_trait]
impl Generator for GeminiProvider {
    async fn generate(&self, prompt: &str) -> Result<String, ProviderError> {
        // Key goes in a header; reqwest errors echo the URL
        let url = format!("{}/{}:generateContent", self.base_url, self.model);

        let request = GenerateContentRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
        };

        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_status(status, error_message(&body)));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::InvalidResponse(format!("Failed to parse Gemini response: {e}")))?;

        Ok(extract_text(parsed))
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

/// Concatenate the text parts of the first candidate. No candidates yields an
/// empty string, which callers treat as an empty reply rather than an error.
fn extract_text(response: GenerateContentResponse) -> String {
    response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|content| {
            content
                .parts
                .into_iter()
                .filter_map(|p| p.text)
                .collect::<String>()
        })
        .unwrap_or_default()
}

fn error_message(body: &str) -> String {
    serde_json::from_str::<ErrorWrapper>(body)
        .map(|wrapper| {
            let msg = wrapper.error.message.unwrap_or_else(|| body.to_string());
            match wrapper.error.status {
                Some(status) if !status.is_empty() => format!("{status}: {msg}"),
                _ => msg,
            }
        })
        .unwrap_or_else(|_| body.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_text_joins_parts() {
        let response: GenerateContentResponse = serde_json::from_str(
            r#"{"candidates":[{"content":{"parts":[{"text":"I hear you. "},{"text":"🫂"}]}}]}"#,
        )
        .unwrap();
        assert_eq!(extract_text(response), "I hear you. 🫂");
    }

    #[test]
    fn test_extract_text_without_candidates_is_empty() {
        let response: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(extract_text(response), "");
    }

    #[test]
    fn test_error_message_prefers_status() {
        let body = r#"{"error":{"code":503,"message":"The model is overloaded.","status":"UNAVAILABLE"}}"#;
        assert_eq!(error_message(body), "UNAVAILABLE: The model is overloaded.");
        assert_eq!(error_message("plain text"), "plain text");
    }

    #[tokio::test]
    async fn test_503_maps_to_overloaded() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock(
                "POST",
                mockito::Matcher::Regex(r"^/gemini-2\.5-flash:generateContent".into()),
            )
            .match_header("x-goog-api-key", "test-key")
            .with_status(503)
            .with_body(r#"{"error":{"message":"The model is overloaded.","status":"UNAVAILABLE"}}"#)
            .create_async()
            .await;

        let provider = GeminiProvider::new("test-key").unwrap().with_base_url(server.url());
        let err = provider.generate("hello").await.unwrap_err();

        assert!(err.is_transient_overload());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_success_returns_text() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock(
                "POST",
                mockito::Matcher::Regex(r"^/gemini-2\.5-flash:generateContent".into()),
            )
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"candidates":[{"content":{"parts":[{"text":"That sounds heavy 💕"}]}}]}"#)
            .create_async()
            .await;

        let provider = GeminiProvider::new("test-key").unwrap().with_base_url(server.url());
        assert_eq!(provider.generate("hello").await.unwrap(), "That sounds heavy 💕");
    }

    #[tokio::test]
    async fn test_connection_error_does_not_leak_key() {
        let provider = GeminiProvider::new("SECRET-KEY-123")
            .unwrap()
            .with_base_url("http://127.0.0.1:1");

        let err = provider.generate("hello").await.unwrap_err();
        let logged = format!("Error calling {}: {}", provider.name(), err);

        assert!(matches!(err, ProviderError::RequestFailed(_)));
        assert!(!logged.contains("SECRET-KEY-123"), "{logged}");
    }

    #[tokio::test]
    async fn test_hung_server_times_out() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        // Accept connections and never answer
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let provider = GeminiProvider::with_timeout("test-key", Duration::from_millis(200))
            .unwrap()
            .with_base_url(format!("http://{addr}"));

        match provider.generate("hello").await.unwrap_err() {
            ProviderError::RequestFailed(e) => assert!(e.is_timeout()),
            other => panic!("unexpected error: {other}"),
        }
        server.abort();
    }
}
