//! Ollama client implementation
//!
//! Posts to `/api/generate` with streaming disabled. The backend identifier is
//! passed straight through as the Ollama model name.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::Result;
use crate::prompts::ComposedPrompt;

use super::ModelClient;

/// HTTP client for a local Ollama runtime
#[derive(Debug, Clone)]
pub struct OllamaClient {
    http_client: Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create from `OLLAMA_HOST`
    pub fn from_env() -> Option<Self> {
        let host = std::env::var("OLLAMA_HOST").ok()?;
        if host.trim().is_empty() {
            return None;
        }
        Some(Self::new(&host))
    }
}

/// Request to Ollama API
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<&'a str>,
    stream: bool,
}

/// Response from Ollama API
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[async_trait]
impl ModelClient for OllamaClient {
    async fn generate(
        &self,
        prompt: &ComposedPrompt,
        backend_id: &str,
        timeout: Duration,
    ) -> Result<String> {
        let request = GenerateRequest {
            model: backend_id,
            prompt: &prompt.user,
            system: (!prompt.system.is_empty()).then_some(prompt.system.as_str()),
            stream: false,
        };

        let response = self
            .http_client
            .post(format!("{}/api/generate", self.base_url))
            .timeout(timeout)
            .json(&request)
            .send()
            .await?
            .error_for_status()?;

        let body: GenerateResponse = response.json().await?;
        debug!(backend = %backend_id, chars = body.response.len(), "Ollama response received");

        Ok(body.response)
    }

    async fn health_check(&self) -> bool {
        match self
            .http_client
            .get(format!("{}/api/tags", self.base_url))
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    fn host(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::test_utils::MockOllamaServer;

    #[tokio::test]
    async fn test_generate_against_mock_server() {
        let server = MockOllamaServer::start().await;
        let client = OllamaClient::new(&server.url());
        let prompt = ComposedPrompt {
            system: "You are terse.".to_string(),
            user: "Question: What is my top category?".to_string(),
        };

        let text = client
            .generate(&prompt, "mistral", Duration::from_secs(5))
            .await
            .unwrap();

        assert!(text.contains("mistral"));
        assert!(text.contains("What is my top category?"));
        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model, "mistral");
        assert_eq!(requests[0].system.as_deref(), Some("You are terse."));
        assert!(!requests[0].stream);
    }

    #[tokio::test]
    async fn test_system_omitted_when_empty() {
        let server = MockOllamaServer::start().await;
        let client = OllamaClient::new(&server.url());

        client
            .generate(
                &ComposedPrompt::user_only("hello"),
                "llama3",
                Duration::from_secs(5),
            )
            .await
            .unwrap();

        assert_eq!(server.requests()[0].system, None);
    }

    #[tokio::test]
    async fn test_error_status_is_an_error() {
        let server = MockOllamaServer::start().await;
        server.fail_model("broken");
        let client = OllamaClient::new(&server.url());

        let result = client
            .generate(&ComposedPrompt::user_only("hi"), "broken", Duration::from_secs(5))
            .await;
        assert!(matches!(result, Err(Error::Http(_))));
    }

    #[tokio::test]
    async fn test_health_check() {
        let server = MockOllamaServer::start().await;
        assert!(OllamaClient::new(&server.url()).health_check().await);

        // Nothing listens on port 9 of localhost in the test environment
        assert!(!OllamaClient::new("http://127.0.0.1:9").health_check().await);
    }
}
