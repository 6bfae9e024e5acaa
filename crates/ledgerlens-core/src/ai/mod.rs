//! Pluggable local model client abstraction
//!
//! # Architecture
//!
//! - `ModelClient` trait: sends a composed prompt to one backend model
//! - `AIClient` enum: concrete wrapper providing Clone + compile-time dispatch
//! - Implementations: `OllamaClient` (HTTP), `MockClient` (scripted, for tests)
//!
//! Clients only transport text. Timeouts, fallback and output validation all
//! live in the [`ModelRouter`](crate::router::ModelRouter).
//!
//! # Configuration
//!
//! Environment variables:
//! - `AI_BACKEND`: Client to use (ollama, mock). Default: ollama
//! - `OLLAMA_HOST`: Ollama server URL (required for the ollama client)

mod mock;
mod ollama;

pub use mock::{MockCall, MockClient, MockReply, DEFAULT_MOCK_REPLY};
pub use ollama::OllamaClient;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;
use crate::prompts::ComposedPrompt;

/// Text generation against a named backend model
#[async_trait]
pub trait ModelClient: Send + Sync {
    /// Generate a completion for `prompt` using the model `backend_id`
    ///
    /// `timeout` is a hint for the transport; callers enforce their own bound
    /// as well.
    async fn generate(
        &self,
        prompt: &ComposedPrompt,
        backend_id: &str,
        timeout: Duration,
    ) -> Result<String>;

    /// Check if the model runtime is reachable
    async fn health_check(&self) -> bool;

    /// Host URL (for logging)
    fn host(&self) -> &str;
}

/// Concrete model client enum
#[derive(Debug, Clone)]
pub enum AIClient {
    /// Ollama runtime (HTTP API)
    Ollama(OllamaClient),
    /// Scripted client for tests and offline demos
    Mock(MockClient),
}

impl AIClient {
    /// Create a client from environment variables
    ///
    /// Returns None if the selected client needs a variable that is not set.
    pub fn from_env() -> Option<Self> {
        let backend = std::env::var("AI_BACKEND").unwrap_or_else(|_| "ollama".to_string());

        match backend.to_lowercase().as_str() {
            "ollama" => OllamaClient::from_env().map(AIClient::Ollama),
            "mock" => Some(AIClient::Mock(MockClient::new())),
            _ => {
                tracing::warn!(backend = %backend, "Unknown AI_BACKEND, falling back to ollama");
                OllamaClient::from_env().map(AIClient::Ollama)
            }
        }
    }

    pub fn ollama(host: &str) -> Self {
        AIClient::Ollama(OllamaClient::new(host))
    }

    pub fn mock() -> Self {
        AIClient::Mock(MockClient::new())
    }
}

#[async_trait]
impl ModelClient for AIClient {
    async fn generate(
        &self,
        prompt: &ComposedPrompt,
        backend_id: &str,
        timeout: Duration,
    ) -> Result<String> {
        match self {
            AIClient::Ollama(c) => c.generate(prompt, backend_id, timeout).await,
            AIClient::Mock(c) => c.generate(prompt, backend_id, timeout).await,
        }
    }

    async fn health_check(&self) -> bool {
        match self {
            AIClient::Ollama(c) => c.health_check().await,
            AIClient::Mock(c) => c.health_check().await,
        }
    }

    fn host(&self) -> &str {
        match self {
            AIClient::Ollama(c) => c.host(),
            AIClient::Mock(c) => c.host(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_ai_client_delegates_to_mock() {
        let client = AIClient::Mock(MockClient::new().with_text("mistral", "Hello"));
        let prompt = ComposedPrompt::user_only("hi");

        let text = client
            .generate(&prompt, "mistral", Duration::from_secs(1))
            .await
            .unwrap();
        assert_eq!(text, "Hello");
        assert!(client.health_check().await);
        assert_eq!(client.host(), "mock://localhost");
    }

    #[test]
    fn test_ollama_constructor_trims_host() {
        let client = AIClient::ollama("http://localhost:11434/");
        assert_eq!(client.host(), "http://localhost:11434");
    }
}
