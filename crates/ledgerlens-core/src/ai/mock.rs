//! Mock client for testing
//!
//! Replies are scripted per backend. Unscripted backends answer with
//! [`DEFAULT_MOCK_REPLY`]. Every call is recorded so tests can assert on which
//! backends were tried.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::prompts::ComposedPrompt;

use super::ModelClient;

/// Reply for backends without a script
pub const DEFAULT_MOCK_REPLY: &str = "Mock insight: spending looks stable.";

/// Scripted outcome for one backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockReply {
    Text(String),
    /// Fails as a transport error would
    Error(String),
}

#[derive(Debug, Clone)]
struct Script {
    reply: MockReply,
    delay: Duration,
}

/// Mock model client
#[derive(Debug, Clone, Default)]
pub struct MockClient {
    scripts: BTreeMap<String, Script>,
    healthy: bool,
    calls: Arc<Mutex<Vec<MockCall>>>,
}

/// One recorded `generate` call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockCall {
    pub backend: String,
    pub prompt: ComposedPrompt,
}

impl MockClient {
    /// Healthy client answering every backend with the default reply
    pub fn new() -> Self {
        Self {
            healthy: true,
            ..Self::default()
        }
    }

    pub fn unhealthy() -> Self {
        Self::default()
    }

    pub fn with_text(self, backend: &str, text: &str) -> Self {
        self.with_reply(backend, MockReply::Text(text.to_string()))
    }

    pub fn with_error(self, backend: &str, message: &str) -> Self {
        self.with_reply(backend, MockReply::Error(message.to_string()))
    }

    pub fn with_reply(mut self, backend: &str, reply: MockReply) -> Self {
        self.scripts
            .entry(backend.to_string())
            .and_modify(|s| s.reply = reply.clone())
            .or_insert(Script {
                reply,
                delay: Duration::ZERO,
            });
        self
    }

    /// Sleep before replying, e.g. to trip the router timeout
    pub fn with_delay(mut self, backend: &str, delay: Duration) -> Self {
        self.scripts
            .entry(backend.to_string())
            .and_modify(|s| s.delay = delay)
            .or_insert(Script {
                reply: MockReply::Text(DEFAULT_MOCK_REPLY.to_string()),
                delay,
            });
        self
    }

    /// Calls received so far, oldest first
    pub fn calls(&self) -> Vec<MockCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Backends called so far, oldest first
    pub fn called_backends(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.backend).collect()
    }
}

#[async_trait]
impl ModelClient for MockClient {
    async fn generate(
        &self,
        prompt: &ComposedPrompt,
        backend_id: &str,
        _timeout: Duration,
    ) -> Result<String> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(MockCall {
                backend: backend_id.to_string(),
                prompt: prompt.clone(),
            });
        }

        let (reply, delay) = match self.scripts.get(backend_id) {
            Some(script) => (script.reply.clone(), script.delay),
            None => (MockReply::Text(DEFAULT_MOCK_REPLY.to_string()), Duration::ZERO),
        };

        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        match reply {
            MockReply::Text(text) => Ok(text),
            MockReply::Error(message) => Err(Error::Backend(message)),
        }
    }

    async fn health_check(&self) -> bool {
        self.healthy
    }

    fn host(&self) -> &str {
        "mock://localhost"
    }
}
