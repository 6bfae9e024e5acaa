//! Test utilities for ledgerlens-core
//!
//! A mock Ollama server for integration tests and offline development. It
//! answers `/api/generate` by echoing the question back, tagged with the model
//! name, and records every request it receives.

use std::collections::{BTreeMap, BTreeSet};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// A `/api/generate` request as received by the mock server
#[derive(Debug, Clone, Deserialize)]
pub struct RecordedRequest {
    pub model: String,
    pub prompt: String,
    #[serde(default)]
    pub system: Option<String>,
    #[serde(default)]
    pub stream: bool,
}

#[derive(Debug, Default)]
struct ServerState {
    requests: Vec<RecordedRequest>,
    failing: BTreeSet<String>,
    empty: BTreeSet<String>,
    delays: BTreeMap<String, Duration>,
}

type SharedState = Arc<Mutex<ServerState>>;

/// Mock Ollama server for testing and development
pub struct MockOllamaServer {
    addr: SocketAddr,
    state: SharedState,
    shutdown_tx: Option<oneshot::Sender<()>>,
}

impl MockOllamaServer {
    /// Start the mock server on an available port
    pub async fn start() -> Self {
        let state = SharedState::default();
        let app = Router::new()
            .route("/api/tags", get(handle_tags))
            .route("/api/generate", post(handle_generate))
            .with_state(state.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind mock server");
        let addr = listener.local_addr().expect("mock server address");

        let (shutdown_tx, shutdown_rx) = oneshot::channel();

        tokio::spawn(async move {
            let _ = axum::serve(listener, app)
                .with_graceful_shutdown(async {
                    shutdown_rx.await.ok();
                })
                .await;
        });

        Self {
            addr,
            state,
            shutdown_tx: Some(shutdown_tx),
        }
    }

    /// Get the base URL for this mock server
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Respond with HTTP 500 for `model`
    pub fn fail_model(&self, model: &str) {
        self.with_state(|s| {
            s.failing.insert(model.to_string());
        });
    }

    /// Respond with an empty completion for `model`
    pub fn empty_model(&self, model: &str) {
        self.with_state(|s| {
            s.empty.insert(model.to_string());
        });
    }

    /// Wait before responding for `model`
    pub fn delay_model(&self, model: &str, delay: Duration) {
        self.with_state(|s| {
            s.delays.insert(model.to_string(), delay);
        });
    }

    /// Requests received so far, oldest first
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state
            .lock()
            .map(|s| s.requests.clone())
            .unwrap_or_default()
    }

    /// Stop the mock server
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
    }

    fn with_state(&self, f: impl FnOnce(&mut ServerState)) {
        if let Ok(mut state) = self.state.lock() {
            f(&mut state);
        }
    }
}

impl Drop for MockOllamaServer {
    fn drop(&mut self) {
        self.stop();
    }
}

#[derive(Debug, Serialize)]
struct TagsResponse {
    models: Vec<ModelInfo>,
}

#[derive(Debug, Serialize)]
struct ModelInfo {
    name: String,
}

#[derive(Debug, Serialize)]
struct GenerateResponse {
    model: String,
    response: String,
    done: bool,
}

/// Ollama tags endpoint (health check)
async fn handle_tags() -> Json<TagsResponse> {
    Json(TagsResponse {
        models: ["mistral:latest", "llama3:latest"]
            .iter()
            .map(|name| ModelInfo {
                name: name.to_string(),
            })
            .collect(),
    })
}

/// Ollama generate endpoint
async fn handle_generate(
    State(state): State<SharedState>,
    Json(request): Json<RecordedRequest>,
) -> Response {
    let (failing, empty, delay) = match state.lock() {
        Ok(mut s) => {
            s.requests.push(request.clone());
            (
                s.failing.contains(&request.model),
                s.empty.contains(&request.model),
                s.delays.get(&request.model).copied(),
            )
        }
        Err(_) => return StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    };

    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }

    if failing {
        return (StatusCode::INTERNAL_SERVER_ERROR, "model failed to load").into_response();
    }

    let response = if empty {
        String::new()
    } else {
        format!("[{}] Answer to: {}", request.model, question_of(&request.prompt))
    };

    Json(GenerateResponse {
        model: request.model,
        response,
        done: true,
    })
    .into_response()
}

/// Text after the last "Question:" marker, or the whole prompt
fn question_of(prompt: &str) -> &str {
    prompt
        .rfind("Question:")
        .map(|i| prompt[i + "Question:".len()..].trim())
        .unwrap_or_else(|| prompt.trim())
}
