//! Model router
//!
//! Sends a composed prompt to the primary backend and, if that attempt fails,
//! exactly once to the secondary. Every attempt is bounded by the configured
//! timeout and its output is validated before it is accepted.
//!
//! Dispatch is driven by [`RouterState`], a small state machine:
//!
//! ```text
//! Idle --Dispatch--> Dispatched(1) --Accepted--> Success
//!   |                     |
//!   |                     +--Rejected(fallback)--> RetryWith --Dispatch--> Dispatched(2)
//!   |                     +--Rejected(none)------> Failed
//!   +--NoBackends--> Failed                  Dispatched(2) --Accepted--> Success
//!                                            Dispatched(2) --Rejected--> Failed
//! ```
//!
//! Failures are reported in the returned [`ModelResponse`]; dispatch itself
//! never errors.

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info, warn};

use crate::ai::ModelClient;
use crate::config::RouterConfig;
use crate::error::{Error, Result};
use crate::models::{AttemptOutcome, AttemptRecord, FailureReason, ModelResponse};
use crate::prompts::ComposedPrompt;

/// Primary plus one fallback
const MAX_ATTEMPTS: u8 = 2;

/// Where a dispatch currently stands
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterState {
    Idle,
    Dispatched { backend: String, attempt: u8 },
    RetryWith { backend: String },
    Success { backend: String },
    Failed,
}

/// Input to [`RouterState::next`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouterEvent {
    /// Send the prompt to `backend`
    Dispatch(String),
    /// The current attempt produced usable text
    Accepted,
    /// The current attempt failed; `fallback` names the backend to retry with
    Rejected {
        reason: FailureReason,
        fallback: Option<String>,
    },
    /// Nothing is configured to dispatch to
    NoBackends,
}

impl RouterState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RouterState::Success { .. } | RouterState::Failed)
    }

    /// Pure transition function
    pub fn next(self, event: RouterEvent) -> Result<RouterState> {
        match (self, event) {
            (RouterState::Idle, RouterEvent::Dispatch(backend)) => Ok(RouterState::Dispatched {
                backend,
                attempt: 1,
            }),
            (RouterState::Idle, RouterEvent::NoBackends) => Ok(RouterState::Failed),

            (RouterState::Dispatched { backend, .. }, RouterEvent::Accepted) => {
                Ok(RouterState::Success { backend })
            }
            (
                RouterState::Dispatched { attempt, .. },
                RouterEvent::Rejected {
                    fallback: Some(next),
                    ..
                },
            ) if attempt < MAX_ATTEMPTS => Ok(RouterState::RetryWith { backend: next }),
            (RouterState::Dispatched { .. }, RouterEvent::Rejected { fallback: None, .. }) => {
                Ok(RouterState::Failed)
            }

            (RouterState::RetryWith { backend }, RouterEvent::Dispatch(requested))
                if backend == requested =>
            {
                Ok(RouterState::Dispatched {
                    backend,
                    attempt: MAX_ATTEMPTS,
                })
            }

            (state, event) => Err(Error::InvalidTransition(format!(
                "{:?} cannot handle {:?}",
                state, event
            ))),
        }
    }
}

/// Dispatches prompts across the configured backends
#[derive(Clone)]
pub struct ModelRouter {
    client: Arc<dyn ModelClient>,
    config: RouterConfig,
}

impl ModelRouter {
    pub fn new(client: Arc<dyn ModelClient>, config: RouterConfig) -> Self {
        Self { client, config }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Route a prompt to the primary backend, falling back to the secondary
    pub async fn dispatch(&self, prompt: &ComposedPrompt) -> ModelResponse {
        let mut state = RouterState::Idle;
        let mut attempts: Vec<AttemptRecord> = Vec::new();
        let mut accepted_text = String::new();
        let mut last_reason = None;

        loop {
            let event = match &state {
                RouterState::Idle => match self.config.primary() {
                    Some(backend) => RouterEvent::Dispatch(backend.to_string()),
                    None => {
                        warn!("No model backends configured");
                        RouterEvent::NoBackends
                    }
                },
                RouterState::RetryWith { backend } => RouterEvent::Dispatch(backend.clone()),
                RouterState::Dispatched { backend, attempt } => {
                    let (record, text) = self.attempt(prompt, backend).await;
                    let outcome = record.outcome;
                    attempts.push(record);
                    match (outcome, text) {
                        (AttemptOutcome::Accepted, Some(text)) => {
                            accepted_text = text;
                            RouterEvent::Accepted
                        }
                        (AttemptOutcome::Rejected(reason), _) => {
                            last_reason = Some(reason);
                            RouterEvent::Rejected {
                                reason,
                                fallback: if *attempt < MAX_ATTEMPTS {
                                    self.config.secondary().map(str::to_string)
                                } else {
                                    None
                                },
                            }
                        }
                        (AttemptOutcome::Accepted, None) => RouterEvent::Rejected {
                            reason: FailureReason::EmptyOutput,
                            fallback: None,
                        },
                    }
                }
                RouterState::Success { .. } | RouterState::Failed => break,
            };

            state = match state.next(event) {
                Ok(next) => next,
                Err(e) => {
                    error!(error = %e, "Model router reached an invalid state");
                    return ModelResponse::failed(FailureReason::AllBackendsFailed)
                        .with_attempts(attempts);
                }
            };
        }

        match state {
            RouterState::Success { backend } => {
                ModelResponse::success(accepted_text, backend).with_attempts(attempts)
            }
            _ => {
                // A lone backend reports its own reason
                let reason = match (attempts.len(), last_reason) {
                    (1, Some(reason)) => reason,
                    _ => FailureReason::AllBackendsFailed,
                };
                ModelResponse::failed(reason).with_attempts(attempts)
            }
        }
    }

    /// Check generated text, returning it trimmed or the reason it is unusable
    pub fn validate_output<'a>(&self, text: &'a str) -> std::result::Result<&'a str, FailureReason> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(FailureReason::EmptyOutput);
        }

        let lowered = trimmed.to_lowercase();
        let refused = self
            .config
            .refusal_sentinels
            .iter()
            .map(|s| s.trim().to_lowercase())
            .any(|s| !s.is_empty() && lowered.starts_with(&s));
        if refused {
            return Err(FailureReason::EmptyOutput);
        }

        Ok(trimmed)
    }

    async fn attempt(
        &self,
        prompt: &ComposedPrompt,
        backend: &str,
    ) -> (AttemptRecord, Option<String>) {
        let started = Instant::now();
        let result = tokio::time::timeout(
            self.config.timeout,
            self.client.generate(prompt, backend, self.config.timeout),
        )
        .await;
        let latency_ms = started.elapsed().as_millis() as u64;

        let checked = match result {
            Err(_) => Err(FailureReason::Timeout),
            Ok(Err(Error::Http(e))) if e.is_timeout() => Err(FailureReason::Timeout),
            Ok(Err(e)) => {
                warn!(backend = %backend, error = %e, "Model client error");
                Err(FailureReason::Unreachable)
            }
            Ok(Ok(text)) => self.validate_output(&text).map(str::to_string),
        };

        match checked {
            Ok(text) => {
                info!(backend = %backend, latency_ms, "Model response accepted");
                (
                    AttemptRecord {
                        backend: backend.to_string(),
                        outcome: AttemptOutcome::Accepted,
                        latency_ms,
                    },
                    Some(text),
                )
            }
            Err(reason) => {
                warn!(backend = %backend, latency_ms, reason = %reason, "Model attempt failed");
                (
                    AttemptRecord {
                        backend: backend.to_string(),
                        outcome: AttemptOutcome::Rejected(reason),
                        latency_ms,
                    },
                    None,
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::{MockClient, OllamaClient};
    use crate::test_utils::MockOllamaServer;
    use std::time::Duration;

    fn config(backends: &[&str], timeout: Duration) -> RouterConfig {
        RouterConfig {
            backends: backends.iter().map(|b| b.to_string()).collect(),
            timeout,
            ..RouterConfig::default()
        }
    }

    fn router(mock: &MockClient, backends: &[&str]) -> ModelRouter {
        ModelRouter::new(
            Arc::new(mock.clone()),
            config(backends, Duration::from_millis(200)),
        )
    }

    fn prompt() -> ComposedPrompt {
        ComposedPrompt::user_only("Question: What is my top category?")
    }

    #[test]
    fn test_state_machine_happy_paths() {
        let state = RouterState::Idle
            .next(RouterEvent::Dispatch("mistral".into()))
            .unwrap();
        assert_eq!(
            state,
            RouterState::Dispatched {
                backend: "mistral".into(),
                attempt: 1
            }
        );
        assert_eq!(
            state.clone().next(RouterEvent::Accepted).unwrap(),
            RouterState::Success {
                backend: "mistral".into()
            }
        );

        let retry = state
            .next(RouterEvent::Rejected {
                reason: FailureReason::Timeout,
                fallback: Some("llama3".into()),
            })
            .unwrap();
        assert_eq!(
            retry,
            RouterState::RetryWith {
                backend: "llama3".into()
            }
        );

        let second = retry.next(RouterEvent::Dispatch("llama3".into())).unwrap();
        assert_eq!(
            second.clone(),
            RouterState::Dispatched {
                backend: "llama3".into(),
                attempt: 2
            }
        );
        let failed = second
            .next(RouterEvent::Rejected {
                reason: FailureReason::Unreachable,
                fallback: None,
            })
            .unwrap();
        assert_eq!(failed, RouterState::Failed);
        assert!(failed.is_terminal());

        assert_eq!(
            RouterState::Idle.next(RouterEvent::NoBackends).unwrap(),
            RouterState::Failed
        );
    }

    #[test]
    fn test_state_machine_rejects_invalid_transitions() {
        let invalid = [
            (RouterState::Idle, RouterEvent::Accepted),
            (RouterState::Failed, RouterEvent::Dispatch("mistral".into())),
            (
                RouterState::Success {
                    backend: "mistral".into(),
                },
                RouterEvent::Accepted,
            ),
            // Only one retry is ever allowed
            (
                RouterState::Dispatched {
                    backend: "llama3".into(),
                    attempt: 2,
                },
                RouterEvent::Rejected {
                    reason: FailureReason::Timeout,
                    fallback: Some("gemma".into()),
                },
            ),
            // The retry must go to the announced backend
            (
                RouterState::RetryWith {
                    backend: "llama3".into(),
                },
                RouterEvent::Dispatch("mistral".into()),
            ),
        ];

        for (state, event) in invalid {
            assert!(matches!(
                state.next(event),
                Err(Error::InvalidTransition(_))
            ));
        }
    }

    #[tokio::test]
    async fn test_primary_success_skips_secondary() {
        let mock = MockClient::new().with_text("mistral", "  Groceries leads.  ");
        let response = router(&mock, &["mistral", "llama3"]).dispatch(&prompt()).await;

        assert!(response.succeeded);
        assert_eq!(response.text, "Groceries leads.");
        assert_eq!(response.backend_used.as_deref(), Some("mistral"));
        assert_eq!(response.failure_reason, None);
        assert_eq!(mock.called_backends(), vec!["mistral"]);
        assert_eq!(response.attempts.len(), 1);
        assert_eq!(response.attempts[0].outcome, AttemptOutcome::Accepted);
    }

    #[tokio::test]
    async fn test_primary_timeout_falls_back() {
        let mock = MockClient::new()
            .with_delay("mistral", Duration::from_secs(5))
            .with_text("llama3", "Your top category is Groceries.");
        let router = ModelRouter::new(
            Arc::new(mock.clone()),
            config(&["mistral", "llama3"], Duration::from_millis(50)),
        );

        let response = router.dispatch(&prompt()).await;

        assert!(response.succeeded);
        assert_eq!(response.text, "Your top category is Groceries.");
        assert_eq!(response.backend_used.as_deref(), Some("llama3"));
        assert_eq!(
            response.attempts[0].outcome,
            AttemptOutcome::Rejected(FailureReason::Timeout)
        );
        assert_eq!(response.attempts[1].outcome, AttemptOutcome::Accepted);
    }

    #[tokio::test]
    async fn test_unreachable_primary_falls_back() {
        let mock = MockClient::new()
            .with_error("mistral", "connection refused")
            .with_text("llama3", "Fine.");
        let response = router(&mock, &["mistral", "llama3"]).dispatch(&prompt()).await;

        assert!(response.succeeded);
        assert_eq!(response.backend_used.as_deref(), Some("llama3"));
        assert_eq!(
            response.attempts[0].outcome,
            AttemptOutcome::Rejected(FailureReason::Unreachable)
        );
    }

    #[tokio::test]
    async fn test_refusal_and_blank_count_as_empty_output() {
        let mock = MockClient::new()
            .with_text("mistral", "i'm sorry, BUT I CAN'T discuss finances")
            .with_text("llama3", " \n\t ");
        let response = router(&mock, &["mistral", "llama3"]).dispatch(&prompt()).await;

        assert!(!response.succeeded);
        assert_eq!(response.failure_reason, Some(FailureReason::AllBackendsFailed));
        let outcomes: Vec<_> = response.attempts.iter().map(|a| a.outcome).collect();
        assert_eq!(
            outcomes,
            vec![
                AttemptOutcome::Rejected(FailureReason::EmptyOutput),
                AttemptOutcome::Rejected(FailureReason::EmptyOutput),
            ]
        );
        assert!(response.text.is_empty());
        assert_eq!(response.backend_used, None);
    }

    #[tokio::test]
    async fn test_sentinel_must_be_a_prefix() {
        let mock = MockClient::new()
            .with_text("mistral", "Groceries are up. I cannot help with that overspend alone.");
        let response = router(&mock, &["mistral"]).dispatch(&prompt()).await;
        assert!(response.succeeded);
    }

    #[tokio::test]
    async fn test_single_backend_surfaces_its_reason() {
        let mock = MockClient::new().with_error("mistral", "down");
        let response = router(&mock, &["mistral"]).dispatch(&prompt()).await;

        assert!(!response.succeeded);
        assert_eq!(response.failure_reason, Some(FailureReason::Unreachable));
        assert_eq!(mock.called_backends(), vec!["mistral"]);
    }

    #[tokio::test]
    async fn test_no_backends_makes_no_call() {
        let mock = MockClient::new();
        let response = router(&mock, &[]).dispatch(&prompt()).await;

        assert!(!response.succeeded);
        assert_eq!(response.failure_reason, Some(FailureReason::AllBackendsFailed));
        assert!(response.attempts.is_empty());
        assert!(mock.calls().is_empty());
    }

    #[tokio::test]
    async fn test_never_more_than_two_attempts() {
        let mock = MockClient::new()
            .with_error("a", "down")
            .with_error("b", "down")
            .with_text("c", "unused");
        let response = router(&mock, &["a", "b", "c"]).dispatch(&prompt()).await;

        assert_eq!(response.failure_reason, Some(FailureReason::AllBackendsFailed));
        assert_eq!(mock.called_backends(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_fallback_over_http() {
        let server = MockOllamaServer::start().await;
        server.fail_model("mistral");
        let router = ModelRouter::new(
            Arc::new(OllamaClient::new(&server.url())),
            config(&["mistral", "llama3"], Duration::from_secs(5)),
        );

        let response = router.dispatch(&prompt()).await;

        assert!(response.succeeded);
        assert_eq!(response.backend_used.as_deref(), Some("llama3"));
        assert_eq!(response.text, "[llama3] Answer to: What is my top category?");
        let models: Vec<String> = server.requests().into_iter().map(|r| r.model).collect();
        assert_eq!(models, vec!["mistral", "llama3"]);
    }

    #[tokio::test]
    async fn test_http_timeout_and_empty_reply() {
        let server = MockOllamaServer::start().await;
        server.delay_model("mistral", Duration::from_secs(5));
        server.empty_model("llama3");
        let router = ModelRouter::new(
            Arc::new(OllamaClient::new(&server.url())),
            config(&["mistral", "llama3"], Duration::from_millis(100)),
        );

        let response = router.dispatch(&prompt()).await;

        assert!(!response.succeeded);
        assert_eq!(response.failure_reason, Some(FailureReason::AllBackendsFailed));
        assert_eq!(
            response.attempts[0].outcome,
            AttemptOutcome::Rejected(FailureReason::Timeout)
        );
        assert_eq!(
            response.attempts[1].outcome,
            AttemptOutcome::Rejected(FailureReason::EmptyOutput)
        );
    }
}
