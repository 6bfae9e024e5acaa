//! LedgerLens Core Library
//!
//! Financial intelligence engine for the LedgerLens budgeting dashboard:
//! - Feature extraction over a ledger snapshot (totals, trends, anomalies)
//! - Heuristic category suggestion for uncategorized transactions
//! - Keyword-based intent classification of natural-language questions
//! - Prompt composition from computed features (basic and advanced modes)
//! - Model routing with primary/secondary fallback over local backends
//! - An insight façade that ties the above together and degrades to a
//!   computed summary when no backend answers

pub mod ai;
pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod features;
pub mod intent;
pub mod models;
pub mod prompts;
pub mod repository;
pub mod router;
pub mod suggest;

/// Test utilities including mock Ollama server
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

pub use ai::{AIClient, MockClient, ModelClient, OllamaClient};
pub use cache::{ledger_fingerprint, CacheStats, FeatureCache};
pub use config::{EngineConfig, FeatureConfig, RouterConfig, SuggesterConfig};
pub use engine::{render_summary, Answer, InsightEngine, FALLBACK_NOTICE};
pub use error::{Error, Result};
pub use features::{FeatureExtractor, FeatureSet};
pub use intent::IntentClassifier;
pub use models::{
    AttemptOutcome, AttemptRecord, FailureReason, Intent, ModelResponse, PromptMode, Transaction,
};
pub use prompts::{ComposedPrompt, Prompt, PromptComposer, PromptId, PromptInfo, PromptLibrary};
pub use repository::{InMemoryRepository, TransactionFilter, TransactionRepository};
pub use router::ModelRouter;
pub use suggest::{CategorySuggester, MerchantMap, Suggestion};
