//! InsightEngine: the single entry point for the dashboard
//!
//! `ask` runs intent classification, feature extraction, prompt composition
//! and model routing. `summarize` computes features locally and never touches
//! the model client, so the dashboard always has something to show.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, warn};

use crate::ai::ModelClient;
use crate::cache::FeatureCache;
use crate::config::EngineConfig;
use crate::error::{Error, Result};
use crate::features::{FeatureExtractor, FeatureSet};
use crate::intent::IntentClassifier;
use crate::models::{FailureReason, Intent, ModelResponse, PromptMode, Transaction};
use crate::prompts::{
    format_money, format_optional_percent, format_percent, ComposedPrompt, PromptComposer,
    NO_DATA,
};
use crate::repository::{TransactionFilter, TransactionRepository};
use crate::router::ModelRouter;
use crate::suggest::{CategorySuggester, MerchantMap, Suggestion};

/// Shown alongside the computed summary when no backend produced an answer
pub const FALLBACK_NOTICE: &str = "AI unavailable, showing computed summary instead";

/// Categories listed in the plain-text summary
const SUMMARY_TOP_CATEGORIES: usize = 5;

/// What the dashboard should display for a question
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Answer {
    /// A backend answered
    Model(ModelResponse),
    /// Every backend failed; show the computed summary instead
    Fallback {
        notice: String,
        summary: String,
        response: ModelResponse,
    },
}

impl Answer {
    /// Computed summary shown in place of a failed response
    pub fn fallback(features: &FeatureSet, response: ModelResponse) -> Self {
        Answer::Fallback {
            notice: FALLBACK_NOTICE.to_string(),
            summary: render_summary(features),
            response,
        }
    }

    pub fn is_fallback(&self) -> bool {
        matches!(self, Answer::Fallback { .. })
    }

    /// Text to display
    pub fn text(&self) -> &str {
        match self {
            Answer::Model(response) => &response.text,
            Answer::Fallback { summary, .. } => summary,
        }
    }

    pub fn response(&self) -> &ModelResponse {
        match self {
            Answer::Model(response) => response,
            Answer::Fallback { response, .. } => response,
        }
    }
}

/// Financial intelligence façade
///
/// Holds only immutable configuration and a shared model client, so one engine
/// can serve concurrent requests.
pub struct InsightEngine {
    config: EngineConfig,
    cache: FeatureCache,
    classifier: IntentClassifier,
    suggester: CategorySuggester,
    composer: PromptComposer,
    router: ModelRouter,
    merchants: MerchantMap,
}

impl InsightEngine {
    /// Engine using the user's prompt overrides, if any
    pub fn new(config: EngineConfig, client: Arc<dyn ModelClient>) -> Result<Self> {
        Ok(Self::with_composer(config, client, PromptComposer::new()?))
    }

    pub fn with_composer(
        config: EngineConfig,
        client: Arc<dyn ModelClient>,
        composer: PromptComposer,
    ) -> Self {
        Self {
            cache: FeatureCache::new(FeatureExtractor::new(config.features.clone())),
            classifier: IntentClassifier::new(),
            suggester: CategorySuggester::new(&config.suggester),
            composer,
            router: ModelRouter::new(client, config.router.clone()),
            merchants: MerchantMap::new(),
            config,
        }
    }

    /// User merchant table consulted by `suggest_category`
    pub fn with_merchants(mut self, merchants: MerchantMap) -> Self {
        self.merchants = merchants;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn default_mode(&self) -> PromptMode {
        self.config.default_mode
    }

    pub fn classify_intent(&self, query: &str) -> Intent {
        self.classifier.classify(query)
    }

    /// Features for a ledger, zeroed when the ledger is empty
    pub fn summarize(&self, transactions: &[Transaction]) -> FeatureSet {
        match self.cache.get_or_extract(transactions) {
            Ok(features) => (*features).clone(),
            Err(Error::InsufficientData(_)) => FeatureSet::empty(),
            Err(e) => {
                warn!(error = %e, "Feature extraction failed, returning empty summary");
                FeatureSet::empty()
            }
        }
    }

    /// The prompt `ask` would send for this question
    pub fn compose_prompt(
        &self,
        query: &str,
        transactions: &[Transaction],
        mode: PromptMode,
    ) -> Result<ComposedPrompt> {
        self.compose_for_intent(query, self.classify_intent(query), transactions, mode)
    }

    fn compose_for_intent(
        &self,
        query: &str,
        intent: Intent,
        transactions: &[Transaction],
        mode: PromptMode,
    ) -> Result<ComposedPrompt> {
        let features = self.summarize(transactions);
        self.composer.compose_parts(&features, intent, query, mode)
    }

    /// Answer a question about the ledger using the model backends
    ///
    /// If no prompt can be built (advanced mode on an empty ledger) no backend
    /// is called and the response fails with `EmptyOutput`.
    pub async fn ask(
        &self,
        query: &str,
        transactions: &[Transaction],
        mode: PromptMode,
    ) -> ModelResponse {
        let intent = self.classify_intent(query);
        let prompt = match self.compose_for_intent(query, intent, transactions, mode) {
            Ok(prompt) => prompt,
            Err(e) => {
                warn!(error = %e, mode = %mode, "Cannot compose prompt, skipping model call");
                return ModelResponse::failed(FailureReason::EmptyOutput);
            }
        };

        debug!(
            intent = %intent,
            mode = %mode,
            transactions = transactions.len(),
            "Dispatching question"
        );
        self.router.dispatch(&prompt).await
    }

    /// Read the ledger from a repository, then [`ask`](Self::ask)
    pub async fn ask_repository(
        &self,
        query: &str,
        repository: &dyn TransactionRepository,
        filter: &TransactionFilter,
        mode: PromptMode,
    ) -> Result<ModelResponse> {
        let transactions = repository.list_transactions(filter)?;
        Ok(self.ask(query, &transactions, mode).await)
    }

    /// Like [`ask`](Self::ask), substituting the computed summary on failure
    pub async fn answer(
        &self,
        query: &str,
        transactions: &[Transaction],
        mode: PromptMode,
    ) -> Answer {
        let response = self.ask(query, transactions, mode).await;
        if response.succeeded {
            return Answer::Model(response);
        }

        Answer::fallback(&self.summarize(transactions), response)
    }

    /// Suggested category for a transaction being entered
    pub fn suggest_category(&self, description: &str, amount: f64, history: &[Transaction]) -> String {
        self.suggester
            .suggest_with_history(description, amount, &self.merchants, history)
    }

    /// Suggested category plus the rule that produced it
    pub fn explain_category(
        &self,
        description: &str,
        amount: f64,
        history: &[Transaction],
    ) -> Suggestion {
        self.suggester
            .explain(description, amount, &self.merchants, history)
    }
}

/// Plain-text summary of a FeatureSet
pub fn render_summary(features: &FeatureSet) -> String {
    if features.is_empty() {
        return NO_DATA.to_string();
    }

    let mut lines = Vec::new();
    match features.date_range {
        Some((from, to)) => lines.push(format!(
            "Summary for {} to {} ({} transactions)",
            from, to, features.transaction_count
        )),
        None => lines.push(format!("Summary ({} transactions)", features.transaction_count)),
    }

    lines.push(format!("Total income:   {}", format_money(features.total_income)));
    lines.push(format!("Total expenses: {}", format_money(features.total_expenses)));
    lines.push(format!("Net savings:    {}", format_money(features.net_savings)));
    lines.push(format!(
        "Savings rate:   {}",
        format_optional_percent(features.savings_rate)
    ));

    if !features.category_totals.is_empty() {
        lines.push("Top categories:".to_string());
        for total in features.category_totals.iter().take(SUMMARY_TOP_CATEGORIES) {
            lines.push(format!(
                "  {:<20} {:>14} {:>7}",
                total.category,
                format_money(total.amount),
                format_percent(total.share)
            ));
        }
    }

    if let (Some(cv), Some(label)) = (features.consistency_score, features.consistency_label()) {
        lines.push(format!(
            "Monthly spending is {} (CV {:.2})",
            label.as_str(),
            cv
        ));
    }
    if !features.large_transaction_flags.is_empty() {
        lines.push(format!(
            "Unusually large transactions: {}",
            features.large_transaction_flags.len()
        ));
    }
    if let Some(day) = features.peak_spending_day {
        lines.push(format!("Peak spending day: {}", day));
    }
    if let Some(projection) = &features.projection {
        lines.push(format!(
            "Projected spend next month: {} ({} confidence)",
            format_money(projection.next_month_expense),
            projection.confidence.as_str()
        ));
    }

    lines.join("\n")
}
