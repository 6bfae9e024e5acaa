//! Domain models for LedgerLens

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Repository-assigned transaction identifier
pub type TransactionId = i64;

/// Category label reserved for income rows
pub const INCOME_CATEGORY: &str = "Income";

/// A ledger row as handed over by the transaction repository
///
/// The engine treats transactions as immutable input.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TransactionId,
    pub date: NaiveDate,
    /// Negative = expense, positive = income
    pub amount: f64,
    /// Short label, possibly empty for uncategorized rows
    #[serde(default)]
    pub category: String,
    /// Merchant or memo text, possibly empty
    #[serde(default)]
    pub description: String,
}

impl Transaction {
    pub fn new(
        id: TransactionId,
        date: NaiveDate,
        amount: f64,
        category: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id,
            date,
            amount,
            category: category.into(),
            description: description.into(),
        }
    }

    pub fn is_expense(&self) -> bool {
        self.amount < 0.0
    }

    pub fn is_income(&self) -> bool {
        self.amount > 0.0
    }

    /// True when the row has no usable category label
    pub fn is_uncategorized(&self) -> bool {
        self.category.trim().is_empty()
    }
}

/// What the user is asking about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    SpendingPattern,
    Prediction,
    Budgeting,
    Comparison,
    GoalSetting,
    /// Default when no keyword pattern matches
    General,
}

impl Intent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Intent::SpendingPattern => "spending_pattern",
            Intent::Prediction => "prediction",
            Intent::Budgeting => "budgeting",
            Intent::Comparison => "comparison",
            Intent::GoalSetting => "goal_setting",
            Intent::General => "general",
        }
    }

    /// Resolution order, most specific first
    pub fn by_priority() -> &'static [Intent] {
        &[
            Intent::GoalSetting,
            Intent::Prediction,
            Intent::Comparison,
            Intent::Budgeting,
            Intent::SpendingPattern,
            Intent::General,
        ]
    }
}

impl fmt::Display for Intent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Intent {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "spending_pattern" => Ok(Intent::SpendingPattern),
            "prediction" => Ok(Intent::Prediction),
            "budgeting" => Ok(Intent::Budgeting),
            "comparison" => Ok(Intent::Comparison),
            "goal_setting" => Ok(Intent::GoalSetting),
            "general" => Ok(Intent::General),
            _ => Err(format!("Unknown intent: {}", s)),
        }
    }
}

/// How much computed context goes into a prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptMode {
    /// Category totals, income and expenses only
    Basic,
    /// Full feature set plus intent-specific instructions
    #[default]
    Advanced,
}

impl PromptMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptMode::Basic => "basic",
            PromptMode::Advanced => "advanced",
        }
    }
}

impl fmt::Display for PromptMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for PromptMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "basic" => Ok(PromptMode::Basic),
            "advanced" => Ok(PromptMode::Advanced),
            _ => Err(format!("Unknown prompt mode: {}", s)),
        }
    }
}

/// Why a model dispatch did not produce usable text
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureReason {
    /// Connection refused, non-2xx status, or any other client error
    Unreachable,
    /// Attempt exceeded the per-attempt timeout
    Timeout,
    /// Blank output or a known refusal phrase
    EmptyOutput,
    /// Primary and secondary both failed
    AllBackendsFailed,
}

impl FailureReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureReason::Unreachable => "unreachable",
            FailureReason::Timeout => "timeout",
            FailureReason::EmptyOutput => "empty_output",
            FailureReason::AllBackendsFailed => "all_backends_failed",
        }
    }
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of a single backend attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptOutcome {
    Accepted,
    Rejected(FailureReason),
}

/// One entry in the dispatch log of a [`ModelResponse`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub backend: String,
    pub outcome: AttemptOutcome,
    pub latency_ms: u64,
}

/// Outcome of routing a prompt through the configured backends
///
/// Callers branch on `succeeded`; routing never returns an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelResponse {
    /// Generated content (empty on failure)
    pub text: String,
    /// Backend that produced `text`
    pub backend_used: Option<String>,
    pub succeeded: bool,
    pub failure_reason: Option<FailureReason>,
    /// Every attempt made, in order
    #[serde(default)]
    pub attempts: Vec<AttemptRecord>,
}

impl ModelResponse {
    pub fn success(text: impl Into<String>, backend: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            backend_used: Some(backend.into()),
            succeeded: true,
            failure_reason: None,
            attempts: Vec::new(),
        }
    }

    pub fn failed(reason: FailureReason) -> Self {
        Self {
            text: String::new(),
            backend_used: None,
            succeeded: false,
            failure_reason: Some(reason),
            attempts: Vec::new(),
        }
    }

    pub fn with_attempts(mut self, attempts: Vec<AttemptRecord>) -> Self {
        self.attempts = attempts;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_round_trip_names() {
        for intent in Intent::by_priority() {
            assert_eq!(intent.as_str().parse::<Intent>().unwrap(), *intent);
        }
        assert!("shopping".parse::<Intent>().is_err());
    }

    #[test]
    fn test_prompt_mode_parse() {
        assert_eq!("Basic".parse::<PromptMode>().unwrap(), PromptMode::Basic);
        assert_eq!(" advanced ".parse::<PromptMode>().unwrap(), PromptMode::Advanced);
        assert!("verbose".parse::<PromptMode>().is_err());
        assert_eq!(PromptMode::default(), PromptMode::Advanced);
    }

    #[test]
    fn test_transaction_sign_helpers() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let expense = Transaction::new(1, date, -45.67, "Groceries", "Whole Foods");
        let income = Transaction::new(2, date, 2500.0, INCOME_CATEGORY, "Salary");
        let blank = Transaction::new(3, date, 0.0, "  ", "");

        assert!(expense.is_expense() && !expense.is_income());
        assert!(income.is_income() && !income.is_expense());
        assert!(!blank.is_expense() && !blank.is_income());
        assert!(blank.is_uncategorized());
    }

    #[test]
    fn test_failed_response_shape() {
        let response = ModelResponse::failed(FailureReason::AllBackendsFailed);
        assert!(!response.succeeded);
        assert!(response.text.is_empty());
        assert!(response.backend_used.is_none());
        assert_eq!(response.failure_reason, Some(FailureReason::AllBackendsFailed));
    }
}
