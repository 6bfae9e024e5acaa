//! Heuristic category suggestion for uncategorized transactions
//!
//! Rules are tried in order and the first match wins:
//! 1. Merchant table (built-in merged with the caller's map)
//! 2. Keyword sets per category
//! 3. Recurring charge on a monthly cadence
//! 4. Large amount
//!
//! Anything left over is "Other". Suggestions are proposals only; nothing here
//! writes back to the ledger.

use std::collections::BTreeMap;

use tracing::debug;

use crate::config::SuggesterConfig;
use crate::models::{Transaction, INCOME_CATEGORY};

/// Category returned when no rule matches
pub const OTHER_CATEGORY: &str = "Other";
/// Category for charges that recur on a monthly cadence
pub const SUBSCRIPTIONS_CATEGORY: &str = "Subscriptions";
/// Category for large otherwise-unmatched amounts
pub const MAJOR_PURCHASE_CATEGORY: &str = "Major Purchase";

/// Merchant name (matched case-insensitively) to category
pub type MerchantMap = BTreeMap<String, String>;

/// Curated merchants that are recognized without any user configuration
const BUILTIN_MERCHANTS: &[(&str, &str)] = &[
    ("amazon", "Shopping"),
    ("costco", "Groceries"),
    ("cvs", "Healthcare"),
    ("doordash", "Restaurants"),
    ("home depot", "Home"),
    ("kroger", "Groceries"),
    ("lowes", "Home"),
    ("lyft", "Transportation"),
    ("mcdonald", "Restaurants"),
    ("netflix", "Entertainment"),
    ("spotify", "Entertainment"),
    ("starbucks", "Restaurants"),
    ("target", "Shopping"),
    ("trader joe", "Groceries"),
    ("uber", "Transportation"),
    ("uber eats", "Restaurants"),
    ("walgreens", "Healthcare"),
    ("walmart", "Groceries"),
    ("whole foods", "Groceries"),
];

/// Keyword sets in match order
const KEYWORD_CATEGORIES: &[(&str, &[&str])] = &[
    (
        "Groceries",
        &["grocery", "market", "food", "supermarket"],
    ),
    (
        "Restaurants",
        &["restaurant", "cafe", "coffee", "pizza", "delivery"],
    ),
    (
        "Transportation",
        &["gas", "fuel", "taxi", "metro", "bus", "parking", "toll"],
    ),
    (
        "Utilities",
        &["electric", "water", "internet", "phone", "cable", "utility"],
    ),
    (
        "Healthcare",
        &["hospital", "doctor", "pharmacy", "medical", "dental", "vision"],
    ),
    (
        "Entertainment",
        &["movie", "theater", "game", "concert", "event"],
    ),
    (
        "Shopping",
        &["mall", "store", "retail", "clothing", "shoes"],
    ),
    ("Home", &["rent", "mortgage", "furniture", "cleaning"]),
    (
        "Education",
        &["school", "university", "course", "book", "tuition", "education"],
    ),
    ("Insurance", &["insurance", "premium", "policy"]),
    ("Banking", &["fee", "charge", "atm", "transfer", "interest"]),
];

/// Only considered for money coming in
const INCOME_KEYWORDS: &[&str] = &["salary", "payroll", "deposit", "refund", "bonus"];

/// Everything a rule may look at
#[derive(Debug, Clone, Copy)]
pub struct SuggestionInput<'a> {
    pub description: &'a str,
    pub amount: f64,
    pub merchants: &'a MerchantMap,
    /// Prior ledger rows, used for recurrence detection
    pub history: &'a [Transaction],
}

impl<'a> SuggestionInput<'a> {
    fn normalized_description(&self) -> Option<String> {
        let description = self.description.trim();
        if description.is_empty() {
            None
        } else {
            Some(description.to_lowercase())
        }
    }
}

/// One step of the suggestion pipeline
pub trait SuggestionRule: Send + Sync {
    /// Short name for logging and diagnostics
    fn name(&self) -> &'static str;

    /// Proposed category, or `None` to defer to the next rule
    fn apply(&self, input: &SuggestionInput<'_>) -> Option<String>;
}

/// Case-insensitive merchant lookup
///
/// Caller-supplied entries override built-in entries with the same key. When
/// several merchants occur in the description, the longest key wins, then the
/// alphabetically first.
#[derive(Debug, Clone)]
pub struct MerchantRule {
    builtin: MerchantMap,
}

impl MerchantRule {
    pub fn new() -> Self {
        Self {
            builtin: BUILTIN_MERCHANTS
                .iter()
                .map(|(merchant, category)| (merchant.to_string(), category.to_string()))
                .collect(),
        }
    }

    /// Rule with no built-in table, matching only the caller's map
    pub fn without_builtins() -> Self {
        Self {
            builtin: MerchantMap::new(),
        }
    }
}

impl Default for MerchantRule {
    fn default() -> Self {
        Self::new()
    }
}

impl SuggestionRule for MerchantRule {
    fn name(&self) -> &'static str {
        "merchant"
    }

    fn apply(&self, input: &SuggestionInput<'_>) -> Option<String> {
        let description = input.normalized_description()?;

        let mut table: BTreeMap<String, &str> = BTreeMap::new();
        for (merchant, category) in self.builtin.iter().chain(input.merchants.iter()) {
            let key = merchant.trim().to_lowercase();
            if !key.is_empty() {
                table.insert(key, category.as_str());
            }
        }

        table
            .iter()
            .filter(|(key, _)| description.contains(key.as_str()))
            .min_by(|(a, _), (b, _)| b.len().cmp(&a.len()).then_with(|| a.cmp(b)))
            .map(|(_, category)| category.to_string())
    }
}

/// Fixed keyword sets, first category in declaration order wins
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordRule;

impl SuggestionRule for KeywordRule {
    fn name(&self) -> &'static str {
        "keyword"
    }

    fn apply(&self, input: &SuggestionInput<'_>) -> Option<String> {
        let description = input.normalized_description()?;

        if let Some((category, _)) = KEYWORD_CATEGORIES
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| description.contains(k)))
        {
            return Some(category.to_string());
        }

        if input.amount > 0.0 && INCOME_KEYWORDS.iter().any(|k| description.contains(k)) {
            return Some(INCOME_CATEGORY.to_string());
        }

        None
    }
}

/// Repeated identical charges on a monthly cadence
///
/// Only history rows are counted. A caller that already stored the
/// transaction being classified will have it counted as one of them.
#[derive(Debug, Clone)]
pub struct RecurrenceRule {
    cadence_days: i64,
    tolerance_days: i64,
    min_occurrences: usize,
    consistency: f64,
}

impl RecurrenceRule {
    pub fn new(config: &SuggesterConfig) -> Self {
        Self {
            cadence_days: config.cadence_days,
            tolerance_days: config.cadence_tolerance_days,
            min_occurrences: config.min_occurrences,
            consistency: config.cadence_consistency,
        }
    }
}

impl SuggestionRule for RecurrenceRule {
    fn name(&self) -> &'static str {
        "recurrence"
    }

    fn apply(&self, input: &SuggestionInput<'_>) -> Option<String> {
        let description = input.normalized_description()?;
        let cents = to_cents(input.amount);

        let mut dates: Vec<_> = input
            .history
            .iter()
            .filter(|tx| {
                to_cents(tx.amount) == cents
                    && tx.description.trim().to_lowercase() == description
            })
            .map(|tx| tx.date)
            .collect();

        if dates.len() < self.min_occurrences {
            return None;
        }
        dates.sort();

        let gaps: Vec<i64> = dates
            .windows(2)
            .map(|pair| (pair[1] - pair[0]).num_days())
            .collect();
        let on_cadence = gaps
            .iter()
            .filter(|gap| (**gap - self.cadence_days).abs() <= self.tolerance_days)
            .count();

        if on_cadence as f64 / gaps.len() as f64 >= self.consistency {
            Some(SUBSCRIPTIONS_CATEGORY.to_string())
        } else {
            None
        }
    }
}

/// Large amounts that nothing else explained
#[derive(Debug, Clone)]
pub struct MagnitudeRule {
    threshold: f64,
}

impl MagnitudeRule {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }
}

impl SuggestionRule for MagnitudeRule {
    fn name(&self) -> &'static str {
        "magnitude"
    }

    fn apply(&self, input: &SuggestionInput<'_>) -> Option<String> {
        (input.amount.abs() >= self.threshold).then(|| MAJOR_PURCHASE_CATEGORY.to_string())
    }
}

/// A proposed category and the rule that produced it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Suggestion {
    pub category: String,
    /// `None` when falling through to "Other"
    pub rule: Option<&'static str>,
}

/// Ordered rule pipeline
pub struct CategorySuggester {
    rules: Vec<Box<dyn SuggestionRule>>,
}

impl CategorySuggester {
    pub fn new(config: &SuggesterConfig) -> Self {
        Self::with_rules(vec![
            Box::new(MerchantRule::new()),
            Box::new(KeywordRule),
            Box::new(RecurrenceRule::new(config)),
            Box::new(MagnitudeRule::new(config.large_purchase_threshold)),
        ])
    }

    pub fn with_rules(rules: Vec<Box<dyn SuggestionRule>>) -> Self {
        Self { rules }
    }

    pub fn rule_names(&self) -> Vec<&'static str> {
        self.rules.iter().map(|r| r.name()).collect()
    }

    /// Suggest a category from the description and amount alone
    pub fn suggest(&self, description: &str, amount: f64, merchants: &MerchantMap) -> String {
        self.suggest_with_history(description, amount, merchants, &[])
    }

    /// Suggest a category, also checking `history` for a recurring charge
    pub fn suggest_with_history(
        &self,
        description: &str,
        amount: f64,
        merchants: &MerchantMap,
        history: &[Transaction],
    ) -> String {
        self.explain(description, amount, merchants, history).category
    }

    /// Like [`suggest_with_history`](Self::suggest_with_history), reporting the matching rule
    pub fn explain(
        &self,
        description: &str,
        amount: f64,
        merchants: &MerchantMap,
        history: &[Transaction],
    ) -> Suggestion {
        let input = SuggestionInput {
            description,
            amount,
            merchants,
            history,
        };

        for rule in &self.rules {
            if let Some(category) = rule.apply(&input) {
                debug!(rule = rule.name(), category = %category, "Category suggested");
                return Suggestion {
                    category,
                    rule: Some(rule.name()),
                };
            }
        }

        Suggestion {
            category: OTHER_CATEGORY.to_string(),
            rule: None,
        }
    }
}

impl Default for CategorySuggester {
    fn default() -> Self {
        Self::new(&SuggesterConfig::default())
    }
}

fn to_cents(amount: f64) -> i64 {
    (amount * 100.0).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn input<'a>(
        description: &'a str,
        amount: f64,
        merchants: &'a MerchantMap,
        history: &'a [Transaction],
    ) -> SuggestionInput<'a> {
        SuggestionInput {
            description,
            amount,
            merchants,
            history,
        }
    }

    fn monthly(description: &str, amount: f64, days: &[i64]) -> Vec<Transaction> {
        let start = NaiveDate::from_ymd_opt(2024, 1, 5).unwrap();
        days.iter()
            .enumerate()
            .map(|(i, offset)| {
                Transaction::new(
                    i as i64 + 1,
                    start + chrono::Duration::days(*offset),
                    amount,
                    "",
                    description,
                )
            })
            .collect()
    }

    #[test]
    fn test_merchant_rule_longest_key_wins() {
        let rule = MerchantRule::new();
        let empty = MerchantMap::new();

        assert_eq!(
            rule.apply(&input("UBER EATS 8841", -23.0, &empty, &[])),
            Some("Restaurants".to_string())
        );
        assert_eq!(
            rule.apply(&input("Uber trip", -12.0, &empty, &[])),
            Some("Transportation".to_string())
        );
        assert_eq!(rule.apply(&input("Corner shop", -5.0, &empty, &[])), None);
    }

    #[test]
    fn test_merchant_rule_alphabetical_tie_break() {
        let rule = MerchantRule::without_builtins();
        let mut merchants = MerchantMap::new();
        merchants.insert("beta".into(), "B".into());
        merchants.insert("alfa".into(), "A".into());

        assert_eq!(
            rule.apply(&input("beta alfa", -1.0, &merchants, &[])),
            Some("A".to_string())
        );
    }

    #[test]
    fn test_caller_merchants_override_builtins() {
        let rule = MerchantRule::new();
        let mut merchants = MerchantMap::new();
        merchants.insert("Netflix".into(), "Subscriptions".into());

        assert_eq!(
            rule.apply(&input("NETFLIX.COM", -15.49, &merchants, &[])),
            Some("Subscriptions".to_string())
        );
    }

    #[test]
    fn test_keyword_rule_declaration_order() {
        let empty = MerchantMap::new();
        // "gas" is a transportation keyword listed ahead of utilities
        assert_eq!(
            KeywordRule.apply(&input("City gas bill", -60.0, &empty, &[])),
            Some("Transportation".to_string())
        );
        assert_eq!(
            KeywordRule.apply(&input("Electric company", -60.0, &empty, &[])),
            Some("Utilities".to_string())
        );
    }

    #[test]
    fn test_income_keywords_need_positive_amount() {
        let empty = MerchantMap::new();
        assert_eq!(
            KeywordRule.apply(&input("ACME payroll", 2500.0, &empty, &[])),
            Some(INCOME_CATEGORY.to_string())
        );
        assert_eq!(KeywordRule.apply(&input("ACME payroll", -5.0, &empty, &[])), None);
    }

    #[test]
    fn test_recurrence_rule_monthly_cadence() {
        let rule = RecurrenceRule::new(&SuggesterConfig::default());
        let empty = MerchantMap::new();

        let history = monthly("Gym Club", -49.99, &[0, 31, 59, 90]);
        assert_eq!(
            rule.apply(&input("gym club", -49.99, &empty, &history)),
            Some(SUBSCRIPTIONS_CATEGORY.to_string())
        );

        // Different amount to the cent
        assert_eq!(rule.apply(&input("gym club", -50.00, &empty, &history)), None);

        let too_few = monthly("Gym Club", -49.99, &[0, 30]);
        assert_eq!(rule.apply(&input("Gym Club", -49.99, &empty, &too_few)), None);

        let irregular = monthly("Gym Club", -49.99, &[0, 7, 14, 45]);
        assert_eq!(rule.apply(&input("Gym Club", -49.99, &empty, &irregular)), None);
    }

    #[test]
    fn test_recurrence_counts_history_rows_only() {
        let rule = RecurrenceRule::new(&SuggesterConfig::default());
        let empty = MerchantMap::new();

        // Two stored charges plus the one being entered is still two
        let stored = monthly("Spotify", -11.99, &[0, 31]);
        assert_eq!(rule.apply(&input("Spotify", -11.99, &empty, &stored)), None);

        // Once the third charge is in history it counts like any other row
        let stored = monthly("Spotify", -11.99, &[0, 31, 60]);
        assert_eq!(
            rule.apply(&input("Spotify", -11.99, &empty, &stored)),
            Some(SUBSCRIPTIONS_CATEGORY.to_string())
        );
    }

    #[test]
    fn test_magnitude_rule_threshold_inclusive() {
        let rule = MagnitudeRule::new(1000.0);
        let empty = MerchantMap::new();
        assert_eq!(
            rule.apply(&input("", -1000.0, &empty, &[])),
            Some(MAJOR_PURCHASE_CATEGORY.to_string())
        );
        assert_eq!(rule.apply(&input("", -999.99, &empty, &[])), None);
    }

    #[test]
    fn test_suggester_priority() {
        let suggester = CategorySuggester::default();
        let empty = MerchantMap::new();

        // Merchant beats keyword ("market" would say Groceries)
        assert_eq!(suggester.suggest("Amazon Marketplace", -30.0, &empty), "Shopping");
        // Keyword beats magnitude
        assert_eq!(suggester.suggest("Furniture outlet", -2400.0, &empty), "Home");
        assert_eq!(
            suggester.suggest("Unknown vendor", -1500.0, &empty),
            MAJOR_PURCHASE_CATEGORY
        );
        assert_eq!(suggester.suggest("Unknown vendor", -15.0, &empty), OTHER_CATEGORY);
    }

    #[test]
    fn test_empty_description_skips_text_rules() {
        let suggester = CategorySuggester::default();
        let mut merchants = MerchantMap::new();
        merchants.insert("".into(), "Ghost".into());
        let history = monthly("", -9.99, &[0, 30, 60, 90]);

        assert_eq!(
            suggester.suggest_with_history("   ", -9.99, &merchants, &history),
            OTHER_CATEGORY
        );
        assert_eq!(suggester.suggest("", -5000.0, &merchants), MAJOR_PURCHASE_CATEGORY);
    }

    #[test]
    fn test_explain_reports_rule() {
        let suggester = CategorySuggester::default();
        let empty = MerchantMap::new();
        let history = monthly("Cloud Storage", -2.99, &[0, 29, 60]);

        let suggestion = suggester.explain("Cloud Storage", -2.99, &empty, &history);
        assert_eq!(suggestion.category, SUBSCRIPTIONS_CATEGORY);
        assert_eq!(suggestion.rule, Some("recurrence"));

        let fallback = suggester.explain("zzz", -1.0, &empty, &[]);
        assert_eq!(fallback.rule, None);
        assert_eq!(
            suggester.rule_names(),
            vec!["merchant", "keyword", "recurrence", "magnitude"]
        );
    }
}
