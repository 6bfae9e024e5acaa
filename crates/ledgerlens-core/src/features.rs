//! Feature extraction
//!
//! Turns a transaction ledger into a [`FeatureSet`]: totals, savings rate,
//! per-category spend, a monthly series, spending consistency, outlier flags
//! and the essential/lifestyle split.
//!
//! The extractor is a pure function of its input and [`FeatureConfig`]. All
//! grouping goes through ordered maps, so identical input always produces an
//! identical FeatureSet.
//!
//! Sign convention: only `amount < 0` rows are expenses. A row labelled
//! "Groceries" with a positive amount (a refund) is income, and an "Income"
//! row never reaches `category_totals`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};

use crate::config::FeatureConfig;
use crate::error::{Error, Result};
use crate::models::{Transaction, TransactionId};

/// Bucket for expense rows without a category label
pub const UNCATEGORIZED: &str = "Uncategorized";

/// Coefficient of variation below which spending is considered consistent
const CONSISTENT_CV: f64 = 0.5;
/// Coefficient of variation below which spending is considered variable
const VARIABLE_CV: f64 = 1.0;
/// Months of history needed before projecting the next month
const PROJECTION_MIN_MONTHS: usize = 3;
/// Months of history for a high-confidence projection
const PROJECTION_HIGH_CONFIDENCE_MONTHS: usize = 6;

/// Calendar month key, ordered chronologically
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }
}

impl fmt::Display for YearMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Summed expense for one category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub category: String,
    /// Sum of absolute expense amounts
    pub amount: f64,
    /// Fraction of total expenses (0.0 - 1.0)
    pub share: f64,
}

/// Income and expense for one month that had at least one transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyPoint {
    pub month: YearMonth,
    pub income: f64,
    /// Absolute value of summed expenses
    pub expense: f64,
}

impl MonthlyPoint {
    pub fn net(&self) -> f64 {
        self.income - self.expense
    }
}

/// How much history backs a projection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }
}

/// Next-month expense estimate from the recent monthly trend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    pub next_month_expense: f64,
    /// Mean month-over-month change across the last three months
    pub monthly_change: f64,
    pub confidence: Confidence,
}

/// Human-readable bucket for the consistency score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyLabel {
    Consistent,
    Variable,
    HighlyVariable,
}

impl ConsistencyLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConsistencyLabel::Consistent => "consistent",
            ConsistencyLabel::Variable => "variable",
            ConsistencyLabel::HighlyVariable => "highly variable",
        }
    }
}

/// Aggregate metrics derived from a ledger
///
/// Recomputed per request and never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureSet {
    pub transaction_count: usize,
    pub total_expenses: f64,
    pub total_income: f64,
    pub net_savings: f64,
    /// `net_savings / total_income`; `None` when there is no income
    pub savings_rate: Option<f64>,
    /// Descending by amount, ties by category name
    pub category_totals: Vec<CategoryTotal>,
    /// Chronological. Months without transactions are omitted, not zero-filled,
    /// so consecutive entries are not necessarily consecutive months.
    pub monthly_series: Vec<MonthlyPoint>,
    /// Coefficient of variation of monthly expense; `None` below two months
    pub consistency_score: Option<f64>,
    pub large_transaction_flags: BTreeSet<TransactionId>,
    /// Essential spend / everything else; `None` when nothing else was spent
    pub essential_vs_lifestyle_ratio: Option<f64>,
    pub essential_spend: f64,
    pub lifestyle_spend: f64,
    /// Earliest and latest transaction dates
    pub date_range: Option<(NaiveDate, NaiveDate)>,
    /// Total expenses divided by the number of active months
    pub average_monthly_expense: f64,
    pub peak_spending_day: Option<Weekday>,
    pub projection: Option<Projection>,
}

impl FeatureSet {
    /// Zeroed FeatureSet for a ledger with no transactions
    pub fn empty() -> Self {
        Self {
            transaction_count: 0,
            total_expenses: 0.0,
            total_income: 0.0,
            net_savings: 0.0,
            savings_rate: None,
            category_totals: Vec::new(),
            monthly_series: Vec::new(),
            consistency_score: None,
            large_transaction_flags: BTreeSet::new(),
            essential_vs_lifestyle_ratio: None,
            essential_spend: 0.0,
            lifestyle_spend: 0.0,
            date_range: None,
            average_monthly_expense: 0.0,
            peak_spending_day: None,
            projection: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.transaction_count == 0
    }

    pub fn top_category(&self) -> Option<&CategoryTotal> {
        self.category_totals.first()
    }

    pub fn consistency_label(&self) -> Option<ConsistencyLabel> {
        self.consistency_score.map(|cv| {
            if cv < CONSISTENT_CV {
                ConsistencyLabel::Consistent
            } else if cv < VARIABLE_CV {
                ConsistencyLabel::Variable
            } else {
                ConsistencyLabel::HighlyVariable
            }
        })
    }
}

/// Computes [`FeatureSet`]s for a fixed configuration
#[derive(Debug, Clone)]
pub struct FeatureExtractor {
    config: FeatureConfig,
}

impl FeatureExtractor {
    pub fn new(config: FeatureConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Extract features from a ledger
    ///
    /// Fails only when `transactions` is empty. Every other edge case (all
    /// income, a single category, one month of data) yields a FeatureSet with
    /// the affected metrics set to `None` or zero.
    pub fn extract(&self, transactions: &[Transaction]) -> Result<FeatureSet> {
        if transactions.is_empty() {
            return Err(Error::InsufficientData(
                "cannot extract features from an empty ledger".into(),
            ));
        }

        let mut total_expenses = 0.0;
        let mut total_income = 0.0;
        let mut by_category: BTreeMap<&str, CategoryAccumulator> = BTreeMap::new();
        let mut by_month: BTreeMap<YearMonth, (f64, f64)> = BTreeMap::new();
        let mut by_weekday: BTreeMap<u32, f64> = BTreeMap::new();
        let mut first_date = transactions[0].date;
        let mut last_date = transactions[0].date;

        for tx in transactions {
            first_date = first_date.min(tx.date);
            last_date = last_date.max(tx.date);
            let month = by_month.entry(YearMonth::of(tx.date)).or_insert((0.0, 0.0));

            if !tx.amount.is_finite() {
                tracing::debug!(id = tx.id, "Skipping non-finite amount");
                continue;
            }

            if tx.is_income() {
                total_income += tx.amount;
                month.0 += tx.amount;
            } else if tx.is_expense() {
                let spent = tx.amount.abs();
                total_expenses += spent;
                month.1 += spent;
                by_category
                    .entry(category_label(tx))
                    .or_default()
                    .push(tx.id, spent);
                *by_weekday
                    .entry(tx.date.weekday().num_days_from_monday())
                    .or_insert(0.0) += spent;
            }
        }

        let net_savings = total_income - total_expenses;
        let savings_rate = if total_income > 0.0 {
            Some(net_savings / total_income)
        } else {
            None
        };

        let mut category_totals: Vec<CategoryTotal> = by_category
            .iter()
            .map(|(category, acc)| CategoryTotal {
                category: (*category).to_string(),
                amount: acc.total,
                share: if total_expenses > 0.0 {
                    acc.total / total_expenses
                } else {
                    0.0
                },
            })
            .collect();
        category_totals.sort_by(|a, b| {
            b.amount
                .total_cmp(&a.amount)
                .then_with(|| a.category.cmp(&b.category))
        });

        let multiplier = self.config.large_transaction_multiplier;
        let large_transaction_flags = by_category
            .values()
            .flat_map(|acc| {
                let threshold = acc.mean() * multiplier;
                acc.rows
                    .iter()
                    .filter(move |(_, spent)| *spent > threshold)
                    .map(|(id, _)| *id)
            })
            .collect();

        let (essential_spend, lifestyle_spend) =
            category_totals
                .iter()
                .fold((0.0, 0.0), |(essential, lifestyle), total| {
                    if self.config.is_essential(&total.category) {
                        (essential + total.amount, lifestyle)
                    } else {
                        (essential, lifestyle + total.amount)
                    }
                });
        let essential_vs_lifestyle_ratio = if lifestyle_spend > 0.0 {
            Some(essential_spend / lifestyle_spend)
        } else {
            None
        };

        let monthly_series: Vec<MonthlyPoint> = by_month
            .into_iter()
            .map(|(month, (income, expense))| MonthlyPoint {
                month,
                income,
                expense,
            })
            .collect();
        let monthly_expenses: Vec<f64> = monthly_series.iter().map(|p| p.expense).collect();

        let average_monthly_expense = total_expenses / monthly_series.len() as f64;

        // Highest spend wins; BTreeMap order makes Monday win ties
        let peak_spending_day = by_weekday
            .iter()
            .fold(None::<(u32, f64)>, |best, (&day, &amount)| match best {
                Some((_, best_amount)) if best_amount >= amount => best,
                _ => Some((day, amount)),
            })
            .and_then(|(day, _)| weekday_from_index(day));

        Ok(FeatureSet {
            transaction_count: transactions.len(),
            total_expenses,
            total_income,
            net_savings,
            savings_rate,
            category_totals,
            consistency_score: coefficient_of_variation(&monthly_expenses),
            projection: project_next_month(&monthly_expenses),
            monthly_series,
            large_transaction_flags,
            essential_vs_lifestyle_ratio,
            essential_spend,
            lifestyle_spend,
            date_range: Some((first_date, last_date)),
            average_monthly_expense,
            peak_spending_day,
        })
    }

    /// Like [`extract`](Self::extract), with an empty ledger giving [`FeatureSet::empty`]
    pub fn summarize(&self, transactions: &[Transaction]) -> FeatureSet {
        self.extract(transactions).unwrap_or_else(|_| FeatureSet::empty())
    }
}

impl Default for FeatureExtractor {
    fn default() -> Self {
        Self::new(FeatureConfig::default())
    }
}

#[derive(Debug, Default)]
struct CategoryAccumulator {
    total: f64,
    rows: Vec<(TransactionId, f64)>,
}

impl CategoryAccumulator {
    fn push(&mut self, id: TransactionId, spent: f64) {
        self.total += spent;
        self.rows.push((id, spent));
    }

    fn mean(&self) -> f64 {
        if self.rows.is_empty() {
            0.0
        } else {
            self.total / self.rows.len() as f64
        }
    }
}

fn category_label(tx: &Transaction) -> &str {
    let label = tx.category.trim();
    if label.is_empty() {
        UNCATEGORIZED
    } else {
        label
    }
}

fn weekday_from_index(day: u32) -> Option<Weekday> {
    match day {
        0 => Some(Weekday::Mon),
        1 => Some(Weekday::Tue),
        2 => Some(Weekday::Wed),
        3 => Some(Weekday::Thu),
        4 => Some(Weekday::Fri),
        5 => Some(Weekday::Sat),
        6 => Some(Weekday::Sun),
        _ => None,
    }
}

/// Sample standard deviation over mean
///
/// `None` with fewer than two values or a zero mean.
fn coefficient_of_variation(values: &[f64]) -> Option<f64> {
    if values.len() < 2 {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    if mean <= 0.0 {
        return None;
    }
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1.0);
    Some(variance.sqrt() / mean)
}

fn project_next_month(monthly_expenses: &[f64]) -> Option<Projection> {
    if monthly_expenses.len() < PROJECTION_MIN_MONTHS {
        return None;
    }
    let recent = &monthly_expenses[monthly_expenses.len() - PROJECTION_MIN_MONTHS..];
    let changes: Vec<f64> = recent.windows(2).map(|w| w[1] - w[0]).collect();
    let monthly_change = changes.iter().sum::<f64>() / changes.len() as f64;
    let last = recent[recent.len() - 1];

    Some(Projection {
        next_month_expense: (last + monthly_change).max(0.0),
        monthly_change,
        confidence: if monthly_expenses.len() >= PROJECTION_HIGH_CONFIDENCE_MONTHS {
            Confidence::High
        } else {
            Confidence::Medium
        },
    })
}
