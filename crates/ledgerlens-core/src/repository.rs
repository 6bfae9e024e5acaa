//! Transaction repository seam
//!
//! The engine only ever reads a filtered ledger snapshot. Storage lives behind
//! [`TransactionRepository`]; [`InMemoryRepository`] is the reference adapter,
//! fed from a canonical `date,amount,category,description` CSV.

use std::io::Read;

use chrono::NaiveDate;
use csv::{ReaderBuilder, StringRecord};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{Transaction, TransactionId};

/// Read-only access to the current ledger
pub trait TransactionRepository: Send + Sync {
    fn list_transactions(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>>;
}

/// Ledger filter applied by the repository
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionFilter {
    /// Inclusive lower date bound
    pub from: Option<NaiveDate>,
    /// Inclusive upper date bound
    pub to: Option<NaiveDate>,
    /// Case-insensitive exact category
    pub category: Option<String>,
    /// Case-insensitive substring of the description
    pub search: Option<String>,
}

impl TransactionFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn matches(&self, tx: &Transaction) -> bool {
        if self.from.is_some_and(|from| tx.date < from) {
            return false;
        }
        if self.to.is_some_and(|to| tx.date > to) {
            return false;
        }
        if let Some(category) = &self.category {
            if !tx.category.trim().eq_ignore_ascii_case(category.trim()) {
                return false;
            }
        }
        if let Some(search) = &self.search {
            let needle = search.trim().to_lowercase();
            if !needle.is_empty() && !tx.description.to_lowercase().contains(&needle) {
                return false;
            }
        }
        true
    }
}

/// Vec-backed repository
#[derive(Debug, Clone, Default)]
pub struct InMemoryRepository {
    transactions: Vec<Transaction>,
}

impl InMemoryRepository {
    pub fn new(transactions: Vec<Transaction>) -> Self {
        Self { transactions }
    }

    pub fn from_csv<R: Read>(reader: R) -> Result<Self> {
        load_csv(reader).map(Self::new)
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }
}

impl TransactionRepository for InMemoryRepository {
    fn list_transactions(&self, filter: &TransactionFilter) -> Result<Vec<Transaction>> {
        Ok(self
            .transactions
            .iter()
            .filter(|tx| filter.matches(tx))
            .cloned()
            .collect())
    }
}

/// Column positions resolved from the header row
struct Columns {
    date: usize,
    amount: usize,
    category: Option<usize>,
    description: Option<usize>,
}

impl Columns {
    fn from_headers(headers: &StringRecord) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };

        Ok(Self {
            date: find("date")
                .ok_or_else(|| Error::InvalidData("CSV is missing a 'date' column".into()))?,
            amount: find("amount")
                .ok_or_else(|| Error::InvalidData("CSV is missing an 'amount' column".into()))?,
            category: find("category"),
            description: find("description"),
        })
    }
}

/// Load a canonical ledger CSV
///
/// Requires `date` and `amount` columns; `category` and `description` are
/// optional. Ids are assigned by row order starting at 1.
pub fn load_csv<R: Read>(reader: R) -> Result<Vec<Transaction>> {
    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let columns = Columns::from_headers(rdr.headers()?)?;
    let mut transactions = Vec::new();

    for (index, result) in rdr.records().enumerate() {
        let record = result?;
        // Header is line 1
        let line = index + 2;
        let field = |i: usize| record.get(i).unwrap_or("");

        let date = parse_date(field(columns.date)).ok_or_else(|| {
            Error::InvalidData(format!(
                "line {}: invalid date '{}'",
                line,
                field(columns.date)
            ))
        })?;
        let amount = parse_amount(field(columns.amount)).ok_or_else(|| {
            Error::InvalidData(format!(
                "line {}: invalid amount '{}'",
                line,
                field(columns.amount)
            ))
        })?;

        transactions.push(Transaction::new(
            (index + 1) as TransactionId,
            date,
            amount,
            columns.category.map(field).unwrap_or(""),
            columns.description.map(field).unwrap_or(""),
        ));
    }

    debug!("Loaded {} transactions from CSV", transactions.len());
    Ok(transactions)
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    ["%Y-%m-%d", "%m/%d/%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Parse an amount, tolerating currency symbols and thousands separators
fn parse_amount(s: &str) -> Option<f64> {
    let cleaned = s.trim().replace(['$', ',', ' '], "");
    cleaned.parse::<f64>().ok().filter(|a| a.is_finite())
}
