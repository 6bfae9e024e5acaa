//! Shared command utilities
//!
//! This module contains:
//! - `load_config` - Engine config from --config or the default locations
//! - `build_filter` / `load_ledger` - Read a filtered ledger CSV
//! - `resolve_mode` - Prompt mode from --mode or the config default
//! - `default_client` - Model client from the environment

use std::fs::File;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::NaiveDate;
use ledgerlens_core::ai::AIClient;
use ledgerlens_core::config::EngineConfig;
use ledgerlens_core::models::{PromptMode, Transaction};
use ledgerlens_core::repository::{InMemoryRepository, TransactionFilter, TransactionRepository};

use crate::cli::LedgerArgs;

/// Ollama address used when OLLAMA_HOST is not set
pub const DEFAULT_OLLAMA_HOST: &str = "http://localhost:11434";

/// Load the engine config from an explicit path or the default locations
pub fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let config = match path {
        Some(path) => {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            EngineConfig::load_from(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?
        }
        None => EngineConfig::load().context("Failed to load engine config")?,
    };
    Ok(config)
}

/// Build a repository filter from CLI arguments
pub fn build_filter(
    from: Option<&str>,
    to: Option<&str>,
    category: Option<&str>,
) -> Result<TransactionFilter> {
    let from = from.map(parse_date).transpose()?;
    let to = to.map(parse_date).transpose()?;

    if let (Some(from), Some(to)) = (from, to) {
        if from > to {
            anyhow::bail!("--from ({}) is after --to ({})", from, to);
        }
    }

    Ok(TransactionFilter {
        from,
        to,
        category: category.map(str::to_string),
        search: None,
    })
}

/// Read a ledger CSV and apply the filter arguments
pub fn load_ledger(args: &LedgerArgs) -> Result<Vec<Transaction>> {
    let filter = build_filter(
        args.from.as_deref(),
        args.to.as_deref(),
        args.category.as_deref(),
    )?;
    let repo = open_repository(&args.file)?;
    let transactions = repo.list_transactions(&filter)?;

    tracing::debug!(
        file = %args.file.display(),
        loaded = repo.len(),
        selected = transactions.len(),
        "Ledger loaded"
    );
    Ok(transactions)
}

/// Read every transaction in a ledger CSV
pub fn open_repository(path: &Path) -> Result<InMemoryRepository> {
    let file =
        File::open(path).with_context(|| format!("Failed to open ledger {}", path.display()))?;
    InMemoryRepository::from_csv(file)
        .with_context(|| format!("Failed to parse ledger {}", path.display()))
}

/// Prompt mode from --mode, or the configured default
pub fn resolve_mode(mode: Option<&str>, config: &EngineConfig) -> Result<PromptMode> {
    match mode {
        Some(mode) => mode.parse().map_err(|e: String| anyhow::anyhow!(e)),
        None => Ok(config.default_mode),
    }
}

/// Model client from AI_BACKEND / OLLAMA_HOST, defaulting to a local Ollama
pub fn default_client() -> AIClient {
    AIClient::from_env().unwrap_or_else(|| {
        tracing::debug!(host = DEFAULT_OLLAMA_HOST, "OLLAMA_HOST not set, using default");
        AIClient::ollama(DEFAULT_OLLAMA_HOST)
    })
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
        .with_context(|| format!("Invalid date '{}', expected YYYY-MM-DD", s))
}
