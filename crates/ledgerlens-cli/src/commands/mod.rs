//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `ledger` - Shared utilities (config, ledger loading, filters, model client)
//! - `insights` - Summary, ask and health commands
//! - `suggest` - Category suggestion and intent classification
//! - `prompts` - Prompt library management commands
//! - `config` - Engine configuration commands

pub mod config;
pub mod insights;
pub mod ledger;
pub mod prompts;
pub mod suggest;

// Re-export command functions for main.rs
pub use config::*;
pub use insights::*;
pub use ledger::*;
pub use prompts::*;
pub use suggest::*;

/// How command results are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    Text,
    Json,
}

/// Print a value as pretty JSON
pub fn print_json<T: serde::Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Print where an override file or directory lives, noting if it is missing
pub fn print_override_location(location: Option<std::path::PathBuf>, missing_note: &str) {
    let Some(path) = location else {
        eprintln!("No data directory on this system; only embedded defaults are available.");
        return;
    };

    println!("{}", path.display());
    if !path.exists() {
        eprintln!();
        eprintln!("{}", missing_note);
    }
}

/// Truncate a string to a maximum length, adding "..." if truncated
pub fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", kept)
    }
}
