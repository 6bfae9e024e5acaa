//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// LedgerLens - Ask questions about your budget
#[derive(Parser)]
#[command(name = "ledgerlens")]
#[command(about = "Financial insights over a transaction ledger", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Engine config file (defaults to LEDGERLENS_CONFIG, then the data directory)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Which part of the ledger to read
#[derive(Args, Debug, Clone)]
pub struct LedgerArgs {
    /// Ledger CSV (date,amount,category,description)
    #[arg(short, long)]
    pub file: PathBuf,

    /// Only include transactions on or after this date (YYYY-MM-DD)
    #[arg(long)]
    pub from: Option<String>,

    /// Only include transactions on or before this date (YYYY-MM-DD)
    #[arg(long)]
    pub to: Option<String>,

    /// Only include this category
    #[arg(long)]
    pub category: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show computed metrics for a ledger (never calls a model)
    Summary {
        #[command(flatten)]
        ledger: LedgerArgs,
    },

    /// Ask a question about a ledger
    Ask {
        /// The question, e.g. "Where does my money go?"
        question: String,

        #[command(flatten)]
        ledger: LedgerArgs,

        /// Prompt mode: basic, advanced (defaults to the configured mode)
        #[arg(short, long)]
        mode: Option<String>,

        /// Report the failure instead of showing the computed summary
        #[arg(long)]
        no_fallback: bool,
    },

    /// Suggest a category for a transaction
    Suggest {
        /// Transaction description or merchant text
        description: String,

        /// Amount (negative for expenses)
        #[arg(short, long, allow_hyphen_values = true)]
        amount: f64,

        /// Ledger CSV used to detect recurring charges
        #[arg(long)]
        history: Option<PathBuf>,
    },

    /// Classify the intent of a question
    Intent {
        /// The question to classify
        question: String,
    },

    /// Manage prompt templates
    Prompts {
        #[command(subcommand)]
        action: Option<PromptsAction>,
    },

    /// Show engine configuration
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },

    /// Check that the model runtime is reachable
    Health,
}

#[derive(Subcommand)]
pub enum PromptsAction {
    /// List all available prompts and their override status
    List,

    /// Show the content of a specific prompt
    Show {
        /// Prompt ID (basic_insight, advanced_insight)
        prompt_id: String,
    },

    /// Show the path where prompt overrides should be placed
    Path,

    /// Print the prompt a question would send, without calling a model
    Render {
        /// The question
        question: String,

        #[command(flatten)]
        ledger: LedgerArgs,

        /// Prompt mode: basic, advanced (defaults to the configured mode)
        #[arg(short, long)]
        mode: Option<String>,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show the effective configuration
    Show,

    /// Show the path of the config override file
    Path,
}
