//! LedgerLens CLI - Financial insights over a transaction ledger
//!
//! Usage:
//!   ledgerlens summary --file ledger.csv          Computed metrics, no model
//!   ledgerlens ask "Question?" --file ledger.csv  Ask the model backends
//!   ledgerlens suggest "NETFLIX.COM" -a -15.49    Suggest a category
//!   ledgerlens prompts list                       Prompt templates

mod cli;
mod commands;


use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use ledgerlens_core::prompts::PromptLibrary;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    // Logs go to stderr so --json output stays parseable
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();

    let output = if cli.json {
        commands::Output::Json
    } else {
        commands::Output::Text
    };
    let config_path = cli.config.as_deref();

    match cli.command {
        Commands::Summary { ledger } => commands::cmd_summary(config_path, &ledger, output),
        Commands::Ask {
            question,
            ledger,
            mode,
            no_fallback,
        } => {
            let client = Arc::new(commands::default_client());
            commands::cmd_ask(
                config_path,
                client,
                &PromptLibrary::new(),
                &question,
                &ledger,
                mode.as_deref(),
                no_fallback,
                output,
            )
            .await
        }
        Commands::Suggest {
            description,
            amount,
            history,
        } => commands::cmd_suggest(
            config_path,
            &description,
            amount,
            history.as_deref(),
            output,
        ),
        Commands::Intent { question } => commands::cmd_intent(&question, output),
        Commands::Prompts { action } => match action {
            None | Some(PromptsAction::List) => commands::cmd_prompts_list(output),
            Some(PromptsAction::Show { prompt_id }) => commands::cmd_prompts_show(&prompt_id),
            Some(PromptsAction::Path) => commands::cmd_prompts_path(),
            Some(PromptsAction::Render {
                question,
                ledger,
                mode,
            }) => commands::cmd_prompts_render(
                config_path,
                &question,
                &ledger,
                mode.as_deref(),
                output,
            ),
        },
        Commands::Config { action } => match action {
            None | Some(ConfigAction::Show) => commands::cmd_config_show(config_path, output),
            Some(ConfigAction::Path) => commands::cmd_config_path(),
        },
        Commands::Health => {
            let client = commands::default_client();
            commands::cmd_health(&client).await
        }
    }
}
