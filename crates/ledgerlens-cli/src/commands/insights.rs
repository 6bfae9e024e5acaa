//! Insight command implementations (summary, ask, health)

use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use ledgerlens_core::ai::ModelClient;
use ledgerlens_core::engine::{render_summary, Answer, InsightEngine};
use ledgerlens_core::features::{FeatureExtractor, FeatureSet};
use ledgerlens_core::models::{FailureReason, ModelResponse};
use ledgerlens_core::prompts::{format_money, PromptComposer, PromptLibrary};

use super::{load_config, load_ledger, print_json, resolve_mode, truncate, Output};
use crate::cli::LedgerArgs;

/// Show computed metrics for a ledger
///
/// Needs neither prompts nor a model client.
pub fn cmd_summary(config_path: Option<&Path>, ledger: &LedgerArgs, output: Output) -> Result<()> {
    let config = load_config(config_path)?;
    let transactions = load_ledger(ledger)?;

    let features = FeatureExtractor::new(config.features).summarize(&transactions);
    match output {
        Output::Json => print_json(&features),
        Output::Text => {
            println!("{}", render_summary(&features));
            print_monthly_table(&features);
            Ok(())
        }
    }
}

fn print_monthly_table(features: &FeatureSet) {
    if features.monthly_series.len() < 2 {
        return;
    }

    println!();
    println!("{:<8} {:>14} {:>14} {:>14}", "MONTH", "INCOME", "EXPENSES", "NET");
    println!("{}", "-".repeat(53));
    for point in &features.monthly_series {
        println!(
            "{:<8} {:>14} {:>14} {:>14}",
            point.month.to_string(),
            format_money(point.income),
            format_money(point.expense),
            format_money(point.net())
        );
    }
}

/// Ask a question about a ledger
///
/// With `no_fallback`, a failed dispatch (or prompts that cannot be loaded)
/// is an error instead of the computed summary.
#[allow(clippy::too_many_arguments)]
pub async fn cmd_ask(
    config_path: Option<&Path>,
    client: Arc<dyn ModelClient>,
    prompts: &PromptLibrary,
    question: &str,
    ledger: &LedgerArgs,
    mode: Option<&str>,
    no_fallback: bool,
    output: Output,
) -> Result<()> {
    let config = load_config(config_path)?;
    let mode = resolve_mode(mode, &config)?;
    let transactions = load_ledger(ledger)?;

    let composer = match PromptComposer::from_library(prompts) {
        Ok(composer) => composer,
        Err(e) if no_fallback => {
            return Err(anyhow::Error::from(e).context("Failed to load prompts"));
        }
        Err(e) => {
            tracing::warn!(error = %e, "Cannot load prompts, showing computed summary");
            let features = FeatureExtractor::new(config.features).summarize(&transactions);
            let response = ModelResponse::failed(FailureReason::EmptyOutput);
            return print_answer(&Answer::fallback(&features, response), output);
        }
    };
    let engine = InsightEngine::with_composer(config, client, composer);

    if no_fallback {
        let response = engine.ask(question, &transactions, mode).await;
        if output == Output::Json {
            print_json(&response)?;
        } else if response.succeeded {
            print_response(&response);
        }
        if !response.succeeded {
            let reason = response
                .failure_reason
                .map(|r| r.to_string())
                .unwrap_or_else(|| "unknown".to_string());
            anyhow::bail!("No model produced an answer ({})", reason);
        }
        return Ok(());
    }

    let answer = engine.answer(question, &transactions, mode).await;
    print_answer(&answer, output)
}

fn print_answer(answer: &Answer, output: Output) -> Result<()> {
    match output {
        Output::Json => print_json(answer),
        Output::Text => {
            match answer {
                Answer::Model(response) => print_response(response),
                Answer::Fallback {
                    notice, summary, ..
                } => {
                    eprintln!("⚠️  {}", notice);
                    println!("{}", summary);
                }
            }
            Ok(())
        }
    }
}

fn print_response(response: &ModelResponse) {
    println!("{}", response.text.trim());
    if let Some(backend) = &response.backend_used {
        eprintln!();
        eprintln!("(answered by {})", truncate(backend, 40));
    }
}

/// Check that the model runtime is reachable
pub async fn cmd_health(client: &dyn ModelClient) -> Result<()> {
    print!("Checking model runtime at {}... ", client.host());
    if client.health_check().await {
        println!("✅ Connected");
        Ok(())
    } else {
        println!("❌ Failed");
        println!();
        println!("To set up Ollama:");
        println!("  1. Install Ollama: https://ollama.ai/download");
        println!("  2. Start the server: ollama serve");
        println!("  3. Pull the configured models (see `ledgerlens config show`)");
        println!("  4. Set environment variable: export OLLAMA_HOST=<url>");
        anyhow::bail!("Model runtime unreachable at {}", client.host())
    }
}
