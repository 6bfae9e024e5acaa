//! Prompts-related command implementations

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use ledgerlens_core::ai::AIClient;
use ledgerlens_core::engine::InsightEngine;
use ledgerlens_core::prompts::{default_prompts_dir, PromptId, PromptLibrary};

use super::{load_config, load_ledger, print_json, print_override_location, resolve_mode, Output};
use crate::cli::LedgerArgs;

/// List all available prompts and their override status
pub fn cmd_prompts_list(output: Output) -> Result<()> {
    let library = PromptLibrary::new();
    let prompts = library.list();

    if output == Output::Json {
        return print_json(&prompts);
    }

    println!("Available Prompts:\n");

    // Header
    println!("{:<20} {:>7}  {:<10}  {}", "ID", "VERSION", "MODE", "OVERRIDE");
    println!("{}", "-".repeat(50));

    for info in prompts {
        let override_status = if info.has_override {
            "✓ Custom"
        } else {
            "Default"
        };
        let mode = info
            .mode
            .map(|m| m.to_string())
            .unwrap_or_else(|| "invalid".to_string());

        println!(
            "{:<20} {:>7}  {:<10}  {}",
            info.id, info.version, mode, override_status
        );
    }

    println!();
    println!(
        "Override directory: {}",
        default_prompts_dir()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(not available)".to_string())
    );

    println!();
    println!("To customize a prompt:");
    println!("  1. Copy the default to the override directory");
    println!("  2. Edit the file, keeping the frontmatter and the # System / # User headings");
    println!("  3. Check the result with `ledgerlens prompts render`");

    Ok(())
}

/// Show the content of a specific prompt
pub fn cmd_prompts_show(prompt_id: &str) -> Result<()> {
    let library = PromptLibrary::new();

    let Some(id) = PromptId::all()
        .iter()
        .copied()
        .find(|id| id.as_str() == prompt_id)
    else {
        eprintln!("Unknown prompt ID: {}", prompt_id);
        eprintln!();
        eprintln!("Available prompts:");
        for id in PromptId::all() {
            eprintln!("  - {}", id.as_str());
        }
        anyhow::bail!("Unknown prompt ID: {}", prompt_id);
    };

    let prompt = library.load(id)?;

    println!("Prompt: {}", prompt.metadata.id);
    println!("Version: {}", prompt.metadata.version);
    println!("Mode: {}", prompt.metadata.mode);
    println!(
        "Source: {}",
        if prompt.is_override {
            "Override"
        } else {
            "Default"
        }
    );

    if let Some(ref path) = prompt.override_path {
        println!("Override Path: {}", path.display());
    }

    println!();
    println!("--- Content ---");
    println!("{}", prompt.content);

    Ok(())
}

/// Show the path where prompt overrides should be placed
pub fn cmd_prompts_path() -> Result<()> {
    print_override_location(
        default_prompts_dir(),
        "Not created yet. Add basic_insight.md or advanced_insight.md here to override a prompt.",
    );
    Ok(())
}

/// Print the prompt a question would send, without calling a model
pub fn cmd_prompts_render(
    config_path: Option<&Path>,
    question: &str,
    ledger: &LedgerArgs,
    mode: Option<&str>,
    output: Output,
) -> Result<()> {
    let config = load_config(config_path)?;
    let mode = resolve_mode(mode, &config)?;
    let transactions = load_ledger(ledger)?;
    let engine = InsightEngine::new(config, Arc::new(AIClient::mock()))
        .context("Failed to load prompts")?;

    let prompt = engine
        .compose_prompt(question, &transactions, mode)
        .context("Cannot build a prompt for this ledger")?;

    match output {
        Output::Json => print_json(&prompt),
        Output::Text => {
            println!("--- System ---");
            println!("{}", prompt.system);
            println!();
            println!("--- User ---");
            println!("{}", prompt.user);
            Ok(())
        }
    }
}
