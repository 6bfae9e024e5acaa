//! Category suggestion and intent classification commands

use std::path::Path;

use anyhow::Result;
use ledgerlens_core::intent::IntentClassifier;
use ledgerlens_core::repository::{TransactionFilter, TransactionRepository};
use ledgerlens_core::suggest::{CategorySuggester, MerchantMap};
use serde_json::json;

use super::{load_config, open_repository, print_json, Output};

/// Suggest a category for a transaction
pub fn cmd_suggest(
    config_path: Option<&Path>,
    description: &str,
    amount: f64,
    history: Option<&Path>,
    output: Output,
) -> Result<()> {
    if !amount.is_finite() {
        anyhow::bail!("Amount must be a finite number");
    }

    let config = load_config(config_path)?;
    let history = match history {
        Some(path) => open_repository(path)?.list_transactions(&TransactionFilter::all())?,
        None => Vec::new(),
    };

    let suggester = CategorySuggester::new(&config.suggester);
    let suggestion = suggester.explain(description, amount, &MerchantMap::new(), &history);

    match output {
        Output::Json => print_json(&json!({
            "description": description,
            "amount": amount,
            "category": suggestion.category,
            "rule": suggestion.rule,
        })),
        Output::Text => {
            match suggestion.rule {
                Some(rule) => println!("{} (matched by {} rule)", suggestion.category, rule),
                None => println!("{} (no rule matched)", suggestion.category),
            }
            Ok(())
        }
    }
}

/// Classify the intent of a question
pub fn cmd_intent(question: &str, output: Output) -> Result<()> {
    let classifier = IntentClassifier::new();
    let intent = classifier.classify(question);
    let matches = classifier.matches(question);

    match output {
        Output::Json => print_json(&json!({
            "question": question,
            "intent": intent,
            "matches": matches,
        })),
        Output::Text => {
            println!("{}", intent);
            if matches.len() > 1 {
                let names: Vec<&str> = matches.iter().map(|i| i.as_str()).collect();
                println!("  (also matched: {})", names[1..].join(", "));
            }
            Ok(())
        }
    }
}
