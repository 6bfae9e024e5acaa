//! Engine configuration commands

use std::path::Path;

use anyhow::Result;
use ledgerlens_core::config::{default_config_path, CONFIG_ENV_VAR};
use serde_json::json;

use super::{load_config, print_json, print_override_location, Output};

/// Show the effective configuration
pub fn cmd_config_show(config_path: Option<&Path>, output: Output) -> Result<()> {
    let config = load_config(config_path)?;

    if output == Output::Json {
        return print_json(&json!({
            "features": {
                "essential_categories": config.features.essential_categories,
                "large_transaction_multiplier": config.features.large_transaction_multiplier,
            },
            "suggester": {
                "large_purchase_threshold": config.suggester.large_purchase_threshold,
                "cadence_days": config.suggester.cadence_days,
                "cadence_tolerance_days": config.suggester.cadence_tolerance_days,
                "min_occurrences": config.suggester.min_occurrences,
                "cadence_consistency": config.suggester.cadence_consistency,
            },
            "router": {
                "backends": config.router.backends,
                "timeout_secs": config.router.timeout.as_secs(),
                "refusal_sentinels": config.router.refusal_sentinels,
            },
            "engine": {
                "default_mode": config.default_mode,
            },
        }));
    }

    println!("Features:");
    println!(
        "  Essential categories:       {}",
        config.features.essential_categories.join(", ")
    );
    println!(
        "  Large transaction multiple: {}x category mean",
        config.features.large_transaction_multiplier
    );
    println!();
    println!("Suggester:");
    println!(
        "  Major purchase threshold:   {}",
        config.suggester.large_purchase_threshold
    );
    println!(
        "  Subscription cadence:       {} ± {} days, {}+ occurrences, {:.0}% on cadence",
        config.suggester.cadence_days,
        config.suggester.cadence_tolerance_days,
        config.suggester.min_occurrences,
        config.suggester.cadence_consistency * 100.0
    );
    println!();
    println!("Router:");
    println!(
        "  Primary backend:            {}",
        config.router.primary().unwrap_or("(none)")
    );
    println!(
        "  Secondary backend:          {}",
        config.router.secondary().unwrap_or("(none)")
    );
    println!(
        "  Timeout per attempt:        {}s",
        config.router.timeout.as_secs()
    );
    println!(
        "  Refusal sentinels:          {}",
        config.router.refusal_sentinels.len()
    );
    println!();
    println!("Default prompt mode: {}", config.default_mode);

    Ok(())
}

/// Show the path of the config override file
pub fn cmd_config_path() -> Result<()> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            println!("{}", path);
            eprintln!("(from {})", CONFIG_ENV_VAR);
            return Ok(());
        }
    }

    print_override_location(
        default_config_path(),
        "Not created yet; embedded defaults are in use.",
    );

    Ok(())
}
