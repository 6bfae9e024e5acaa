//! Engine configuration
//!
//! Config is loaded with a two-layer resolution:
//! 1. Check for an override file (`LEDGERLENS_CONFIG`, else
//!    ~/.local/share/ledgerlens/config/engine.toml)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! Override files may be partial; any key they omit keeps its default.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{Error, Result};
use crate::models::PromptMode;

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/engine.toml");

/// Environment variable naming an explicit config file
pub const CONFIG_ENV_VAR: &str = "LEDGERLENS_CONFIG";

/// Settings that feed the FeatureSet computation
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureConfig {
    pub essential_categories: Vec<String>,
    pub large_transaction_multiplier: f64,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            essential_categories: [
                "Groceries",
                "Utilities",
                "Rent",
                "Mortgage",
                "Insurance",
                "Healthcare",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            large_transaction_multiplier: 3.0,
        }
    }
}

impl FeatureConfig {
    /// Case-insensitive membership in the essential set
    pub fn is_essential(&self, category: &str) -> bool {
        let category = category.trim();
        self.essential_categories
            .iter()
            .any(|c| c.trim().eq_ignore_ascii_case(category))
    }
}

/// Thresholds for the heuristic category suggester
#[derive(Debug, Clone, PartialEq)]
pub struct SuggesterConfig {
    pub large_purchase_threshold: f64,
    pub cadence_days: i64,
    pub cadence_tolerance_days: i64,
    pub min_occurrences: usize,
    pub cadence_consistency: f64,
}

impl Default for SuggesterConfig {
    fn default() -> Self {
        Self {
            large_purchase_threshold: 1000.0,
            cadence_days: 30,
            cadence_tolerance_days: 3,
            min_occurrences: 3,
            cadence_consistency: 0.7,
        }
    }
}

/// Backend order and dispatch limits
#[derive(Debug, Clone, PartialEq)]
pub struct RouterConfig {
    /// Primary first; only the first two are ever attempted
    pub backends: Vec<String>,
    /// Bound on each attempt
    pub timeout: Duration,
    pub refusal_sentinels: Vec<String>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            backends: vec!["mistral".to_string(), "llama3".to_string()],
            timeout: Duration::from_secs(60),
            refusal_sentinels: vec![
                "I'm sorry, but I can't".to_string(),
                "I cannot help with that".to_string(),
                "As an AI language model, I cannot".to_string(),
            ],
        }
    }
}

impl RouterConfig {
    pub fn primary(&self) -> Option<&str> {
        self.backends.first().map(String::as_str)
    }

    pub fn secondary(&self) -> Option<&str> {
        self.backends.get(1).map(String::as_str)
    }
}

/// Complete engine configuration
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EngineConfig {
    pub features: FeatureConfig,
    pub suggester: SuggesterConfig,
    pub router: RouterConfig,
    pub default_mode: PromptMode,
}

impl EngineConfig {
    /// Load from the override location if present, else embedded defaults
    pub fn load() -> Result<Self> {
        load_config(None)
    }

    /// Load from an explicit path (embedded defaults if it does not exist)
    pub fn load_from(path: &Path) -> Result<Self> {
        load_config(Some(path))
    }

    /// Embedded defaults only
    pub fn embedded() -> Result<Self> {
        parse_config(DEFAULT_CONFIG)
    }

    /// Parse TOML content on top of the defaults
    pub fn from_toml(content: &str) -> Result<Self> {
        parse_config(content)
    }

    /// Reject values that would make the engine misbehave silently
    pub fn validate(&self) -> Result<()> {
        let multiplier = self.features.large_transaction_multiplier;
        if !multiplier.is_finite() || multiplier <= 0.0 {
            return Err(Error::Config(format!(
                "large_transaction_multiplier must be positive, got {}",
                multiplier
            )));
        }
        let threshold = self.suggester.large_purchase_threshold;
        if !threshold.is_finite() || threshold <= 0.0 {
            return Err(Error::Config(format!(
                "large_purchase_threshold must be positive, got {}",
                threshold
            )));
        }
        if self.router.timeout.is_zero() {
            return Err(Error::Config("timeout_secs must be at least 1".into()));
        }
        if self.suggester.cadence_days <= 0 || self.suggester.cadence_tolerance_days < 0 {
            return Err(Error::Config(
                "cadence_days must be positive and cadence_tolerance_days non-negative".into(),
            ));
        }
        if self.suggester.min_occurrences < 2 {
            return Err(Error::Config("min_occurrences must be at least 2".into()));
        }
        if !(0.0..=1.0).contains(&self.suggester.cadence_consistency) {
            return Err(Error::Config(
                "cadence_consistency must be between 0 and 1".into(),
            ));
        }
        if self.router.backends.iter().any(|b| b.trim().is_empty()) {
            return Err(Error::Config("backend identifiers must not be blank".into()));
        }
        Ok(())
    }
}

/// Default config override path
pub fn default_config_path() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("ledgerlens").join("config").join("engine.toml"))
}

/// Resolve which override file (if any) applies
fn override_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }
    default_config_path()
}

/// Load configuration (override first, then default)
fn load_config(explicit: Option<&Path>) -> Result<EngineConfig> {
    let path = explicit.map(Path::to_path_buf).or_else(override_path);

    let content = match path {
        Some(ref path) if path.exists() => {
            tracing::debug!(path = %path.display(), "Loading engine config override");
            fs::read_to_string(path)?
        }
        _ => DEFAULT_CONFIG.to_string(),
    };

    parse_config(&content)
}

/// Raw config structure for TOML parsing
#[derive(Debug, Deserialize)]
struct RawConfig {
    features: Option<RawFeatures>,
    suggester: Option<RawSuggester>,
    router: Option<RawRouter>,
    engine: Option<RawEngine>,
}

#[derive(Debug, Deserialize)]
struct RawFeatures {
    essential_categories: Option<Vec<String>>,
    large_transaction_multiplier: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawSuggester {
    large_purchase_threshold: Option<f64>,
    cadence_days: Option<i64>,
    cadence_tolerance_days: Option<i64>,
    min_occurrences: Option<usize>,
    cadence_consistency: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct RawRouter {
    backends: Option<Vec<String>>,
    timeout_secs: Option<u64>,
    refusal_sentinels: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct RawEngine {
    default_mode: Option<String>,
}

/// Parse config from TOML content
fn parse_config(content: &str) -> Result<EngineConfig> {
    let raw: RawConfig = toml::from_str(content)?;

    let mut config = EngineConfig::default();

    if let Some(features) = raw.features {
        if let Some(categories) = features.essential_categories {
            config.features.essential_categories = categories;
        }
        if let Some(multiplier) = features.large_transaction_multiplier {
            config.features.large_transaction_multiplier = multiplier;
        }
    }

    if let Some(suggester) = raw.suggester {
        if let Some(threshold) = suggester.large_purchase_threshold {
            config.suggester.large_purchase_threshold = threshold;
        }
        if let Some(days) = suggester.cadence_days {
            config.suggester.cadence_days = days;
        }
        if let Some(tolerance) = suggester.cadence_tolerance_days {
            config.suggester.cadence_tolerance_days = tolerance;
        }
        if let Some(min) = suggester.min_occurrences {
            config.suggester.min_occurrences = min;
        }
        if let Some(consistency) = suggester.cadence_consistency {
            config.suggester.cadence_consistency = consistency;
        }
    }

    if let Some(router) = raw.router {
        if let Some(backends) = router.backends {
            config.router.backends = backends;
        }
        if let Some(timeout) = router.timeout_secs {
            config.router.timeout = Duration::from_secs(timeout);
        }
        if let Some(sentinels) = router.refusal_sentinels {
            config.router.refusal_sentinels = sentinels;
        }
    }

    if let Some(engine) = raw.engine {
        if let Some(mode) = engine.default_mode {
            config.default_mode = mode.parse().map_err(Error::Config)?;
        }
    }

    config.validate()?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_parse_default_config() {
        let config = parse_config(DEFAULT_CONFIG).unwrap();
        assert_eq!(config, EngineConfig::default());
        assert_eq!(config.router.primary(), Some("mistral"));
        assert_eq!(config.router.secondary(), Some("llama3"));
    }

    #[test]
    fn test_partial_override_keeps_defaults() {
        let config = parse_config(
            r#"
[features]
large_transaction_multiplier = 2.5

[router]
backends = ["gemma3"]
"#,
        )
        .unwrap();

        assert_eq!(config.features.large_transaction_multiplier, 2.5);
        assert_eq!(
            config.features.essential_categories,
            FeatureConfig::default().essential_categories
        );
        assert_eq!(config.router.backends, vec!["gemma3".to_string()]);
        assert_eq!(config.router.secondary(), None);
        assert_eq!(config.router.timeout, Duration::from_secs(60));
        assert_eq!(config.suggester, SuggesterConfig::default());
    }

    #[test]
    fn test_rejects_invalid_values() {
        assert!(matches!(
            parse_config("[features]\nlarge_transaction_multiplier = 0.0"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            parse_config("[router]\ntimeout_secs = 0"),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            parse_config("[engine]\ndefault_mode = \"chatty\""),
            Err(Error::Config(_))
        ));
        assert!(matches!(
            parse_config("[router]\nbackends = [\"mistral\", \" \"]"),
            Err(Error::Config(_))
        ));
        assert!(matches!(parse_config("not toml = ["), Err(Error::Toml(_))));
    }

    #[test]
    fn test_rejects_non_positive_purchase_threshold() {
        for value in ["-50.0", "0.0", "nan", "inf"] {
            let toml = format!("[suggester]\nlarge_purchase_threshold = {}", value);
            assert!(
                matches!(parse_config(&toml), Err(Error::Config(_))),
                "threshold {} was accepted",
                value
            );
        }
        assert!(parse_config("[suggester]\nlarge_purchase_threshold = 250.0").is_ok());
    }

    #[test]
    fn test_essential_membership_is_case_insensitive() {
        let features = FeatureConfig::default();
        assert!(features.is_essential("groceries"));
        assert!(features.is_essential(" RENT "));
        assert!(!features.is_essential("Dining"));
        assert!(!features.is_essential("Grocery Delivery"));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[engine]\ndefault_mode = \"basic\"").unwrap();

        let config = EngineConfig::load_from(file.path()).unwrap();
        assert_eq!(config.default_mode, PromptMode::Basic);
    }

    #[test]
    fn test_load_from_unreadable_path() {
        let dir = tempfile::tempdir().unwrap();
        let result = EngineConfig::load_from(dir.path());
        assert!(matches!(result, Err(Error::Io(_))));
    }

    #[test]
    fn test_load_from_missing_file_uses_embedded() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, EngineConfig::embedded().unwrap());
    }
}
