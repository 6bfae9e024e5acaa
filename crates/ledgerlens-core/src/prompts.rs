//! Prompt library and composer
//!
//! Prompts are loaded with a two-layer resolution:
//! 1. Check for override in data dir (~/.local/share/ledgerlens/prompts/overrides/)
//! 2. Fall back to embedded defaults (compiled into binary)
//!
//! Templates are markdown with YAML frontmatter and `# System` / `# User`
//! sections. They support `{{var}}` substitution and `{{#if var}}...{{/if}}`
//! blocks, which are kept only when `var` is set and non-empty.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::features::FeatureSet;
use crate::models::{Intent, PromptMode};

/// Placeholder for metrics that are undefined for the current ledger
pub const NOT_AVAILABLE: &str = "n/a";

/// Rendered instead of figures when the ledger is empty
pub const NO_DATA: &str = "No data available.";

/// Months listed individually in the advanced prompt
const MONTHLY_SUMMARY_LIMIT: usize = 12;

/// Top categories checked against [`CATEGORY_BENCHMARKS`]
const BENCHMARKED_CATEGORIES: usize = 5;

/// Recommended share of spending: (name fragments, low, high)
const CATEGORY_BENCHMARKS: &[(&[&str], f64, f64)] = &[
    (&["food", "groceries"], 0.10, 0.15),
    (&["entertainment"], 0.05, 0.10),
    (&["transport"], 0.10, 0.20),
];

/// Embedded default prompts (compiled into binary)
mod defaults {
    pub const BASIC_INSIGHT: &str = include_str!("../../../prompts/basic_insight.md");
    pub const ADVANCED_INSIGHT: &str = include_str!("../../../prompts/advanced_insight.md");
}

/// Known prompt IDs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PromptId {
    BasicInsight,
    AdvancedInsight,
}

impl PromptId {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BasicInsight => "basic_insight",
            Self::AdvancedInsight => "advanced_insight",
        }
    }

    pub fn all() -> &'static [PromptId] {
        &[Self::BasicInsight, Self::AdvancedInsight]
    }

    pub fn for_mode(mode: PromptMode) -> Self {
        match mode {
            PromptMode::Basic => Self::BasicInsight,
            PromptMode::Advanced => Self::AdvancedInsight,
        }
    }

    fn default_content(&self) -> &'static str {
        match self {
            Self::BasicInsight => defaults::BASIC_INSIGHT,
            Self::AdvancedInsight => defaults::ADVANCED_INSIGHT,
        }
    }
}

/// Prompt frontmatter metadata
#[derive(Debug, Clone, Deserialize)]
pub struct PromptMetadata {
    pub id: String,
    /// Bumped whenever the template wording changes
    pub version: u32,
    pub mode: PromptMode,
}

/// A loaded prompt template
#[derive(Debug, Clone)]
pub struct Prompt {
    pub metadata: PromptMetadata,
    /// Body after the frontmatter (system + user sections)
    pub content: String,
    pub is_override: bool,
    pub override_path: Option<PathBuf>,
}

impl Prompt {
    pub fn system_section(&self) -> Option<&str> {
        extract_section(&self.content, "# System")
    }

    pub fn user_section(&self) -> Option<&str> {
        extract_section(&self.content, "# User")
    }

    /// Render the whole body
    pub fn render(&self, vars: &TemplateVars) -> String {
        render_template(&self.content, vars)
    }

    pub fn render_system(&self, vars: &TemplateVars) -> String {
        self.system_section()
            .map(|s| render_template(s, vars))
            .unwrap_or_default()
    }

    /// Render the user section, or the whole body if it has no sections
    pub fn render_user(&self, vars: &TemplateVars) -> String {
        match self.user_section() {
            Some(user) => render_template(user, vars),
            None => self.render(vars),
        }
    }
}

/// Template variables, ordered for deterministic rendering
pub type TemplateVars = BTreeMap<&'static str, String>;

/// Loads prompts from the override directory or the embedded defaults
#[derive(Debug, Clone)]
pub struct PromptLibrary {
    override_dir: Option<PathBuf>,
}

impl PromptLibrary {
    pub fn new() -> Self {
        Self {
            override_dir: default_prompts_dir(),
        }
    }

    pub fn with_override_dir(path: PathBuf) -> Self {
        Self {
            override_dir: Some(path),
        }
    }

    /// No override directory (embedded only)
    pub fn embedded_only() -> Self {
        Self { override_dir: None }
    }

    /// Load a prompt (checking override first, then default)
    pub fn load(&self, id: PromptId) -> Result<Prompt> {
        if let Some(override_path) = self.override_path(id) {
            if override_path.exists() {
                let content = fs::read_to_string(&override_path)?;
                let (metadata, body) = parse_prompt(&content)?;
                tracing::debug!(prompt = id.as_str(), path = %override_path.display(), "Using prompt override");
                return Ok(Prompt {
                    metadata,
                    content: body,
                    is_override: true,
                    override_path: Some(override_path),
                });
            }
        }

        let (metadata, body) = parse_prompt(id.default_content())?;
        Ok(Prompt {
            metadata,
            content: body,
            is_override: false,
            override_path: None,
        })
    }

    /// List all prompts with their override status
    pub fn list(&self) -> Vec<PromptInfo> {
        PromptId::all()
            .iter()
            .map(|&id| {
                let prompt = self.load(id).ok();
                PromptInfo {
                    id: id.as_str().to_string(),
                    version: prompt.as_ref().map(|p| p.metadata.version).unwrap_or(0),
                    mode: prompt.as_ref().map(|p| p.metadata.mode),
                    has_override: self.has_override(id),
                    override_path: prompt.and_then(|p| p.override_path),
                }
            })
            .collect()
    }

    pub fn has_override(&self, id: PromptId) -> bool {
        self.override_path(id).is_some_and(|p| p.exists())
    }

    pub fn override_dir(&self) -> Option<&PathBuf> {
        self.override_dir.as_ref()
    }

    fn override_path(&self, id: PromptId) -> Option<PathBuf> {
        self.override_dir
            .as_ref()
            .map(|dir| dir.join(format!("{}.md", id.as_str())))
    }
}

impl Default for PromptLibrary {
    fn default() -> Self {
        Self::new()
    }
}

/// Information about a prompt for listing
#[derive(Debug, Clone, Serialize)]
pub struct PromptInfo {
    pub id: String,
    pub version: u32,
    pub mode: Option<PromptMode>,
    pub has_override: bool,
    pub override_path: Option<PathBuf>,
}

/// Default prompts override directory
pub fn default_prompts_dir() -> Option<PathBuf> {
    dirs::data_local_dir().map(|d| d.join("ledgerlens").join("prompts").join("overrides"))
}

/// A prompt split by role
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ComposedPrompt {
    pub system: String,
    pub user: String,
}

impl ComposedPrompt {
    pub fn user_only(user: impl Into<String>) -> Self {
        Self {
            system: String::new(),
            user: user.into(),
        }
    }

    /// Single-string form for completion-style backends
    pub fn to_text(&self) -> String {
        if self.system.is_empty() {
            self.user.clone()
        } else {
            format!("{}\n\n{}", self.system, self.user)
        }
    }
}

/// Builds model prompts from computed features
///
/// Both templates are loaded once at construction, so composing is pure and
/// the same inputs always produce the same prompt.
#[derive(Debug, Clone)]
pub struct PromptComposer {
    basic: Prompt,
    advanced: Prompt,
}

impl PromptComposer {
    /// Composer using the user's override directory
    pub fn new() -> Result<Self> {
        Self::from_library(&PromptLibrary::new())
    }

    pub fn embedded() -> Result<Self> {
        Self::from_library(&PromptLibrary::embedded_only())
    }

    pub fn from_library(library: &PromptLibrary) -> Result<Self> {
        Ok(Self {
            basic: load_for_mode(library, PromptMode::Basic)?,
            advanced: load_for_mode(library, PromptMode::Advanced)?,
        })
    }

    pub fn prompt(&self, mode: PromptMode) -> &Prompt {
        match mode {
            PromptMode::Basic => &self.basic,
            PromptMode::Advanced => &self.advanced,
        }
    }

    /// Compose a flattened prompt
    pub fn compose(
        &self,
        features: &FeatureSet,
        intent: Intent,
        query: &str,
        mode: PromptMode,
    ) -> Result<String> {
        self.compose_parts(features, intent, query, mode)
            .map(|p| p.to_text())
    }

    /// Compose a prompt with separate system and user text
    ///
    /// Advanced mode needs at least one transaction and fails with
    /// `EmptyContext` otherwise. Basic mode renders a no-data notice instead.
    pub fn compose_parts(
        &self,
        features: &FeatureSet,
        intent: Intent,
        query: &str,
        mode: PromptMode,
    ) -> Result<ComposedPrompt> {
        let vars = match mode {
            PromptMode::Basic => basic_vars(features, query),
            PromptMode::Advanced => {
                if features.is_empty() {
                    return Err(Error::EmptyContext(
                        "advanced prompt needs at least one transaction".into(),
                    ));
                }
                advanced_vars(features, intent, query)
            }
        };

        let prompt = self.prompt(mode);
        Ok(ComposedPrompt {
            system: prompt.render_system(&vars).trim().to_string(),
            user: prompt.render_user(&vars).trim().to_string(),
        })
    }
}

fn load_for_mode(library: &PromptLibrary, mode: PromptMode) -> Result<Prompt> {
    let id = PromptId::for_mode(mode);
    let prompt = library.load(id)?;
    if prompt.metadata.mode != mode {
        return Err(Error::InvalidData(format!(
            "Prompt {} declares mode {}, expected {}",
            id.as_str(),
            prompt.metadata.mode,
            mode
        )));
    }
    Ok(prompt)
}

fn basic_vars(features: &FeatureSet, query: &str) -> TemplateVars {
    let mut vars = TemplateVars::new();
    vars.insert("query", query.trim().to_string());

    if features.is_empty() {
        vars.insert("no_data", NO_DATA.to_string());
        return vars;
    }

    vars.insert("has_data", "yes".to_string());
    vars.insert("total_income", format_money(features.total_income));
    vars.insert("total_expenses", format_money(features.total_expenses));
    vars.insert("category_breakdown", category_breakdown(features));
    vars
}

fn advanced_vars(features: &FeatureSet, intent: Intent, query: &str) -> TemplateVars {
    let mut vars = basic_vars(features, query);

    vars.insert("intent", intent.as_str().replace('_', " "));
    vars.insert(intent_flag(intent), "yes".to_string());

    vars.insert(
        "period",
        features
            .date_range
            .map(|(from, to)| format!("{} to {}", from, to))
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
    );
    vars.insert("transaction_count", features.transaction_count.to_string());
    vars.insert("net_savings", format_money(features.net_savings));
    vars.insert("savings_rate", format_optional_percent(features.savings_rate));
    vars.insert(
        "average_monthly_expense",
        format_money(features.average_monthly_expense),
    );
    vars.insert(
        "consistency",
        match (features.consistency_score, features.consistency_label()) {
            (Some(cv), Some(label)) => format!("{:.2} ({})", cv, label.as_str()),
            _ => NOT_AVAILABLE.to_string(),
        },
    );
    vars.insert(
        "essential_ratio",
        features
            .essential_vs_lifestyle_ratio
            .map(|r| format!("{:.2}", r))
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
    );
    vars.insert(
        "large_transaction_count",
        features.large_transaction_flags.len().to_string(),
    );
    vars.insert(
        "peak_day",
        features
            .peak_spending_day
            .map(|d| d.to_string())
            .unwrap_or_else(|| NOT_AVAILABLE.to_string()),
    );
    vars.insert("monthly_summary", monthly_summary(features));
    if intent == Intent::Budgeting {
        vars.insert("budget_allocation", budget_allocation(features));
        vars.insert("budget_flags", budget_flags(features));
    }

    if let Some(projection) = &features.projection {
        vars.insert(
            "projection",
            format!(
                "{} (trend {}/month, {} confidence)",
                format_money(projection.next_month_expense),
                format_signed_money(projection.monthly_change),
                projection.confidence.as_str()
            ),
        );
    }

    vars
}

fn intent_flag(intent: Intent) -> &'static str {
    match intent {
        Intent::SpendingPattern => "intent_spending_pattern",
        Intent::Prediction => "intent_prediction",
        Intent::Budgeting => "intent_budgeting",
        Intent::Comparison => "intent_comparison",
        Intent::GoalSetting => "intent_goal_setting",
        Intent::General => "intent_general",
    }
}

fn category_breakdown(features: &FeatureSet) -> String {
    if features.category_totals.is_empty() {
        return "- none".to_string();
    }
    features
        .category_totals
        .iter()
        .map(|c| {
            format!(
                "- {}: {} ({})",
                c.category,
                format_money(c.amount),
                format_percent(c.share)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// 50/30/20 split of total expenses
fn budget_allocation(features: &FeatureSet) -> String {
    let total = features.total_expenses;
    [("Needs", 0.5), ("Wants", 0.3), ("Savings and debt", 0.2)]
        .iter()
        .map(|(label, share)| {
            format!("- {} ({:.0}%): {}", label, share * 100.0, format_money(total * share))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Top categories whose share of spending is above its benchmark
fn budget_flags(features: &FeatureSet) -> String {
    let flags: Vec<String> = features
        .category_totals
        .iter()
        .take(BENCHMARKED_CATEGORIES)
        .filter_map(|c| {
            let name = c.category.to_lowercase();
            let (_, low, high) = CATEGORY_BENCHMARKS
                .iter()
                .find(|(fragments, _, _)| fragments.iter().any(|f| name.contains(*f)))?;
            (c.share > *high).then(|| {
                format!(
                    "- {} is {} of spending (recommended {:.0}-{:.0}%)",
                    c.category,
                    format_percent(c.share),
                    low * 100.0,
                    high * 100.0
                )
            })
        })
        .collect();

    if flags.is_empty() {
        "- none above benchmark".to_string()
    } else {
        flags.join("\n")
    }
}

fn monthly_summary(features: &FeatureSet) -> String {
    let series = &features.monthly_series;
    let skip = series.len().saturating_sub(MONTHLY_SUMMARY_LIMIT);
    let mut lines: Vec<String> = series[skip..]
        .iter()
        .map(|p| {
            format!(
                "- {}: income {}, expenses {}, net {}",
                p.month,
                format_money(p.income),
                format_money(p.expense),
                format_money(p.net())
            )
        })
        .collect();
    if skip > 0 {
        lines.insert(
            0,
            format!(
                "(last {} of {} months)",
                MONTHLY_SUMMARY_LIMIT,
                series.len()
            ),
        );
    }
    lines.join("\n")
}

/// Dollar amount with thousands separators, e.g. `$1,234.56` or `-$20.00`
pub fn format_money(amount: f64) -> String {
    if !amount.is_finite() {
        return NOT_AVAILABLE.to_string();
    }
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, digit) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    format!("{}${}.{:02}", sign, grouped, cents % 100)
}

/// Money with an explicit sign for deltas, e.g. `+$150.00`
pub fn format_signed_money(amount: f64) -> String {
    let formatted = format_money(amount);
    if amount >= 0.0 && amount.is_finite() {
        format!("+{}", formatted)
    } else {
        formatted
    }
}

/// Fraction as a percentage with one decimal, e.g. `0.9817` -> `98.2%`
pub fn format_percent(fraction: f64) -> String {
    if fraction.is_finite() {
        format!("{:.1}%", fraction * 100.0)
    } else {
        NOT_AVAILABLE.to_string()
    }
}

pub fn format_optional_percent(fraction: Option<f64>) -> String {
    fraction
        .map(format_percent)
        .unwrap_or_else(|| NOT_AVAILABLE.to_string())
}

/// Parse a prompt file into metadata and body
fn parse_prompt(content: &str) -> Result<(PromptMetadata, String)> {
    let content = content.trim();

    let rest = content.strip_prefix("---").ok_or_else(|| {
        Error::InvalidData("Prompt must start with YAML frontmatter (---)".into())
    })?;
    let end = rest.find("---").ok_or_else(|| {
        Error::InvalidData("Prompt frontmatter not closed (missing second ---)".into())
    })?;

    let metadata: PromptMetadata = serde_yaml::from_str(rest[..end].trim())?;
    Ok((metadata, rest[end + 3..].trim().to_string()))
}

/// Extract a section from the prompt content
fn extract_section<'a>(content: &'a str, header: &str) -> Option<&'a str> {
    let start = content.find(header)?;
    let after_header = &content[start + header.len()..];
    let end = after_header.find("\n# ").unwrap_or(after_header.len());
    Some(after_header[..end].trim())
}

fn render_template(template: &str, vars: &TemplateVars) -> String {
    substitute(&resolve_conditionals(template, vars), vars)
}

/// Keep or drop `{{#if var}}...{{/if}}` blocks (not nested)
fn resolve_conditionals(template: &str, vars: &TemplateVars) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(if_start) = rest.find("{{#if ") {
        let after_tag = &rest[if_start + 6..];
        let Some(name_end) = after_tag.find("}}") else {
            break;
        };
        let body = &after_tag[name_end + 2..];
        let Some(endif) = body.find("{{/if}}") else {
            break;
        };

        out.push_str(&rest[..if_start]);
        let name = after_tag[..name_end].trim();
        if vars.get(name).is_some_and(|v| !v.is_empty()) {
            out.push_str(&body[..endif]);
        }
        rest = &body[endif + 7..];
    }

    out.push_str(rest);
    out
}

/// Replace `{{var}}` in one pass; values are never re-scanned
///
/// Unknown placeholders are left untouched.
fn substitute(template: &str, vars: &TemplateVars) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find("}}") {
            Some(end) => {
                match vars.get(after[..end].trim()) {
                    Some(value) => out.push_str(value),
                    None => out.push_str(&rest[start..start + end + 4]),
                }
                rest = &after[end + 2..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }

    out.push_str(rest);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureExtractor;
    use crate::models::{Transaction, INCOME_CATEGORY};
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn vars(pairs: &[(&'static str, &str)]) -> TemplateVars {
        pairs.iter().map(|(k, v)| (*k, v.to_string())).collect()
    }

    fn sample_features() -> FeatureSet {
        let d = |m, day| NaiveDate::from_ymd_opt(2024, m, day).unwrap();
        let ledger = vec![
            Transaction::new(1, d(1, 15), -45.67, "Groceries", "Whole Foods"),
            Transaction::new(2, d(1, 20), 2500.0, INCOME_CATEGORY, "Salary"),
            Transaction::new(3, d(2, 3), -1250.0, "Rent", "Landlord"),
            Transaction::new(4, d(3, 9), -80.0, "Dining", "Bistro"),
        ];
        FeatureExtractor::default().extract(&ledger).unwrap()
    }

    #[test]
    fn test_parse_prompt() {
        let content = r#"---
id: test_prompt
version: 2
mode: basic
---

# System
Test system prompt.

# User
Test user prompt with {{variable}}.
"#;

        let (metadata, body) = parse_prompt(content).unwrap();
        assert_eq!(metadata.id, "test_prompt");
        assert_eq!(metadata.version, 2);
        assert_eq!(metadata.mode, PromptMode::Basic);
        assert_eq!(extract_section(&body, "# System"), Some("Test system prompt."));
        assert_eq!(
            extract_section(&body, "# User"),
            Some("Test user prompt with {{variable}}.")
        );
    }

    #[test]
    fn test_parse_prompt_rejects_missing_frontmatter() {
        assert!(matches!(parse_prompt("# System\nhi"), Err(Error::InvalidData(_))));
        assert!(matches!(parse_prompt("---\nid: x\n"), Err(Error::InvalidData(_))));
        assert!(matches!(
            parse_prompt("---\nid: x\nversion: 1\nmode: chatty\n---\nbody"),
            Err(Error::Yaml(_))
        ));
    }

    #[test]
    fn test_conditional_blocks() {
        let template = "Start{{#if category}}\nCategory: {{category}}{{/if}}\nEnd";

        let rendered = render_template(template, &vars(&[("category", "Groceries")]));
        assert_eq!(rendered, "Start\nCategory: Groceries\nEnd");

        let rendered = render_template(template, &vars(&[("category", "")]));
        assert_eq!(rendered, "Start\nEnd");

        let rendered = render_template(template, &TemplateVars::new());
        assert_eq!(rendered, "Start\nEnd");
    }

    #[test]
    fn test_substitution_is_single_pass() {
        let rendered = render_template(
            "Q: {{query}} / {{unknown}}",
            &vars(&[("query", "what is {{total}}?"), ("total", "$5.00")]),
        );
        assert_eq!(rendered, "Q: what is {{total}}? / {{unknown}}");
    }

    #[test]
    fn test_format_money() {
        assert_eq!(format_money(0.0), "$0.00");
        assert_eq!(format_money(45.67), "$45.67");
        assert_eq!(format_money(1234.56), "$1,234.56");
        assert_eq!(format_money(999.999), "$1,000.00");
        assert_eq!(format_money(-1_234_567.891), "-$1,234,567.89");
        assert_eq!(format_money(-0.001), "$0.00");
        assert_eq!(format_money(f64::NAN), NOT_AVAILABLE);
        assert_eq!(format_signed_money(150.0), "+$150.00");
        assert_eq!(format_signed_money(-20.0), "-$20.00");
    }

    #[test]
    fn test_format_percent() {
        assert_eq!(format_percent(0.9817), "98.2%");
        assert_eq!(format_percent(-0.25), "-25.0%");
        assert_eq!(format_optional_percent(None), NOT_AVAILABLE);
    }

    #[test]
    fn test_default_prompts_parse() {
        for id in PromptId::all() {
            let (metadata, body) = parse_prompt(id.default_content()).unwrap();
            assert_eq!(metadata.id, id.as_str());
            assert!(extract_section(&body, "# System").is_some());
            assert!(extract_section(&body, "# User").is_some());
        }
    }

    #[test]
    fn test_basic_prompt_contents() {
        let composer = PromptComposer::embedded().unwrap();
        let prompt = composer
            .compose_parts(
                &sample_features(),
                Intent::General,
                "Where does my money go?",
                PromptMode::Basic,
            )
            .unwrap();

        assert!(prompt.user.contains("Total income: $2,500.00"));
        assert!(prompt.user.contains("Total expenses: $1,375.67"));
        assert!(prompt.user.contains("- Rent: $1,250.00 (90.9%)"));
        assert!(prompt.user.ends_with("Question: Where does my money go?"));
        // Basic mode leaves out advanced metrics
        assert!(!prompt.user.contains("Savings rate"));
        assert!(!prompt.user.contains(NO_DATA));
    }

    #[test]
    fn test_basic_prompt_empty_features() {
        let composer = PromptComposer::embedded().unwrap();
        let prompt = composer
            .compose(&FeatureSet::empty(), Intent::General, "Anything?", PromptMode::Basic)
            .unwrap();
        assert!(prompt.contains(NO_DATA));
        assert!(!prompt.contains("Total income"));
    }

    #[test]
    fn test_advanced_prompt_empty_features_fails() {
        let composer = PromptComposer::embedded().unwrap();
        let result = composer.compose(
            &FeatureSet::empty(),
            Intent::Prediction,
            "Forecast?",
            PromptMode::Advanced,
        );
        assert!(matches!(result, Err(Error::EmptyContext(_))));
    }

    #[test]
    fn test_advanced_prompt_contents() {
        let composer = PromptComposer::embedded().unwrap();
        let prompt = composer
            .compose_parts(
                &sample_features(),
                Intent::Prediction,
                "What will I spend next month?",
                PromptMode::Advanced,
            )
            .unwrap();

        assert!(prompt.system.contains("The question is about: prediction."));
        assert!(prompt.system.contains("monthly trend"));
        assert!(!prompt.system.contains("50/30/20"));

        assert!(prompt.user.contains("(2024-01-15 to 2024-03-09, 4 transactions)"));
        assert!(prompt.user.contains("Net savings: $1,124.33"));
        assert!(prompt.user.contains("Savings rate: 45.0%"));
        assert!(prompt.user.contains("- 2024-02: income $0.00, expenses $1,250.00, net -$1,250.00"));
        assert!(prompt.user.contains("Next month projection:"));
        assert!(!prompt.user.contains("{{"));
    }

    #[test]
    fn test_budgeting_instructions() {
        let composer = PromptComposer::embedded().unwrap();
        let prompt = composer
            .compose(&sample_features(), Intent::Budgeting, "Budget?", PromptMode::Advanced)
            .unwrap();
        assert!(prompt.contains("50/30/20"));
        assert!(!prompt.contains("monthly trend and the projection"));

        // $1,375.67 of expenses; groceries at 3.3% is within its benchmark
        assert!(prompt.contains("- Wants (30%): $412.70"));
        assert!(prompt.contains("- Savings and debt (20%): $275.13"));
        assert!(prompt.contains("- none above benchmark"));
    }

    #[test]
    fn test_budget_flags_over_benchmark() {
        let d = |day| NaiveDate::from_ymd_opt(2024, 4, day).unwrap();
        let features = FeatureExtractor::default()
            .extract(&[
                Transaction::new(1, d(1), -400.0, "Rent", "Landlord"),
                Transaction::new(2, d(2), -300.0, "Groceries", "Market"),
                Transaction::new(3, d(3), -200.0, "Entertainment", "Cinema"),
                Transaction::new(4, d(4), -100.0, "Transportation", "Bus"),
            ])
            .unwrap();
        let composer = PromptComposer::embedded().unwrap();

        let prompt = composer
            .compose_parts(&features, Intent::Budgeting, "Budget?", PromptMode::Advanced)
            .unwrap();
        assert!(prompt.user.contains("- Needs (50%): $500.00"));
        assert!(prompt.user.contains("- Groceries is 30.0% of spending (recommended 10-15%)"));
        assert!(prompt.user.contains("- Entertainment is 20.0% of spending (recommended 5-10%)"));
        assert!(!prompt.user.contains("Rent is"));
        assert!(!prompt.user.contains("Transportation is"));

        // Other intents carry no budget figures
        let prompt = composer
            .compose_parts(&features, Intent::General, "Hi", PromptMode::Advanced)
            .unwrap();
        assert!(!prompt.user.contains("Budget benchmarks"));
    }

    #[test]
    fn test_undefined_metrics_render_na() {
        let d = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        let features = FeatureExtractor::default()
            .extract(&[Transaction::new(1, d, -900.0, "Rent", "Landlord")])
            .unwrap();
        let composer = PromptComposer::embedded().unwrap();
        let prompt = composer
            .compose(&features, Intent::General, "Hi", PromptMode::Advanced)
            .unwrap();

        assert!(prompt.contains("Savings rate: n/a"));
        assert!(prompt.contains("Spending consistency: n/a"));
        assert!(prompt.contains("Essential vs lifestyle ratio: n/a"));
        assert!(!prompt.contains("Next month projection"));
    }

    #[test]
    fn test_compose_is_deterministic() {
        let composer = PromptComposer::embedded().unwrap();
        let features = sample_features();
        let first = composer
            .compose(&features, Intent::Comparison, "Jan vs Feb", PromptMode::Advanced)
            .unwrap();
        let second = composer
            .compose(&features, Intent::Comparison, "Jan vs Feb", PromptMode::Advanced)
            .unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_override_dir_takes_precedence() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("basic_insight.md"),
            "---\nid: basic_insight\nversion: 7\nmode: basic\n---\n# System\nCustom.\n\n# User\nQ={{query}}",
        )
        .unwrap();

        let library = PromptLibrary::with_override_dir(dir.path().to_path_buf());
        assert!(library.has_override(PromptId::BasicInsight));
        assert!(!library.has_override(PromptId::AdvancedInsight));

        let composer = PromptComposer::from_library(&library).unwrap();
        let prompt = composer
            .compose_parts(&FeatureSet::empty(), Intent::General, "hi", PromptMode::Basic)
            .unwrap();
        assert_eq!(prompt.system, "Custom.");
        assert_eq!(prompt.user, "Q=hi");

        let listed = library.list();
        assert_eq!(listed[0].version, 7);
        assert!(listed[0].has_override);
        assert!(!listed[1].has_override);
    }

    #[test]
    fn test_override_with_wrong_mode_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("advanced_insight.md"),
            "---\nid: advanced_insight\nversion: 1\nmode: basic\n---\n# User\nx",
        )
        .unwrap();

        let library = PromptLibrary::with_override_dir(dir.path().to_path_buf());
        assert!(matches!(
            PromptComposer::from_library(&library),
            Err(Error::InvalidData(_))
        ));
    }

    #[test]
    fn test_unreadable_override_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("basic_insight.md")).unwrap();

        let library = PromptLibrary::with_override_dir(dir.path().to_path_buf());
        assert!(matches!(library.load(PromptId::BasicInsight), Err(Error::Io(_))));
    }
}
