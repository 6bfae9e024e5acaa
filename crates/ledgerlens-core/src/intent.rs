//! Query intent classification
//!
//! Keywords are regex fragments anchored at the start of a word in the
//! lowercased query. They match as stems ("budget" also catches "budgets"
//! and "budgeting") unless the fragment ends in `\b`. When several intents
//! match, the most specific one wins (see [`Intent::by_priority`]).

use regex::Regex;

use crate::models::Intent;

const GOAL_SETTING: &[&str] = &[
    "goal",
    "sav(?:e|ing)",
    "target",
    "achiev",
    "reach",
    "afford",
    "emergency fund",
];

const PREDICTION: &[&str] = &[
    "predict",
    "forecast",
    "future",
    "next month",
    "next year",
    "project",
    "estimat",
    "expect",
    r"will i\b",
];

const COMPARISON: &[&str] = &[
    "compar",
    r"vs\b",
    "versus",
    "differ",
    "more than",
    "less than",
    "last month",
    "month over month",
];

const BUDGETING: &[&str] = &[
    "budget",
    "allocat",
    "limit",
    "cut back",
    "cut down",
    "reduc",
    "spend less",
    "50/30/20",
];

const SPENDING_PATTERN: &[&str] = &[
    "pattern",
    "trend",
    "habit",
    "behavio",
    "recurring",
    "spen[dt]",
    "where does my money go",
    "top categor",
];

/// Maps a free-text question to an [`Intent`]
#[derive(Debug, Clone)]
pub struct IntentClassifier {
    /// Compiled matchers in priority order
    matchers: Vec<(Intent, Regex)>,
}

impl IntentClassifier {
    pub fn new() -> Self {
        let matchers = Intent::by_priority()
            .iter()
            .filter_map(|intent| {
                keywords_for(*intent).map(|keywords| (*intent, keyword_regex(keywords)))
            })
            .collect();
        Self { matchers }
    }

    /// Highest-priority matching intent, or `General`
    pub fn classify(&self, query: &str) -> Intent {
        let query = query.to_lowercase();
        self.matchers
            .iter()
            .find(|(_, re)| re.is_match(&query))
            .map(|(intent, _)| *intent)
            .unwrap_or(Intent::General)
    }

    /// Every matching intent in priority order (empty when nothing matches)
    pub fn matches(&self, query: &str) -> Vec<Intent> {
        let query = query.to_lowercase();
        self.matchers
            .iter()
            .filter(|(_, re)| re.is_match(&query))
            .map(|(intent, _)| *intent)
            .collect()
    }
}

impl Default for IntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

fn keywords_for(intent: Intent) -> Option<&'static [&'static str]> {
    match intent {
        Intent::GoalSetting => Some(GOAL_SETTING),
        Intent::Prediction => Some(PREDICTION),
        Intent::Comparison => Some(COMPARISON),
        Intent::Budgeting => Some(BUDGETING),
        Intent::SpendingPattern => Some(SPENDING_PATTERN),
        Intent::General => None,
    }
}

fn keyword_regex(keywords: &[&str]) -> Regex {
    let alternatives: Vec<String> = keywords
        .iter()
        .map(|k| k.replace(' ', r"\s+"))
        .collect();
    Regex::new(&format!(r"\b(?:{})", alternatives.join("|"))).expect("valid regex")
}
