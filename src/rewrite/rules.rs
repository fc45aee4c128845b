//! Ordered pattern substitution rules.
//!
//! # Responsibilities
//! - Compile pattern/replacement pairs into regular expressions
//! - Apply a rule set as a left fold: each rule rewrites the previous output
//! - Select the content rule set for a response media type
//!
//! # Design Decisions
//! - Replacements use the `regex` crate syntax (`$1`, `${name}`)
//! - Media type lookup is an exact string match; absence means passthrough

use std::borrow::Cow;
use std::collections::HashMap;

use regex::Regex;

/// One compiled substitution.
#[derive(Debug, Clone)]
pub struct Rule {
    pattern: Regex,
    replacement: String,
}

impl Rule {
    pub fn new(pattern: &str, replacement: impl Into<String>) -> Result<Self, regex::Error> {
        Ok(Self {
            pattern: Regex::new(pattern)?,
            replacement: replacement.into(),
        })
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Replace every match of the pattern in `text`.
    pub fn apply<'t>(&self, text: &'t str) -> Cow<'t, str> {
        self.pattern.replace_all(text, self.replacement.as_str())
    }
}

/// Rules applied strictly in declaration order.
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<Rule>,
}

impl RuleSet {
    pub fn new(rules: Vec<Rule>) -> Self {
        Self { rules }
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rule> {
        self.rules.iter()
    }

    /// Run every rule over the output of the one before it.
    pub fn apply_all(&self, text: &str) -> String {
        self.rules
            .iter()
            .fold(text.to_owned(), |current, rule| {
                let rewritten = match rule.apply(&current) {
                    Cow::Owned(rewritten) => Some(rewritten),
                    Cow::Borrowed(_) => None,
                };
                rewritten.unwrap_or(current)
            })
    }
}

impl FromIterator<Rule> for RuleSet {
    fn from_iter<I: IntoIterator<Item = Rule>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

/// Response body rules keyed by media type (e.g. `text/html`).
#[derive(Debug, Clone, Default)]
pub struct ContentRules {
    by_media_type: HashMap<String, RuleSet>,
}

impl ContentRules {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, media_type: impl Into<String>, rules: RuleSet) {
        self.by_media_type.insert(media_type.into(), rules);
    }

    /// Rule set registered for exactly this media type, if any.
    pub fn for_media_type(&self, media_type: &str) -> Option<&RuleSet> {
        self.by_media_type.get(media_type)
    }

    pub fn is_empty(&self) -> bool {
        self.by_media_type.is_empty()
    }
}
