//! Configuration schema definitions.
//!
//! This module defines the on-disk configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the rewriting proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listen prefixes (e.g., "http://127.0.0.1:8080/" or "0.0.0.0:8080").
    pub listen: Vec<String>,

    /// Absolute URI of the single upstream origin.
    pub upstream: String,

    /// Rules applied to every forwarded query parameter name and value.
    pub query_rules: Vec<RuleConfig>,

    /// Response body rules keyed by media type (e.g., "text/html").
    pub content_rules: BTreeMap<String, Vec<RuleConfig>>,

    /// Logging settings.
    pub logging: LoggingConfig,
}

/// A single pattern → replacement pair.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct RuleConfig {
    /// Regular expression to search for.
    pub pattern: String,

    /// Replacement text; may reference capture groups (`$1`, `${name}`).
    #[serde(default)]
    pub replacement: String,
}

impl RuleConfig {
    pub fn new(pattern: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            replacement: replacement.into(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when `RUST_LOG` is unset.
    pub level: String,

    /// Output format.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

/// Log line layout.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Compact,
}
