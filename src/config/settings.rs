//! Compiled runtime settings.
//!
//! `ProxySettings` is what the server actually runs on: parsed listen
//! prefixes, the upstream URL and compiled rule sets. It is built once,
//! wrapped in an `Arc`, and only ever read afterwards.

use url::Url;

use crate::config::loader::ConfigError;
use crate::config::schema::ProxyConfig;
use crate::config::validation;
use crate::net::listener::ListenPrefix;
use crate::rewrite::{ContentRules, RuleSet};

#[derive(Debug, Clone)]
pub struct ProxySettings {
    pub listen: Vec<ListenPrefix>,
    pub upstream: Url,
    pub query_rules: RuleSet,
    pub content_rules: ContentRules,
}

impl ProxyConfig {
    /// Validate and compile into runtime settings.
    pub fn compile(&self) -> Result<ProxySettings, ConfigError> {
        validation::compile(self).map_err(ConfigError::Validation)
    }
}
