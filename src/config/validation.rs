//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Parse listen prefixes and the upstream URI
//! - Compile every rule pattern, reporting the offending rule's position
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Compiling and validating are the same pass: a config that validates
//!   always compiles into `ProxySettings`

use thiserror::Error;
use url::Url;

use crate::config::schema::{ProxyConfig, RuleConfig};
use crate::config::settings::ProxySettings;
use crate::net::listener::ListenPrefix;
use crate::rewrite::{ContentRules, Rule, RuleSet};

/// A single semantic problem in a configuration.
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    #[error("at least one listen prefix is required")]
    NoListenPrefixes,

    #[error("invalid listen prefix {prefix:?}: {reason}")]
    InvalidListenPrefix { prefix: String, reason: String },

    #[error("invalid upstream {upstream:?}: {reason}")]
    InvalidUpstream { upstream: String, reason: String },

    #[error("query rule #{index} has an invalid pattern: {source}")]
    InvalidQueryRule { index: usize, source: regex::Error },

    #[error("content rule #{index} for {media_type:?} has an invalid pattern: {source}")]
    InvalidContentRule {
        media_type: String,
        index: usize,
        source: regex::Error,
    },
}

/// Check a configuration without keeping the compiled result.
pub fn validate_config(config: &ProxyConfig) -> Result<(), Vec<ValidationError>> {
    compile(config).map(|_| ())
}

pub(crate) fn compile(config: &ProxyConfig) -> Result<ProxySettings, Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.listen.is_empty() {
        errors.push(ValidationError::NoListenPrefixes);
    }
    let mut listen = Vec::with_capacity(config.listen.len());
    for prefix in &config.listen {
        match ListenPrefix::parse(prefix) {
            Ok(parsed) => listen.push(parsed),
            Err(e) => errors.push(ValidationError::InvalidListenPrefix {
                prefix: prefix.clone(),
                reason: e.to_string(),
            }),
        }
    }

    let upstream = parse_upstream(&config.upstream)
        .map_err(|reason| errors.push(ValidationError::InvalidUpstream {
            upstream: config.upstream.clone(),
            reason,
        }))
        .ok();

    let query_rules = compile_rules(&config.query_rules, |index, source| {
        ValidationError::InvalidQueryRule { index, source }
    })
    .map_err(|e| errors.extend(e))
    .ok();

    let mut content_rules = ContentRules::new();
    for (media_type, rules) in &config.content_rules {
        let compiled = compile_rules(rules, |index, source| ValidationError::InvalidContentRule {
            media_type: media_type.clone(),
            index,
            source,
        });
        match compiled {
            Ok(set) => content_rules.insert(media_type.clone(), set),
            Err(e) => errors.extend(e),
        }
    }

    match (upstream, query_rules) {
        (Some(upstream), Some(query_rules)) if errors.is_empty() => Ok(ProxySettings {
            listen,
            upstream,
            query_rules,
            content_rules,
        }),
        _ => Err(errors),
    }
}

/// Parse the upstream origin; only absolute `http` URIs with a host qualify.
pub fn parse_upstream(raw: &str) -> Result<Url, String> {
    let url = Url::parse(raw).map_err(|e| e.to_string())?;
    if url.scheme() != "http" {
        return Err(format!("unsupported scheme {:?}, expected \"http\"", url.scheme()));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err("missing host".to_string());
    }
    Ok(url)
}

fn compile_rules(
    rules: &[RuleConfig],
    on_error: impl Fn(usize, regex::Error) -> ValidationError,
) -> Result<RuleSet, Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut compiled = Vec::with_capacity(rules.len());
    for (index, rule) in rules.iter().enumerate() {
        match Rule::new(&rule.pattern, rule.replacement.clone()) {
            Ok(rule) => compiled.push(rule),
            Err(e) => errors.push(on_error(index, e)),
        }
    }
    if errors.is_empty() {
        Ok(RuleSet::new(compiled))
    } else {
        Err(errors)
    }
}
