//! Text rewriting subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound query string
//!     → query.rs (parse into name/value pairs, percent-decoded)
//!     → rules.rs (query RuleSet over every name and value)
//!     → query.rs (re-serialize)
//!
//! Upstream response body
//!     → charset.rs (media type + charset → text encoding)
//!     → rules.rs (ContentRules lookup by media type, RuleSet over decoded text)
//!     → charset.rs (re-encode with the same encoding)
//! ```
//!
//! # Design Decisions
//! - Rules are compiled once at startup and never mutated
//! - Each rule sees the output of the previous one (declared order is significant)
//! - Content rules are keyed by exact media type; no match means passthrough

pub mod charset;
pub mod query;
pub mod rules;

pub use query::QueryParam;
pub use rules::{ContentRules, Rule, RuleSet};
