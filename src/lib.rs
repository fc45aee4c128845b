//! Single-upstream HTTP forwarding proxy with rule-based rewriting.
//!
//! Requests accepted on any listen prefix are forwarded to one fixed upstream.
//! Query parameters are rewritten on the way out, and response bodies are
//! rewritten on the way back according to rules keyed by media type.

pub mod config;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod resilience;
pub mod rewrite;

pub use config::{ProxyConfig, ProxySettings};
pub use http::{ProxyError, ProxyServer, ServerError, ServerState};
