//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (read & deserialize)
//!     → validation.rs (parse prefixes/upstream, compile rules)
//!     → settings.rs (ProxySettings: compiled, immutable)
//!     → shared via Arc with every connection pipeline
//! ```
//!
//! # Design Decisions
//! - Config is immutable once the server starts; there is no reload
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod settings;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{LogFormat, LoggingConfig, ProxyConfig, RuleConfig};
pub use settings::ProxySettings;
pub use validation::ValidationError;
