//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Accept failure (not caused by stop):
//!     → backoff.rs (exponential delay with jitter)
//!     → accept loop retries after the delay
//! ```
//!
//! # Design Decisions
//! - Upstream calls are never retried: one inbound exchange, one upstream exchange
//! - Only the accept loop backs off, so a failing socket cannot spin

pub mod backoff;

pub use backoff::calculate_backoff;
