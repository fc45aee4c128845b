//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → tracing events with structured fields (connection_id, peer_addr, status)
//!
//! Consumers:
//!     → logging.rs subscriber (stdout, pretty or compact)
//!     → ProxyServer::subscribe_errors for pipeline failures
//! ```

pub mod logging;
