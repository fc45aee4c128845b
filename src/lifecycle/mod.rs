//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! ProxyServer::start:
//!     Bind every listener → spawn accept loops subscribed to Shutdown
//!
//! ProxyServer::stop (shutdown.rs):
//!     Trigger → accept loops exit → listeners dropped
//!     In-flight pipelines keep running to completion
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → hosting binary calls stop
//! ```

pub mod shutdown;
pub mod signals;

pub use shutdown::{Shutdown, StopSignal};
