//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Listen prefix (config)
//!     → listener.rs (parse prefix, bind, accept)
//!     → connection.rs (connection id, in-flight guard)
//!     → Hand off to HTTP layer (one task per connection)
//! ```
//!
//! # Design Decisions
//! - One listener per configured prefix, each with its own accept loop
//! - No accept backpressure: pipelines are never awaited by the accept loop

pub mod connection;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{ListenPrefix, Listener, ListenerError};
