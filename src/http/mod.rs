//! HTTP forwarding subsystem.
//!
//! # Data Flow
//! ```text
//! Accepted TCP connection
//!     → server.rs (hyper HTTP/1.1 connection, one task per connection)
//!     → request.rs (retarget URI, rewrite query, filter headers, cookie jar)
//!     → upstream call (reqwest, one client per pipeline)
//!     → response.rs (filter headers, buffer, rewrite body, fixed length)
//!     → Send to client, close connection
//!
//! Any failure along the way:
//!     → error.rs ProxyError
//!     → broadcast to ProxyServer::subscribe_errors, connection dropped
//! ```

pub mod error;
pub mod headers;
pub mod request;
pub mod response;
pub mod server;

pub use error::{ProxyError, ServerError};
pub use request::{build_upstream_request, UpstreamExchange};
pub use response::relay;
pub use server::{forward, ProxyServer, ServerState};
