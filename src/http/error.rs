//! Error taxonomy for the forwarding pipeline and server lifecycle.

use thiserror::Error;

use crate::net::ListenerError;
use crate::rewrite::charset::UnknownCharset;

/// Failure of one connection's pipeline.
///
/// Published on the server's error channel; never stops the accept loop.
#[derive(Debug, Error)]
pub enum ProxyError {
    #[error("upstream host {0:?} is not a valid Host header")]
    InvalidUpstreamHost(String),

    #[error("failed to build upstream client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("failed to build upstream request: {0}")]
    BuildRequest(#[source] reqwest::Error),

    #[error("upstream request failed: {0}")]
    Upstream(#[source] reqwest::Error),

    #[error("failed to read upstream response body: {0}")]
    UpstreamBody(#[source] reqwest::Error),

    #[error("cannot rewrite response body: {0}")]
    Charset(#[from] UnknownCharset),

    #[error("inbound connection failed: {0}")]
    Connection(#[source] hyper::Error),
}

/// Failure of `ProxyServer::start`.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("proxy is already listening")]
    AlreadyListening,

    #[error(transparent)]
    Listener(#[from] ListenerError),
}
