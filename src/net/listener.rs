//! TCP listener bound from a listen prefix.
//!
//! # Responsibilities
//! - Parse listen prefixes (`http://host:port/path` or bare `host:port`)
//! - Bind to the resulting socket address
//! - Accept incoming TCP connections
//!
//! # Design Decisions
//! - Wildcard hosts `+` and `*` bind every interface
//! - The prefix path is kept for logging only; all paths are forwarded
//! - No connection limit: the accept loop never waits on pipelines

use std::fmt;
use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};

const DEFAULT_HTTP_PORT: u16 = 80;

/// Error type for listener operations.
#[derive(Debug, Error)]
pub enum ListenerError {
    /// Failed to bind to address.
    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        source: std::io::Error,
    },
    /// Failed to accept connection.
    #[error("failed to accept: {0}")]
    Accept(#[source] std::io::Error),
}

/// Reason a listen prefix could not be parsed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct InvalidPrefix(String);

/// A parsed listen prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenPrefix {
    host: String,
    port: u16,
    path: String,
}

impl ListenPrefix {
    pub fn parse(raw: &str) -> Result<Self, InvalidPrefix> {
        let raw = raw.trim();
        let lower = raw.to_ascii_lowercase();
        let rest = if lower.starts_with("https://") {
            return Err(InvalidPrefix("https listen prefixes are not supported".into()));
        } else if lower.starts_with("http://") {
            &raw["http://".len()..]
        } else if raw.contains("://") {
            return Err(InvalidPrefix("only http:// prefixes are supported".into()));
        } else {
            raw
        };

        let (authority, path) = match rest.find('/') {
            Some(idx) => (&rest[..idx], &rest[idx..]),
            None => (rest, "/"),
        };
        let (host, port) = split_host_port(authority)?;
        let host = match host {
            "" => return Err(InvalidPrefix("missing host".into())),
            "+" | "*" => "0.0.0.0",
            host => host,
        };

        Ok(Self {
            host: host.to_string(),
            port,
            path: path.to_string(),
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    /// `host:port` suitable for `TcpListener::bind`.
    pub fn bind_address(&self) -> String {
        if self.host.contains(':') {
            format!("[{}]:{}", self.host, self.port)
        } else {
            format!("{}:{}", self.host, self.port)
        }
    }
}

impl fmt::Display for ListenPrefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "http://{}{}", self.bind_address(), self.path)
    }
}

fn split_host_port(authority: &str) -> Result<(&str, u16), InvalidPrefix> {
    let (host, port) = if let Some(bracketed) = authority.strip_prefix('[') {
        let (host, after) = bracketed
            .split_once(']')
            .ok_or_else(|| InvalidPrefix("unterminated IPv6 address".into()))?;
        match after {
            "" => (host, None),
            after => match after.strip_prefix(':') {
                Some(port) => (host, Some(port)),
                None => return Err(InvalidPrefix(format!("unexpected {after:?} after address"))),
            },
        }
    } else {
        match authority.rsplit_once(':') {
            Some((host, port)) => (host, Some(port)),
            None => (authority, None),
        }
    };

    let port = match port {
        None => DEFAULT_HTTP_PORT,
        Some(port) => port
            .parse()
            .map_err(|_| InvalidPrefix(format!("invalid port {port:?}")))?,
    };
    Ok((host, port))
}

/// A bound listener for one prefix.
pub struct Listener {
    inner: TcpListener,
    prefix: ListenPrefix,
    local_addr: SocketAddr,
}

impl Listener {
    /// Bind to the prefix's address.
    pub async fn bind(prefix: &ListenPrefix) -> Result<Self, ListenerError> {
        let address = prefix.bind_address();
        let inner = TcpListener::bind(&address)
            .await
            .map_err(|source| ListenerError::Bind {
                address: address.clone(),
                source,
            })?;

        let local_addr = inner
            .local_addr()
            .map_err(|source| ListenerError::Bind { address, source })?;

        tracing::info!(
            prefix = %prefix,
            address = %local_addr,
            "Listener bound"
        );

        Ok(Self {
            inner,
            prefix: prefix.clone(),
            local_addr,
        })
    }

    /// Accept a new connection.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr), ListenerError> {
        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;
        tracing::debug!(peer_addr = %addr, "Connection accepted");
        Ok((stream, addr))
    }

    /// Get the local address this listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn prefix(&self) -> &ListenPrefix {
        &self.prefix
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_url_prefix() {
        let prefix = ListenPrefix::parse("http://127.0.0.1:8080/app/").unwrap();
        assert_eq!(prefix.host(), "127.0.0.1");
        assert_eq!(prefix.port(), 8080);
        assert_eq!(prefix.path(), "/app/");
    }

    #[test]
    fn parses_bare_address() {
        let prefix = ListenPrefix::parse("0.0.0.0:9000").unwrap();
        assert_eq!(prefix.bind_address(), "0.0.0.0:9000");
        assert_eq!(prefix.path(), "/");
    }

    #[test]
    fn wildcard_host_binds_all_interfaces() {
        let prefix = ListenPrefix::parse("http://+:8080/").unwrap();
        assert_eq!(prefix.bind_address(), "0.0.0.0:8080");
        let prefix = ListenPrefix::parse("http://*:8081/").unwrap();
        assert_eq!(prefix.host(), "0.0.0.0");
    }

    #[test]
    fn missing_port_defaults_to_80() {
        let prefix = ListenPrefix::parse("http://localhost/").unwrap();
        assert_eq!(prefix.port(), 80);
    }

    #[test]
    fn parses_ipv6() {
        let prefix = ListenPrefix::parse("http://[::1]:8080/").unwrap();
        assert_eq!(prefix.host(), "::1");
        assert_eq!(prefix.bind_address(), "[::1]:8080");
    }

    #[test]
    fn rejects_bad_prefixes() {
        assert!(ListenPrefix::parse("https://127.0.0.1:443/").is_err());
        assert!(ListenPrefix::parse("ftp://127.0.0.1:21/").is_err());
        assert!(ListenPrefix::parse("http://:8080/").is_err());
        assert!(ListenPrefix::parse("http://127.0.0.1:99999/").is_err());
        assert!(ListenPrefix::parse("http://[::1/").is_err());
    }

    #[tokio::test]
    async fn binds_and_accepts() {
        let prefix = ListenPrefix::parse("127.0.0.1:0").unwrap();
        let listener = Listener::bind(&prefix).await.unwrap();
        let addr = listener.local_addr();

        let connect = tokio::spawn(async move { TcpStream::connect(addr).await });
        let (_stream, peer) = listener.accept().await.unwrap();
        assert!(peer.ip().is_loopback());
        assert!(connect.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn bind_conflict_is_reported() {
        let first = Listener::bind(&ListenPrefix::parse("127.0.0.1:0").unwrap())
            .await
            .unwrap();
        let taken = first.local_addr();
        let prefix = ListenPrefix::parse(&taken.to_string()).unwrap();
        let err = Listener::bind(&prefix).await.err().unwrap();
        assert!(matches!(err, ListenerError::Bind { .. }));
    }
}
