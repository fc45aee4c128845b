//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rewrite_proxy::config::RuleConfig;
use rewrite_proxy::{ProxyConfig, ProxyServer};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

/// What the mock upstream saw for one connection.
#[derive(Debug)]
pub struct CapturedRequest {
    /// Request line and headers, up to and including the blank line.
    pub head: String,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn request_line(&self) -> &str {
        self.head.lines().next().unwrap_or_default()
    }

    /// Value of the first header named `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.head.lines().skip(1).find_map(|line| {
            let (key, value) = line.split_once(':')?;
            key.trim()
                .eq_ignore_ascii_case(name)
                .then(|| value.trim())
        })
    }
}

/// Canned upstream response.
#[derive(Debug, Clone)]
pub struct MockReply {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub delay: Option<Duration>,
}

impl MockReply {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body: body.into(),
            delay: None,
        }
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }
}

/// Start a mock upstream that answers every connection with `reply`.
///
/// Binds `addr` (use port 0 for an ephemeral port) and reports each request
/// it receives on the returned channel.
pub async fn start_mock_upstream(
    addr: SocketAddr,
    reply: MockReply,
) -> (SocketAddr, mpsc::UnboundedReceiver<CapturedRequest>) {
    let listener = TcpListener::bind(addr).await.unwrap();
    let local_addr = listener.local_addr().unwrap();
    let (tx, rx) = mpsc::unbounded_channel();
    let reply = Arc::new(reply);

    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let tx = tx.clone();
            let reply = Arc::clone(&reply);
            tokio::spawn(async move {
                if let Some(captured) = serve_one(socket, &reply).await {
                    let _ = tx.send(captured);
                }
            });
        }
    });

    (local_addr, rx)
}

async fn serve_one(mut socket: TcpStream, reply: &MockReply) -> Option<CapturedRequest> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let head_end = loop {
        if let Some(pos) = find(&buf, b"\r\n\r\n") {
            break pos + 4;
        }
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buf.extend_from_slice(&chunk[..n]);
    };

    let head = String::from_utf8_lossy(&buf[..head_end]).into_owned();
    let mut captured = CapturedRequest {
        head,
        body: Vec::new(),
    };
    let content_length: usize = captured
        .header("content-length")
        .and_then(|value| value.parse().ok())
        .unwrap_or(0);
    let chunked = captured
        .header("transfer-encoding")
        .is_some_and(|value| value.eq_ignore_ascii_case("chunked"));

    let mut body = buf[head_end..].to_vec();
    loop {
        let complete = if chunked {
            find(&body, b"0\r\n\r\n").is_some()
        } else {
            body.len() >= content_length
        };
        if complete {
            break;
        }
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    captured.body = if chunked { dechunk(&body) } else { body };

    if let Some(delay) = reply.delay {
        tokio::time::sleep(delay).await;
    }

    let mut response = format!("HTTP/1.1 {} Mock\r\n", reply.status);
    for (name, value) in &reply.headers {
        response.push_str(&format!("{name}: {value}\r\n"));
    }
    response.push_str(&format!(
        "Content-Length: {}\r\nConnection: close\r\n\r\n",
        reply.body.len()
    ));
    let _ = socket.write_all(response.as_bytes()).await;
    let _ = socket.write_all(&reply.body).await;
    let _ = socket.shutdown().await;

    Some(captured)
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack
        .windows(needle.len())
        .position(|window| window == needle)
}

fn dechunk(mut raw: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    while let Some(line_end) = find(raw, b"\r\n") {
        let size = std::str::from_utf8(&raw[..line_end])
            .ok()
            .and_then(|line| usize::from_str_radix(line.trim(), 16).ok())
            .unwrap_or(0);
        if size == 0 {
            break;
        }
        let start = line_end + 2;
        out.extend_from_slice(&raw[start..start + size]);
        raw = &raw[start + size + 2..];
    }
    out
}

/// Proxy config listening on an ephemeral loopback port.
pub fn proxy_config(upstream: SocketAddr) -> ProxyConfig {
    ProxyConfig {
        listen: vec!["http://127.0.0.1:0/".into()],
        upstream: format!("http://{upstream}/"),
        ..Default::default()
    }
}

pub fn content_rules(
    media_type: &str,
    rules: Vec<RuleConfig>,
) -> BTreeMap<String, Vec<RuleConfig>> {
    BTreeMap::from([(media_type.to_string(), rules)])
}

/// Compile and start a proxy, returning it with its first bound address.
pub async fn start_proxy(config: ProxyConfig) -> (ProxyServer, SocketAddr) {
    let server = ProxyServer::new(config.compile().unwrap());
    let addrs = server.start().await.unwrap();
    (server, addrs[0])
}

/// Create a client with no connection pooling and no proxy detection.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .pool_max_idle_per_host(0)
        .build()
        .unwrap()
}

/// An address nothing is listening on.
pub fn unused_addr() -> SocketAddr {
    let reserved = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    reserved.local_addr().unwrap()
}

/// Next captured request, failing the test if none arrives in time.
pub async fn next_request(rx: &mut mpsc::UnboundedReceiver<CapturedRequest>) -> CapturedRequest {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("upstream saw no request")
        .expect("mock upstream stopped")
}
