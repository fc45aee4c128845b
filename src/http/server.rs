//! Proxy server lifecycle and accept loops.
//!
//! # Responsibilities
//! - Bind every listen prefix on `start`, failing synchronously on bind errors
//! - Run one accept loop per listener until `stop`
//! - Spawn one task per connection running transform → upstream call → relay
//! - Publish pipeline failures on a broadcast channel and keep serving
//!
//! # Design Decisions
//! - `stop` only ends the accept loops; accepted connections run to completion
//! - Connections are served HTTP/1.1 without keep-alive: one exchange each
//! - A failed pipeline closes its connection without writing an error page

use std::error::Error as _;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use http_body_util::Full;
use hyper::body::{Body, Bytes};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response};
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio::sync::broadcast;
use tracing::Instrument;

use crate::config::ProxySettings;
use crate::http::error::{ProxyError, ServerError};
use crate::http::request::build_upstream_request;
use crate::http::response::relay;
use crate::lifecycle::{Shutdown, StopSignal};
use crate::net::{ConnectionTracker, Listener};
use crate::resilience::backoff::AcceptBackoff;

/// Pipeline failures buffered for slow subscribers before they start lagging.
const ERROR_CHANNEL_CAPACITY: usize = 256;

/// Server lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Stopped,
    Listening,
}

/// Everything a connection task needs, cheap to clone.
#[derive(Clone)]
struct PipelineContext {
    settings: Arc<ProxySettings>,
    errors: broadcast::Sender<Arc<ProxyError>>,
    connections: ConnectionTracker,
}

struct Running {
    shutdown: Shutdown,
    local_addrs: Vec<SocketAddr>,
}

/// Forwarding proxy for a single upstream.
pub struct ProxyServer {
    context: PipelineContext,
    running: Mutex<Option<Running>>,
}

impl ProxyServer {
    pub fn new(settings: ProxySettings) -> Self {
        let (errors, _) = broadcast::channel(ERROR_CHANNEL_CAPACITY);
        Self {
            context: PipelineContext {
                settings: Arc::new(settings),
                errors,
                connections: ConnectionTracker::new(),
            },
            running: Mutex::new(None),
        }
    }

    pub fn state(&self) -> ServerState {
        if self.lock_running().is_some() {
            ServerState::Listening
        } else {
            ServerState::Stopped
        }
    }

    /// Bind all listen prefixes and start accepting.
    ///
    /// Returns the bound addresses. Nothing is left listening if any bind fails.
    pub async fn start(&self) -> Result<Vec<SocketAddr>, ServerError> {
        if self.state() == ServerState::Listening {
            return Err(ServerError::AlreadyListening);
        }

        let mut listeners = Vec::with_capacity(self.context.settings.listen.len());
        for prefix in &self.context.settings.listen {
            listeners.push(Listener::bind(prefix).await?);
        }
        let local_addrs: Vec<SocketAddr> = listeners.iter().map(Listener::local_addr).collect();

        let mut running = self.lock_running();
        if running.is_some() {
            return Err(ServerError::AlreadyListening);
        }
        let shutdown = Shutdown::new();
        for listener in listeners {
            tokio::spawn(accept_loop(
                listener,
                self.context.clone(),
                shutdown.subscribe(),
            ));
        }
        *running = Some(Running {
            shutdown,
            local_addrs: local_addrs.clone(),
        });

        tracing::info!(
            upstream = %self.context.settings.upstream,
            listeners = local_addrs.len(),
            "Proxy listening"
        );
        Ok(local_addrs)
    }

    /// Stop accepting connections. In-flight pipelines are not cancelled.
    pub fn stop(&self) {
        if let Some(running) = self.lock_running().take() {
            running.shutdown.trigger();
            tracing::info!(
                in_flight = self.in_flight(),
                "Proxy stopped accepting connections"
            );
        }
    }

    /// Addresses currently bound; empty when stopped.
    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.lock_running()
            .as_ref()
            .map(|running| running.local_addrs.clone())
            .unwrap_or_default()
    }

    /// Receive one event per failed connection pipeline.
    pub fn subscribe_errors(&self) -> broadcast::Receiver<Arc<ProxyError>> {
        self.context.errors.subscribe()
    }

    /// Connections whose pipeline is still running.
    pub fn in_flight(&self) -> u64 {
        self.context.connections.in_flight()
    }

    fn lock_running(&self) -> MutexGuard<'_, Option<Running>> {
        self.running
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Drop for ProxyServer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn accept_loop(listener: Listener, context: PipelineContext, mut stop: StopSignal) {
    let mut backoff = AcceptBackoff::default();
    loop {
        let accepted = tokio::select! {
            biased;
            _ = stop.stopped() => break,
            accepted = listener.accept() => accepted,
        };

        match accepted {
            Ok((stream, peer_addr)) => {
                backoff.on_success();
                spawn_pipeline(stream, peer_addr, context.clone());
            }
            Err(e) => {
                let delay = backoff.on_failure();
                tracing::warn!(
                    error = %e,
                    failures = backoff.failures(),
                    delay_ms = delay.as_millis() as u64,
                    "Accept failed, backing off"
                );
                tokio::select! {
                    biased;
                    _ = stop.stopped() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        }
    }
    tracing::info!(prefix = %listener.prefix(), "Accept loop stopped");
}

fn spawn_pipeline(stream: TcpStream, peer_addr: SocketAddr, context: PipelineContext) {
    let guard = context.connections.track();
    let span = tracing::info_span!(
        "connection",
        connection_id = %guard.id(),
        peer_addr = %peer_addr
    );

    tokio::spawn(
        async move {
            let _guard = guard;
            let settings = Arc::clone(&context.settings);
            let service = service_fn(move |request| {
                let settings = Arc::clone(&settings);
                async move { forward(request, &settings).await.map_err(Arc::new) }
            });

            let served = http1::Builder::new()
                .keep_alive(false)
                .serve_connection(TokioIo::new(stream), service)
                .await;

            if let Err(e) = served {
                let failure = pipeline_failure(e);
                tracing::warn!(error = %failure, "Pipeline failed");
                // No subscribers is fine; the failure is already logged.
                let _ = context.errors.send(failure);
            }
        }
        .instrument(span),
    );
}

/// Run one inbound request through the pipeline.
pub async fn forward<B>(
    request: Request<B>,
    settings: &ProxySettings,
) -> Result<Response<Full<Bytes>>, ProxyError>
where
    B: Body<Data = Bytes> + Send + Sync + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let method = request.method().clone();
    let uri = request.uri().clone();

    let exchange = build_upstream_request(request, settings)?;
    tracing::debug!(
        method = %method,
        uri = %uri,
        upstream = %exchange.request().url(),
        "Forwarding request"
    );

    let upstream = exchange.send().await?;
    let response = relay(upstream, &settings.content_rules).await?;

    tracing::info!(
        method = %method,
        uri = %uri,
        status = response.status().as_u16(),
        "Request forwarded"
    );
    Ok(response)
}

/// The service's own error when it caused the failure, otherwise the
/// connection-level error.
fn pipeline_failure(e: hyper::Error) -> Arc<ProxyError> {
    match e
        .source()
        .and_then(|cause| cause.downcast_ref::<Arc<ProxyError>>())
    {
        Some(failure) => Arc::clone(failure),
        None => Arc::new(ProxyError::Connection(e)),
    }
}
