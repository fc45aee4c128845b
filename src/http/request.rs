//! Request transformation.
//!
//! # Responsibilities
//! - Retarget the inbound URI at the upstream (scheme, host, port), keeping the path
//! - Rewrite query parameter names and values with the query rules
//! - Copy headers minus the filter sets; force `Host` and `Connection: close`
//! - Move inbound cookies into a jar scoped to the upstream
//! - Stream the inbound body through without buffering
//!
//! # Design Decisions
//! - One outbound client per pipeline: its cookie jar belongs to that request only
//! - Redirects are not followed, so every inbound exchange maps to one upstream exchange
//! - `Accept-Encoding` is never sent; body rewriting needs identity-encoded bytes

use std::sync::Arc;

use http_body_util::BodyDataStream;
use hyper::body::{Body, Bytes};
use hyper::header::{
    HeaderMap, HeaderValue, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE, COOKIE, HOST,
    TRANSFER_ENCODING,
};
use hyper::{Request, Uri};
use reqwest::cookie::Jar;
use reqwest::redirect::Policy;
use url::Url;

use crate::config::ProxySettings;
use crate::http::error::ProxyError;
use crate::http::headers::{copy_filtered, REQUEST_FILTER, REQUEST_RECOMPUTED};
use crate::rewrite::{query, RuleSet};

/// An outbound request ready to send, with the client that owns its cookie jar.
pub struct UpstreamExchange {
    client: reqwest::Client,
    request: reqwest::Request,
    cookies: Arc<Jar>,
}

impl UpstreamExchange {
    pub fn request(&self) -> &reqwest::Request {
        &self.request
    }

    pub fn cookies(&self) -> &Jar {
        &self.cookies
    }

    /// Issue the request and wait for the response head.
    pub async fn send(self) -> Result<reqwest::Response, ProxyError> {
        self.client
            .execute(self.request)
            .await
            .map_err(ProxyError::Upstream)
    }
}

/// Build the upstream request for an inbound one.
pub fn build_upstream_request<B>(
    inbound: Request<B>,
    settings: &ProxySettings,
) -> Result<UpstreamExchange, ProxyError>
where
    B: Body<Data = Bytes> + Send + Sync + 'static,
    B::Error: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    let (parts, body) = inbound.into_parts();
    let upstream = &settings.upstream;
    let url = upstream_url(&parts.uri, upstream, &settings.query_rules);

    let origin = origin_of(upstream);
    let cookies = Arc::new(Jar::default());
    for cookie in inbound_cookies(&parts.headers) {
        cookies.add_cookie_str(cookie, &origin);
    }

    let mut headers = copy_filtered(
        &parts.headers,
        &[&REQUEST_FILTER[..], &REQUEST_RECOMPUTED[..]],
    );
    let host = upstream.host_str().unwrap_or_default();
    let host_value = HeaderValue::from_str(host)
        .map_err(|_| ProxyError::InvalidUpstreamHost(host.to_string()))?;
    headers.insert(HOST, host_value);
    headers.insert(CONNECTION, HeaderValue::from_static("close"));

    let declared_length = content_length(&parts.headers);
    if declares_body(declared_length, &parts.headers) {
        if let Some(content_type) = parts.headers.get(CONTENT_TYPE) {
            headers.insert(CONTENT_TYPE, content_type.clone());
        }
        if let Some(length) = declared_length {
            headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
        }
    }

    let client = reqwest::Client::builder()
        .cookie_provider(Arc::clone(&cookies))
        .redirect(Policy::none())
        .no_proxy()
        .pool_max_idle_per_host(0)
        .build()
        .map_err(ProxyError::Client)?;

    let mut builder = client.request(parts.method, url).headers(headers);
    if declares_body(declared_length, &parts.headers) {
        builder = builder.body(reqwest::Body::wrap_stream(BodyDataStream::new(body)));
    }
    let request = builder.build().map_err(ProxyError::BuildRequest)?;

    Ok(UpstreamExchange {
        client,
        request,
        cookies,
    })
}

/// Upstream URL for an inbound request target.
///
/// Scheme, host and port come from `upstream`; the path is kept as received
/// apart from `.`/`..` segments, which are resolved, and the query is
/// rewritten by `query_rules`.
pub fn upstream_url(inbound: &Uri, upstream: &Url, query_rules: &RuleSet) -> Url {
    let mut url = upstream.clone();
    url.set_fragment(None);
    url.set_path(inbound.path());
    let rewritten = query::rewrite(inbound.query().unwrap_or_default(), query_rules);
    url.set_query(rewritten.strip_prefix('?'));
    url
}

/// Root of the upstream, so forwarded cookies apply to every path on it.
fn origin_of(upstream: &Url) -> Url {
    let mut origin = upstream.clone();
    origin.set_path("/");
    origin.set_query(None);
    origin.set_fragment(None);
    origin
}

fn inbound_cookies(headers: &HeaderMap) -> impl Iterator<Item = &str> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .map(str::trim)
        .filter(|cookie| !cookie.is_empty())
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
}

fn declares_body(content_length: Option<u64>, headers: &HeaderMap) -> bool {
    let chunked = headers
        .get_all(TRANSFER_ENCODING)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .any(|value| value.to_ascii_lowercase().contains("chunked"));
    content_length.is_some_and(|length| length > 0) || chunked
}
