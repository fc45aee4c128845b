//! Response relay.
//!
//! # Responsibilities
//! - Copy status and headers from the upstream response, minus hop-by-hop ones
//! - Buffer the whole body, rewrite it when a content rule set matches
//! - Send it back as one fixed-length block with `Connection: close`
//!
//! # Design Decisions
//! - Full buffering: rules need the complete text, a match may span any boundary
//! - Decoding and re-encoding use the same encoding, so `Content-Length` is
//!   measured on the bytes actually written
//! - Unregistered or missing content types pass through byte for byte

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::header::{HeaderMap, HeaderValue, CONNECTION, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::Response;

use crate::http::error::ProxyError;
use crate::http::headers::{copy_filtered, RESPONSE_FILTER};
use crate::rewrite::charset::{self, MediaType};
use crate::rewrite::ContentRules;

/// Turn an upstream response into the response written to the caller.
pub async fn relay(
    upstream: reqwest::Response,
    content_rules: &ContentRules,
) -> Result<Response<Full<Bytes>>, ProxyError> {
    let status = upstream.status();
    let mut headers = relayed_headers(upstream.headers());
    let content_type = upstream
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(str::to_owned);

    let body = upstream.bytes().await.map_err(ProxyError::UpstreamBody)?;
    let body = if body.is_empty() {
        body
    } else {
        let body = rewrite_body(content_type.as_deref(), body, content_rules)?;
        headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));
        body
    };
    headers.insert(CONNECTION, HeaderValue::from_static("close"));

    tracing::debug!(
        status = status.as_u16(),
        bytes = body.len(),
        "Relaying response"
    );

    let mut response = Response::new(Full::new(body));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}

/// Upstream headers that survive the response filter, duplicates included.
pub fn relayed_headers(upstream: &HeaderMap) -> HeaderMap {
    copy_filtered(upstream, &[&RESPONSE_FILTER[..]])
}

/// Apply the content rules registered for `content_type` to `body`.
///
/// Returns the body untouched when there is no content type or no rule set
/// for its media type.
pub fn rewrite_body(
    content_type: Option<&str>,
    body: Bytes,
    content_rules: &ContentRules,
) -> Result<Bytes, ProxyError> {
    let Some(content_type) = content_type else {
        return Ok(body);
    };
    let media_type = MediaType::parse(content_type);
    let Some(rules) = content_rules.for_media_type(media_type.essence) else {
        return Ok(body);
    };

    let encoding = media_type.encoding()?;
    let rewritten = charset::transcode(&body, encoding, |text| rules.apply_all(text));
    tracing::trace!(
        media_type = media_type.essence,
        encoding = encoding.name(),
        before = body.len(),
        after = rewritten.len(),
        "Body rewritten"
    );
    Ok(Bytes::from(rewritten))
}
