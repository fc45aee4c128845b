//! Hop-by-hop header filter sets.
//!
//! Fixed for the life of the process; these are not configuration.

use hyper::header::{
    HeaderMap, HeaderName, ACCEPT_ENCODING, CONNECTION, CONTENT_ENCODING, CONTENT_LENGTH,
    CONTENT_TYPE, COOKIE, HOST, TRANSFER_ENCODING,
};

/// Inbound request headers that are never copied verbatim upstream.
pub static REQUEST_FILTER: [HeaderName; 4] =
    [ACCEPT_ENCODING, CONTENT_LENGTH, CONTENT_TYPE, CONNECTION];

/// Inbound request headers the transformer recomputes itself: `Host` is forced
/// to the upstream, cookies travel through the per-pipeline jar, and framing is
/// chosen by the outbound client.
pub static REQUEST_RECOMPUTED: [HeaderName; 3] = [HOST, COOKIE, TRANSFER_ENCODING];

/// Upstream response headers that are never relayed.
pub static RESPONSE_FILTER: [HeaderName; 3] = [TRANSFER_ENCODING, CONTENT_ENCODING, CONNECTION];

/// Copy every value of every header not named in any of `filters`,
/// preserving duplicates.
pub fn copy_filtered(source: &HeaderMap, filters: &[&[HeaderName]]) -> HeaderMap {
    let mut copied = HeaderMap::with_capacity(source.len());
    for (name, value) in source {
        if filters.iter().any(|filter| filter.contains(name)) {
            continue;
        }
        copied.append(name.clone(), value.clone());
    }
    copied
}
