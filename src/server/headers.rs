//! Fixed response headers: the security trio applied to every response and
//! the cache-control directives for the two classes of served file.

use axum::http::{HeaderMap, HeaderValue};

/// Sent on every response, including 404s and SPA fallbacks.
pub const SECURITY_HEADERS: [(&str, &str); 3] = [
    ("x-frame-options", "SAMEORIGIN"),
    ("x-content-type-options", "nosniff"),
    ("x-xss-protection", "1; mode=block"),
];

pub fn apply_security_headers(headers: &mut HeaderMap) {
    for (name, value) in SECURITY_HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }
}

/// Cache behavior for a served file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachePolicy {
    /// Fingerprinted asset: cache for `max_age` and never revalidate.
    Immutable,
    /// Entry document: always revalidate so new fingerprints are picked up.
    Revalidate,
    /// Everything else: no directive, browser heuristics apply.
    None,
}

pub fn put_cache_headers(headers: &mut HeaderMap, policy: CachePolicy, max_age_secs: u64) {
    let value = match policy {
        CachePolicy::Immutable => {
            HeaderValue::from_str(&format!("public, max-age={max_age_secs}, immutable")).ok()
        }
        CachePolicy::Revalidate => Some(HeaderValue::from_static("no-cache")),
        CachePolicy::None => None,
    };
    if let Some(value) = value {
        headers.insert("cache-control", value);
    }
}
