//! Cacheability and freshness policy.

use std::collections::HashMap;
use std::time::Duration;

use crate::transport::{HttpRequest, HttpResponse};

/// Content types eligible for caching. Textual responses only - the
/// cache stores bodies as strings and compresses what is worth
/// compressing.
const CACHEABLE_TYPES: &[&str] = &[
    "text/",
    "application/json",
    "application/javascript",
    "application/x-javascript",
    "application/xml",
    "application/xhtml+xml",
    "application/rss+xml",
    "image/svg+xml",
];

/// Whether this request/response pair may be stored.
///
/// Requires: GET with no body, status 200 exactly, an allow-listed
/// textual `Content-Type`, and a `Cache-Control` carrying neither
/// `no-store` nor `private`. Other success statuses are excluded
/// because a cached hit is replayed as a complete 200 body - a 206
/// partial response stored here would later masquerade as the whole
/// resource.
pub fn is_cacheable(request: &HttpRequest, response: &HttpResponse) -> bool {
    if request.method != "GET" || request.body.is_some() {
        return false;
    }
    if response.status != 200 {
        return false;
    }

    let content_type = match header(&response.headers, "content-type") {
        Some(value) => value.to_ascii_lowercase(),
        None => return false,
    };
    if !CACHEABLE_TYPES.iter().any(|prefix| content_type.starts_with(prefix)) {
        return false;
    }

    if let Some(cache_control) = header(&response.headers, "cache-control") {
        let directives = cache_control.to_ascii_lowercase();
        if has_directive(&directives, "no-store") || has_directive(&directives, "private") {
            return false;
        }
    }

    true
}

/// Time-to-live for a response: `max-age` when present (zero means
/// already expired), otherwise the configured fallback.
pub fn ttl_from_headers(headers: &HashMap<String, String>, default_ttl: Duration) -> Duration {
    let Some(cache_control) = header(headers, "cache-control") else {
        return default_ttl;
    };

    for directive in cache_control.split(',') {
        let directive = directive.trim().to_ascii_lowercase();
        if let Some(value) = directive.strip_prefix("max-age=") {
            if let Ok(seconds) = value.trim().parse::<u64>() {
                return Duration::from_secs(seconds);
            }
        }
    }

    default_ttl
}

/// Case-insensitive header lookup.
pub fn header<'a>(headers: &'a HashMap<String, String>, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

fn has_directive(directives: &str, wanted: &str) -> bool {
    directives.split(',').any(|d| d.trim() == wanted)
}
