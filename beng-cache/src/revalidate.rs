use beng_core::http::HeaderMap;

/// Outcome of comparing a cached entry's validators against a fresh
/// upstream response (§4.6 revalidation).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RevalidationOutcome {
    /// Upstream confirmed the cached body is still current (304); only
    /// headers/expiry are refreshed, the cached body is reused verbatim.
    NotModified,
    /// Upstream sent a full response; the cache entry must be replaced.
    Modified,
}

/// Builds the conditional request headers (`If-None-Match`,
/// `If-Modified-Since`) from a cached entry's stored validators.
pub fn conditional_headers(etag: Option<&str>, last_modified: Option<&str>) -> Vec<(String, String)> {
    let mut out = Vec::new();
    if let Some(etag) = etag {
        out.push(("if-none-match".to_string(), etag.to_string()));
    }
    if let Some(lm) = last_modified {
        out.push(("if-modified-since".to_string(), lm.to_string()));
    }
    out
}

/// Classifies an upstream's response to a conditional revalidation request.
pub fn classify(status: u16) -> RevalidationOutcome {
    if status == 304 {
        RevalidationOutcome::NotModified
    } else {
        RevalidationOutcome::Modified
    }
}

/// Merges a `304`'s headers into the stale entry's stored headers: the
/// response to a conditional request only carries cache-relevant headers
/// (`Expires`, `Cache-Control`, `ETag`, ...), everything else is retained
/// from the original 200 (RFC 7232 §4.1).
pub fn merge_not_modified_headers(stale: &mut Vec<(String, String)>, fresh: &HeaderMap) {
    const UPDATABLE: &[&str] = &[
        "etag",
        "expires",
        "cache-control",
        "last-modified",
        "content-location",
        "vary",
    ];
    for name in UPDATABLE {
        if let Some(value) = fresh.get(name) {
            stale.retain(|(k, _)| k != name);
            stale.push((name.to_string(), value.to_string()));
        }
    }
}
