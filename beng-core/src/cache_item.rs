use crate::http::Method;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// Request fingerprint: method, canonicalized URI, plus the value of each
/// header the cached response named in its own `Vary` (§3 "Cache item").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CacheKey {
    pub method: Method,
    pub uri: String,
    pub vary: Vec<(String, String)>,
}

impl CacheKey {
    pub fn new(method: Method, uri: impl Into<String>) -> Self {
        Self {
            method,
            uri: uri.into(),
            vary: Vec::new(),
        }
    }

    pub fn with_vary(mut self, vary: Vec<(String, String)>) -> Self {
        self.vary = vary;
        self
    }
}

/// A cached response. Generic over the payload handle (`beng-cache`
/// instantiates it with a rubber-arena handle or a memcached key) so this
/// crate stays free of a dependency on the storage backend.
#[derive(Debug, Clone)]
pub struct CacheItem<P> {
    pub key: CacheKey,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub payload: P,
    pub size: usize,
    pub inserted_at: Instant,
    pub expires_at: Instant,
}

impl<P> CacheItem<P> {
    pub fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }

    pub fn ttl(&self, now: Instant) -> Duration {
        self.expires_at.saturating_duration_since(now)
    }
}

/// Only `GET`/`HEAD`, status 200/203/300/301/410, without `no-store`,
/// `private`, or `Vary: *` is admissible (§4.6).
pub fn is_admissible(
    method: Method,
    status: u16,
    cache_control: &str,
    vary: &str,
    body_len: usize,
    max_body_bytes: usize,
) -> bool {
    if !method.is_cacheable() {
        return false;
    }
    if !matches!(status, 200 | 203 | 300 | 301 | 410) {
        return false;
    }
    let cc_lower = cache_control.to_ascii_lowercase();
    if cc_lower.split(',').any(|tok| {
        let tok = tok.trim();
        tok == "no-store" || tok == "private"
    }) {
        return false;
    }
    if vary.trim() == "*" {
        return false;
    }
    body_len <= max_body_bytes
}
