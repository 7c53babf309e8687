use beng_core::translation::TranslationResponse;
use dashmap::DashMap;
use regex::Regex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Key a cached translation response by URI plus the `Vary`-named header
/// values the response itself declared (§4.7 step 2 caching note).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TranslationCacheKey {
    pub uri: String,
    pub vary: Vec<(String, String)>,
}

struct Entry {
    response: TranslationResponse,
    expires_at: Option<Instant>,
    /// Set when the response carried `REGEX`/`INVERSE_REGEX`: this cache
    /// entry only applies to URIs whose match against `pattern` agrees
    /// with `regex` (true) or `Self::inverse` (false).
    regex: Option<(Regex, bool)>,
}

/// An LRU-bounded cache of translation responses with regex-scoped entries
/// and a crossbeam-channel fanout for out-of-band invalidation pushes,
/// generalized from a watch-driven config-cache invalidation scheme to the
/// translation protocol's `INVALIDATE` field.
pub struct TranslationCache {
    entries: Arc<DashMap<TranslationCacheKey, Entry>>,
    max_entries: usize,
    invalidate_tx: crossbeam_channel::Sender<String>,
    invalidate_rx: crossbeam_channel::Receiver<String>,
}

impl TranslationCache {
    pub fn new(max_entries: usize) -> Self {
        let (tx, rx) = crossbeam_channel::unbounded();
        Self {
            entries: Arc::new(DashMap::new()),
            max_entries,
            invalidate_tx: tx,
            invalidate_rx: rx,
        }
    }

    pub fn get(&self, uri: &str, vary: &[(String, String)]) -> Option<TranslationResponse> {
        self.drain_invalidations();
        let key = TranslationCacheKey {
            uri: uri.to_string(),
            vary: vary.to_vec(),
        };
        if let Some(entry) = self.entries.get(&key) {
            if let Some(exp) = entry.expires_at {
                if exp <= Instant::now() {
                    drop(entry);
                    self.entries.remove(&key);
                    return None;
                }
            }
            if let Some((re, positive)) = &entry.regex {
                if re.is_match(uri) != *positive {
                    return None;
                }
            }
            return Some(entry.response.clone());
        }
        None
    }

    pub fn insert(&self, key: TranslationCacheKey, response: TranslationResponse, max_age: Option<Duration>) {
        if self.entries.len() >= self.max_entries {
            // Cheap LRU approximation: evict an arbitrary entry rather than
            // tracking access order, bounding memory without a second index.
            if let Some(victim) = self.entries.iter().next().map(|e| e.key().clone()) {
                self.entries.remove(&victim);
            }
        }
        let regex = response
            .invalidate
            .first()
            .and_then(|pat| Regex::new(pat).ok())
            .map(|re| (re, true));
        self.entries.insert(
            key,
            Entry {
                response,
                expires_at: max_age.map(|d| Instant::now() + d),
                regex,
            },
        );
    }

    /// A sender other parts of the system (the control-plane translation
    /// client) can use to push `INVALIDATE` notifications in from outside.
    pub fn invalidation_sender(&self) -> crossbeam_channel::Sender<String> {
        self.invalidate_tx.clone()
    }

    fn drain_invalidations(&self) {
        while let Ok(pattern) = self.invalidate_rx.try_recv() {
            if let Ok(re) = Regex::new(&pattern) {
                self.entries.retain(|key, _| !re.is_match(&key.uri));
            } else {
                self.entries.retain(|key, _| key.uri != pattern);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
