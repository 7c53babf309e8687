use crate::rubber::{Rubber, RubberHandle};
use beng_core::cache_item::{CacheItem, CacheKey};
use dashmap::DashMap;
use std::time::Instant;

/// Storage backend for cached response bodies, abstracting over the
/// in-process rubber arena and an external memcached pool.
pub trait CacheStore {
    type Payload;

    fn get(&mut self, key: &CacheKey) -> Option<CacheItem<Self::Payload>>;
    fn put(&mut self, item: CacheItem<Self::Payload>);
    fn remove(&mut self, key: &CacheKey);
    fn read_body(&self, payload: &Self::Payload) -> Option<Vec<u8>>;
}

/// The default backend: bodies live in this worker's [`Rubber`] arena;
/// the index itself is a small in-process map keyed by [`CacheKey`].
pub struct RubberStore {
    rubber: Rubber,
    index: std::collections::HashMap<CacheKey, CacheItem<RubberHandle>>,
}

impl RubberStore {
    pub fn new(capacity: usize, compaction_ratio: f64) -> std::io::Result<Self> {
        Ok(Self {
            rubber: Rubber::new(capacity, compaction_ratio)?,
            index: std::collections::HashMap::new(),
        })
    }

    pub fn rubber_mut(&mut self) -> &mut Rubber {
        &mut self.rubber
    }

    /// Looks up `key` without evicting it even if expired, so a caller can
    /// revalidate a stale entry instead of treating it as a plain miss
    /// (§4.6 revalidation).
    pub fn peek_stale(&self, key: &CacheKey) -> Option<&CacheItem<RubberHandle>> {
        self.index.get(key)
    }
}

impl CacheStore for RubberStore {
    type Payload = RubberHandle;

    fn get(&mut self, key: &CacheKey) -> Option<CacheItem<RubberHandle>> {
        let item = self.index.get(key)?;
        if item.is_expired(Instant::now()) {
            self.index.remove(key);
            return None;
        }
        Some(item.clone())
    }

    fn put(&mut self, item: CacheItem<RubberHandle>) {
        if let Some(old) = self.index.insert(item.key.clone(), item) {
            self.rubber.remove(old.payload);
        }
    }

    fn remove(&mut self, key: &CacheKey) {
        if let Some(old) = self.index.remove(key) {
            self.rubber.remove(old.payload);
        }
    }

    fn read_body(&self, payload: &RubberHandle) -> Option<Vec<u8>> {
        self.rubber.read(payload).map(|b| b.to_vec())
    }
}

/// A distributed backend storing bodies under a derived key in an
/// external memcached pool, for deployments that share a cache across
/// several proxy instances (supplemented from the original
/// implementation, which offered both an in-process and a memcached
/// cache backend).
pub trait MemcachedClient: Send + Sync {
    fn get(&self, key: &str) -> Option<Vec<u8>>;
    fn set(&self, key: &str, value: &[u8], ttl_secs: u32);
    fn delete(&self, key: &str);
}

pub struct MemcachedStore<C: MemcachedClient> {
    client: C,
    index: DashMap<CacheKey, CacheItem<String>>,
}

impl<C: MemcachedClient> MemcachedStore<C> {
    pub fn new(client: C) -> Self {
        Self {
            client,
            index: DashMap::new(),
        }
    }

    pub fn memcached_key(key: &CacheKey) -> String {
        format!("beng:{:?}:{}", key.method, key.uri)
    }
}

impl<C: MemcachedClient> CacheStore for MemcachedStore<C> {
    type Payload = String;

    fn get(&mut self, key: &CacheKey) -> Option<CacheItem<String>> {
        let item = self.index.get(key)?;
        if item.is_expired(Instant::now()) {
            drop(item);
            self.remove(key);
            return None;
        }
        Some(item.clone())
    }

    fn put(&mut self, item: CacheItem<String>) {
        let ttl_secs = item.ttl(Instant::now()).as_secs().max(1) as u32;
        self.client.set(&item.payload, &[], ttl_secs);
        self.index.insert(item.key.clone(), item);
    }

    fn remove(&mut self, key: &CacheKey) {
        if let Some((_, item)) = self.index.remove(key) {
            self.client.delete(&item.payload);
        }
    }

    fn read_body(&self, payload: &String) -> Option<Vec<u8>> {
        self.client.get(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beng_core::http::Method;
    use std::time::Duration;

    #[test]
    fn rubber_store_round_trips_a_cached_item() {
        let mut store = RubberStore::new(4096, 3.0).unwrap();
        let handle = store.rubber_mut().add(5).unwrap();
        store.rubber_mut().write(&handle, 0, b"hello");
        let key = CacheKey::new(Method::Get, "/x");
        store.put(CacheItem {
            key: key.clone(),
            status: 200,
            headers: vec![],
            payload: handle,
            size: 5,
            inserted_at: Instant::now(),
            expires_at: Instant::now() + Duration::from_secs(60),
        });
        let fetched = store.get(&key).unwrap();
        assert_eq!(store.read_body(&fetched.payload), Some(b"hello".to_vec()));
    }

    #[test]
    fn expired_entries_are_evicted_on_get() {
        let mut store = RubberStore::new(4096, 3.0).unwrap();
        let handle = store.rubber_mut().add(1).unwrap();
        let key = CacheKey::new(Method::Get, "/x");
        store.put(CacheItem {
            key: key.clone(),
            status: 200,
            headers: vec![],
            payload: handle,
            size: 1,
            inserted_at: Instant::now(),
            expires_at: Instant::now(),
        });
        std::thread::sleep(Duration::from_millis(2));
        assert!(store.get(&key).is_none());
    }
}
