use std::collections::HashMap;
use std::time::{Duration, Instant};

struct Idle<C> {
    conn: C,
    since: Instant,
}

/// A LIFO pool of idle upstream connections keyed by address (§4.2, §4.4).
/// Generic over the connection handle type so this crate stays free of a
/// dependency on `monoio`'s concrete socket types.
pub struct IdlePool<C> {
    per_address: HashMap<String, Vec<Idle<C>>>,
    idle_per_address_max: usize,
    idle_global_max: usize,
    idle_timeout: Duration,
    total: usize,
}

impl<C> IdlePool<C> {
    pub fn new(idle_per_address_max: usize, idle_global_max: usize, idle_timeout: Duration) -> Self {
        Self {
            per_address: HashMap::new(),
            idle_per_address_max,
            idle_global_max,
            idle_timeout,
            total: 0,
        }
    }

    /// Returns the most-recently-idled live connection for `addr`, if any
    /// (LIFO: favors a warm, recently-used connection).
    pub fn take(&mut self, addr: &str) -> Option<C> {
        self.expire(addr);
        let bucket = self.per_address.get_mut(addr)?;
        let idle = bucket.pop()?;
        self.total -= 1;
        Some(idle.conn)
    }

    /// Returns `conn` to the pool, evicting the oldest entry for this
    /// address (or globally) if over budget.
    pub fn put(&mut self, addr: String, conn: C) {
        if self.idle_per_address_max == 0 || self.idle_global_max == 0 {
            return;
        }
        let bucket = self.per_address.entry(addr).or_default();
        if bucket.len() >= self.idle_per_address_max {
            bucket.remove(0);
            self.total -= 1;
        }
        if self.total >= self.idle_global_max {
            self.evict_oldest_global();
        }
        bucket.push(Idle {
            conn,
            since: Instant::now(),
        });
        self.total += 1;
    }

    fn expire(&mut self, addr: &str) {
        let timeout = self.idle_timeout;
        if let Some(bucket) = self.per_address.get_mut(addr) {
            let before = bucket.len();
            bucket.retain(|idle| idle.since.elapsed() < timeout);
            self.total -= before - bucket.len();
        }
    }

    fn evict_oldest_global(&mut self) {
        let mut oldest: Option<(&String, usize, Instant)> = None;
        for (addr, bucket) in &self.per_address {
            if let Some(front) = bucket.first() {
                if oldest.map(|(_, _, t)| front.since < t).unwrap_or(true) {
                    oldest = Some((addr, 0, front.since));
                }
            }
        }
        if let Some((addr, idx, _)) = oldest {
            let addr = addr.clone();
            if let Some(bucket) = self.per_address.get_mut(&addr) {
                bucket.remove(idx);
                self.total -= 1;
            }
        }
    }

    pub fn len(&self) -> usize {
        self.total
    }

    pub fn is_empty(&self) -> bool {
        self.total == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn take_returns_the_most_recently_returned_connection() {
        let mut pool: IdlePool<u32> = IdlePool::new(4, 16, Duration::from_secs(60));
        pool.put("a".into(), 1);
        pool.put("a".into(), 2);
        assert_eq!(pool.take("a"), Some(2));
        assert_eq!(pool.take("a"), Some(1));
        assert_eq!(pool.take("a"), None);
    }

    #[test]
    fn expired_idle_connections_are_not_returned() {
        let mut pool: IdlePool<u32> = IdlePool::new(4, 16, Duration::from_millis(1));
        pool.put("a".into(), 1);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(pool.take("a"), None);
    }

    #[test]
    fn per_address_budget_evicts_the_oldest_entry() {
        let mut pool: IdlePool<u32> = IdlePool::new(1, 16, Duration::from_secs(60));
        pool.put("a".into(), 1);
        pool.put("a".into(), 2);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.take("a"), Some(2));
    }
}
