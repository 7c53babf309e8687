use std::time::{Duration, Instant};

const SLOTS: usize = 64;

/// Worst-recorded status for an upstream address (§4.4, §8 invariant #8).
/// Ordered worst-to-best by discriminant so a `>=` comparison expresses
/// "at least as bad as".
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum FailureStatus {
    Ok = 0,
    Fade = 1,
    Monitor = 2,
    Failed = 3,
}

struct Slot {
    addr: Option<String>,
    status: FailureStatus,
    expires_at: Instant,
}

/// A fixed 64-slot hash table recording the worst recent failure status
/// per upstream address, mirroring the source tree's `failure.cxx`. Two
/// addresses hashing to the same slot simply evict one another — accepted
/// imprecision for a hint structure, not a consistency guarantee.
pub struct FailureTable {
    slots: Vec<Slot>,
}

fn djb2(addr: &str) -> usize {
    let mut hash: u64 = 5381;
    for b in addr.bytes() {
        hash = hash.wrapping_mul(33).wrapping_add(b as u64);
    }
    (hash % SLOTS as u64) as usize
}

impl FailureTable {
    pub fn new() -> Self {
        let now = Instant::now();
        let slots = (0..SLOTS)
            .map(|_| Slot {
                addr: None,
                status: FailureStatus::Ok,
                expires_at: now,
            })
            .collect();
        Self { slots }
    }

    /// Records `status` for `addr`, valid for `ttl`. A slot is overwritten
    /// if it already tracks this address, has expired, or the incoming
    /// status is at least as bad as what's recorded (status precedence).
    pub fn set(&mut self, addr: &str, status: FailureStatus, ttl: Duration) {
        let now = Instant::now();
        let idx = djb2(addr);
        let slot = &mut self.slots[idx];
        let same_addr = slot.addr.as_deref() == Some(addr);
        let expired = slot.expires_at <= now;
        if same_addr || expired || status >= slot.status {
            slot.addr = Some(addr.to_string());
            slot.status = status;
            slot.expires_at = now + ttl;
        }
    }

    /// Clears any recorded failure for `addr` (a successful connect, §4.4).
    pub fn clear(&mut self, addr: &str) {
        let idx = djb2(addr);
        let slot = &mut self.slots[idx];
        if slot.addr.as_deref() == Some(addr) {
            slot.status = FailureStatus::Ok;
            slot.expires_at = Instant::now();
        }
    }

    pub fn get(&self, addr: &str) -> FailureStatus {
        let idx = djb2(addr);
        let slot = &self.slots[idx];
        if slot.addr.as_deref() == Some(addr) && slot.expires_at > Instant::now() {
            slot.status
        } else {
            FailureStatus::Ok
        }
    }
}

impl Default for FailureTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_address_is_ok() {
        let t = FailureTable::new();
        assert_eq!(t.get("10.0.0.1:80"), FailureStatus::Ok);
    }

    #[test]
    fn a_recorded_failure_expires_back_to_ok() {
        let mut t = FailureTable::new();
        t.set("10.0.0.1:80", FailureStatus::Failed, Duration::from_millis(1));
        assert_eq!(t.get("10.0.0.1:80"), FailureStatus::Failed);
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(t.get("10.0.0.1:80"), FailureStatus::Ok);
    }

    #[test]
    fn clear_resets_status_immediately() {
        let mut t = FailureTable::new();
        t.set("10.0.0.1:80", FailureStatus::Failed, Duration::from_secs(20));
        t.clear("10.0.0.1:80");
        assert_eq!(t.get("10.0.0.1:80"), FailureStatus::Ok);
    }

    #[test]
    fn a_worse_status_overrides_a_better_one_still_in_effect() {
        let mut t = FailureTable::new();
        t.set("a", FailureStatus::Fade, Duration::from_secs(5));
        t.set("a", FailureStatus::Failed, Duration::from_secs(5));
        assert_eq!(t.get("a"), FailureStatus::Failed);
    }
}
