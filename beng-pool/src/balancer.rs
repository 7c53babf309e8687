use crate::failure_table::FailureTable;

/// Address-selection strategy for a multi-node [`crate::address::ResourceAddress::Http`]
/// group (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BalancePolicy {
    /// Hashes a sticky key (e.g. the session id) to a stable starting
    /// address so repeat requests land on the same node.
    StickyHash,
    RoundRobin,
}

fn fnv1a(s: &str) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in s.bytes() {
        hash ^= b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Orders and retries across a set of upstream addresses (§4.4).
pub struct Balancer {
    policy: BalancePolicy,
    rr_counter: usize,
}

impl Balancer {
    pub fn new(policy: BalancePolicy) -> Self {
        Self {
            policy,
            rr_counter: 0,
        }
    }

    /// Returns `addresses` reordered starting from the chosen node, with
    /// `Failed` nodes demoted to the back of the list (stable otherwise).
    pub fn pick_order(
        &mut self,
        addresses: &[String],
        sticky_key: Option<&str>,
        failures: &FailureTable,
    ) -> Vec<String> {
        let n = addresses.len();
        if n == 0 {
            return Vec::new();
        }
        let start = match self.policy {
            BalancePolicy::StickyHash => sticky_key.map(|k| (fnv1a(k) as usize) % n).unwrap_or(0),
            BalancePolicy::RoundRobin => {
                let s = self.rr_counter % n;
                self.rr_counter = self.rr_counter.wrapping_add(1);
                s
            }
        };
        let mut ordered: Vec<String> = (0..n).map(|i| addresses[(start + i) % n].clone()).collect();
        ordered.sort_by_key(|a| failures.get(a) as u8);
        ordered
    }

    /// Retry budget for a group of `node_count` addresses (§4.4: give up
    /// after `min(N-1, 3)` retries beyond the first attempt).
    pub fn max_retries(node_count: usize) -> usize {
        node_count.saturating_sub(1).min(3)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::failure_table::FailureStatus;
    use std::time::Duration;

    #[test]
    fn round_robin_advances_the_start_each_call() {
        let mut b = Balancer::new(BalancePolicy::RoundRobin);
        let addrs = vec!["a".into(), "b".into(), "c".into()];
        let failures = FailureTable::new();
        let first = b.pick_order(&addrs, None, &failures);
        let second = b.pick_order(&addrs, None, &failures);
        assert_ne!(first[0], second[0]);
    }

    #[test]
    fn sticky_hash_is_deterministic_for_the_same_key() {
        let mut b1 = Balancer::new(BalancePolicy::StickyHash);
        let mut b2 = Balancer::new(BalancePolicy::StickyHash);
        let addrs = vec!["a".into(), "b".into(), "c".into()];
        let failures = FailureTable::new();
        let o1 = b1.pick_order(&addrs, Some("session-42"), &failures);
        let o2 = b2.pick_order(&addrs, Some("session-42"), &failures);
        assert_eq!(o1, o2);
    }

    #[test]
    fn failed_nodes_are_demoted_to_the_back() {
        let mut b = Balancer::new(BalancePolicy::RoundRobin);
        let addrs = vec!["a".into(), "b".into(), "c".into()];
        let mut failures = FailureTable::new();
        failures.set("a", FailureStatus::Failed, Duration::from_secs(20));
        let ordered = b.pick_order(&addrs, None, &failures);
        assert_eq!(ordered.last(), Some(&"a".to_string()));
    }

    #[test]
    fn max_retries_is_capped_at_three() {
        assert_eq!(Balancer::max_retries(1), 0);
        assert_eq!(Balancer::max_retries(2), 1);
        assert_eq!(Balancer::max_retries(10), 3);
    }
}
