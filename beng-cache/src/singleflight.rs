use beng_core::cache_item::CacheKey;
use beng_stream::{tee, ByteStream, TeeBranch};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Coalesces concurrent requests for the same not-yet-cached key onto a
/// single upstream fetch, handing every waiter its own [`TeeBranch`] of the
/// one real response stream (§4.6 "concurrent misses on the same key share
/// a single upstream fetch").
///
/// Single-threaded by design: each worker owns its own cache and its own
/// `SingleFlight`, matching the thread-per-core model the rest of the data
/// plane uses, so no cross-thread synchronization is needed here.
#[derive(Default)]
pub struct SingleFlight {
    in_flight: HashMap<CacheKey, Rc<RefCell<Option<Box<dyn ByteStream>>>>>,
}

impl SingleFlight {
    pub fn new() -> Self {
        Self {
            in_flight: HashMap::new(),
        }
    }

    /// Registers `key` as in-flight with the real upstream `source`
    /// stream, returning the first branch to read from. Subsequent calls
    /// to [`SingleFlight::join`] for the same key get their own branch of
    /// the same stream instead of triggering a second upstream fetch.
    pub fn start(&mut self, key: CacheKey, source: Box<dyn ByteStream>) -> TeeBranch {
        let (a, b) = tee(source);
        self.in_flight.insert(key, Rc::new(RefCell::new(Some(Box::new(b)))));
        a
    }

    /// Joins an already-in-flight fetch for `key`, if one exists.
    ///
    /// The slot only ever yields one extra branch: the first joiner takes
    /// the stashed branch directly; anyone after that re-tees it, since a
    /// `TeeBranch` only exposes two consumer ends at a time.
    pub fn join(&mut self, key: &CacheKey) -> Option<TeeBranch> {
        let slot = self.in_flight.get(key)?;
        let mut held = slot.borrow_mut();
        let existing = held.take()?;
        let (a, b) = tee(existing);
        *held = Some(Box::new(b));
        Some(a)
    }

    pub fn is_in_flight(&self, key: &CacheKey) -> bool {
        self.in_flight.contains_key(key)
    }

    /// Marks a fetch complete; further joiners must issue a fresh request.
    pub fn finish(&mut self, key: &CacheKey) {
        self.in_flight.remove(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use beng_core::http::Method;
    use beng_stream::{drain, MemoryStream};

    #[test]
    fn a_joiner_sees_the_same_bytes_as_the_original_fetch() {
        let mut sf = SingleFlight::new();
        let key = CacheKey::new(Method::Get, "/x");
        let mut first = sf.start(key.clone(), Box::new(MemoryStream::new(&b"shared body"[..])));
        assert!(sf.is_in_flight(&key));

        let mut second = sf.join(&key).expect("a fetch is in flight");

        let h1 = drain(&mut first, 16);
        let h2 = drain(&mut second, 16);
        assert_eq!(h1.data, b"shared body");
        assert_eq!(h2.data, b"shared body");
    }

    #[test]
    fn joining_an_unknown_key_returns_none() {
        let mut sf = SingleFlight::new();
        let key = CacheKey::new(Method::Get, "/missing");
        assert!(sf.join(&key).is_none());
    }

    #[test]
    fn finish_clears_the_in_flight_marker() {
        let mut sf = SingleFlight::new();
        let key = CacheKey::new(Method::Get, "/x");
        let _ = sf.start(key.clone(), Box::new(MemoryStream::new(&b"x"[..])));
        sf.finish(&key);
        assert!(!sf.is_in_flight(&key));
    }
}
