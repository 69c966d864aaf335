use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

#[derive(Default)]
pub(crate) struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    stale: AtomicU64,
    stored: AtomicU64,
    invalidations: AtomicU64,
    issued_calls: AtomicU64,
    joined_calls: AtomicU64,
}

fn increment(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

impl Counters {
    pub(crate) fn record_hit(&self) {
        increment(&self.hits);
    }

    pub(crate) fn record_miss(&self) {
        increment(&self.misses);
    }

    pub(crate) fn record_stale(&self) {
        increment(&self.stale);
        increment(&self.misses);
    }

    pub(crate) fn record_stored(&self) {
        increment(&self.stored);
    }

    pub(crate) fn record_invalidation(&self) {
        increment(&self.invalidations);
    }

    pub(crate) fn record_call(&self, issued: bool) {
        if issued {
            increment(&self.issued_calls);
        } else {
            increment(&self.joined_calls);
        }
    }

    pub(crate) fn snapshot(&self) -> CacheStats {
        CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
            stored: self.stored.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            issued_calls: self.issued_calls.load(Ordering::Relaxed),
            joined_calls: self.joined_calls.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time counters for one cache instance.
///
/// `misses` includes `stale` reads. `issued_calls` counts engine calls that
/// went out; `joined_calls` counts callers that attached to one in flight.
#[derive(Clone, Debug, Default, Eq, PartialEq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub stale: u64,
    pub stored: u64,
    pub invalidations: u64,
    pub issued_calls: u64,
    pub joined_calls: u64,
}
