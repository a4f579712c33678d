use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};

use crate::clock::Clock;

struct Slot<T> {
    value: T,
    stored_at: DateTime<Utc>,
}

struct Inner<T> {
    slot: Option<Slot<T>>,
    /// Bumped on every invalidation.
    generation: u64,
}

/// Single-value cache with a fixed time-to-live.
///
/// Expiry is measured with the injected [`Clock`]; writers call
/// [`TtlCache::invalidate`] after mutating the underlying record. A reader
/// that loads from the store takes [`TtlCache::generation`] first and
/// stores with [`TtlCache::put_if_current`], so a load that raced an
/// invalidation is returned to its caller but never cached.
pub struct TtlCache<T> {
    inner: Mutex<Inner<T>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<T: Clone> TtlCache<T> {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(Inner {
                slot: None,
                generation: 0,
            }),
            ttl,
            clock,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns the cached value if it is younger than the TTL.
    pub fn get(&self) -> Option<T> {
        let now = self.clock.now();
        self.lock()
            .slot
            .as_ref()
            .filter(|s| now - s.stored_at < self.ttl)
            .map(|s| s.value.clone())
    }

    pub fn generation(&self) -> u64 {
        self.lock().generation
    }

    /// Stores `value` unless the cache was invalidated after `generation`
    /// was read. Returns whether the value was kept.
    pub fn put_if_current(&self, generation: u64, value: T) -> bool {
        let stored_at = self.clock.now();
        let mut inner = self.lock();
        if inner.generation != generation {
            return false;
        }
        inner.slot = Some(Slot { value, stored_at });
        true
    }

    pub fn invalidate(&self) {
        let mut inner = self.lock();
        inner.slot = None;
        inner.generation = inner.generation.wrapping_add(1);
    }
}
