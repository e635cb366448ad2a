//! Time-boxed cache for the feature count
//!
//! Counting a large collection is expensive, so a computed count is reused
//! for a fixed TTL. The cache holds a single `{value, stored_at}` pair behind
//! a short critical section. Concurrent misses may both recompute and both
//! store; the last write wins, which is harmless because the value is the
//! same query result.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Source of the current instant, injectable for tests
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock backed by [`Instant::now`]
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            now: Mutex::new(Instant::now()),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap_or_else(|e| e.into_inner());
        *now += by;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[derive(Debug, Clone, Copy)]
struct CachedCount {
    value: u64,
    stored_at: Instant,
}

/// Process-wide cached feature count
pub struct CountCache {
    entry: Mutex<Option<CachedCount>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl CountCache {
    /// Create a cache using the system clock
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entry: Mutex::new(None),
            ttl,
            clock,
        }
    }

    /// The cached value, if one was stored less than `ttl` ago
    pub fn get(&self) -> Option<u64> {
        let entry = *self.entry.lock().unwrap_or_else(|e| e.into_inner());
        let now = self.clock.now();

        entry
            .filter(|cached| now.saturating_duration_since(cached.stored_at) < self.ttl)
            .map(|cached| cached.value)
    }

    /// Store a freshly computed value
    pub fn store(&self, value: u64) {
        let stored_at = self.clock.now();
        let mut entry = self.entry.lock().unwrap_or_else(|e| e.into_inner());
        *entry = Some(CachedCount { value, stored_at });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_with_clock(ttl_secs: u64) -> (CountCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let cache = CountCache::with_clock(Duration::from_secs(ttl_secs), clock.clone());
        (cache, clock)
    }

    #[test]
    fn test_empty_cache_misses() {
        let (cache, _) = cache_with_clock(30);
        assert_eq!(cache.get(), None);
    }

    #[test]
    fn test_hit_within_ttl() {
        let (cache, clock) = cache_with_clock(30);
        cache.store(42);

        clock.advance(Duration::from_secs(29));
        assert_eq!(cache.get(), Some(42));
    }

    #[test]
    fn test_expires_at_ttl() {
        let (cache, clock) = cache_with_clock(30);
        cache.store(42);

        clock.advance(Duration::from_secs(30));
        assert_eq!(cache.get(), None);
    }

    #[test]
    fn test_store_refreshes_timestamp() {
        let (cache, clock) = cache_with_clock(30);
        cache.store(1);
        clock.advance(Duration::from_secs(20));
        cache.store(2);
        clock.advance(Duration::from_secs(20));

        assert_eq!(cache.get(), Some(2));
    }
}
