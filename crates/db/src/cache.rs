//! TTL snapshot cache for derived catalog views.
//!
//! The cache is deliberately lock-light: readers take a shared lock, a stale
//! or missing entry is recomputed by whichever requester discovers it, and
//! concurrent refills simply race with last-write-wins. Recomputation is a
//! pure read-and-derive, so redundant work is the only cost.

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

/// Time source seam so tests can expire entries without sleeping.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Manually advanced clock for TTL tests.
pub struct ManualClock {
    now: Mutex<Instant>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self { now: Mutex::new(Instant::now()) }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().expect("manual clock lock");
        *now += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        *self.now.lock().expect("manual clock lock")
    }
}

struct Entry<T> {
    value: T,
    refreshed_at: Instant,
}

pub struct SnapshotCache<T> {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    slot: RwLock<Option<Entry<T>>>,
}

impl<T: Clone> SnapshotCache<T> {
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self { ttl, clock, slot: RwLock::new(None) }
    }

    /// Cached value if one exists and is younger than the TTL. A stale entry
    /// is treated exactly like an absent one.
    pub async fn get(&self) -> Option<T> {
        let slot = self.slot.read().await;
        slot.as_ref().and_then(|entry| {
            let age = self.clock.now().duration_since(entry.refreshed_at);
            (age < self.ttl).then(|| entry.value.clone())
        })
    }

    pub async fn store(&self, value: T) {
        let refreshed_at = self.clock.now();
        *self.slot.write().await = Some(Entry { value, refreshed_at });
    }

    pub async fn invalidate(&self) {
        *self.slot.write().await = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fresh_entries_are_served_until_the_ttl() {
        let clock = Arc::new(ManualClock::new());
        let cache: SnapshotCache<u32> =
            SnapshotCache::with_clock(Duration::from_secs(300), clock.clone());

        assert_eq!(cache.get().await, None);
        cache.store(7).await;
        assert_eq!(cache.get().await, Some(7));

        clock.advance(Duration::from_secs(299));
        assert_eq!(cache.get().await, Some(7));
    }

    #[tokio::test]
    async fn entries_at_or_past_the_ttl_are_absent() {
        let clock = Arc::new(ManualClock::new());
        let cache: SnapshotCache<u32> =
            SnapshotCache::with_clock(Duration::from_secs(300), clock.clone());

        cache.store(7).await;
        clock.advance(Duration::from_secs(300));
        assert_eq!(cache.get().await, None);
    }

    #[tokio::test]
    async fn store_resets_the_refresh_timestamp() {
        let clock = Arc::new(ManualClock::new());
        let cache: SnapshotCache<u32> =
            SnapshotCache::with_clock(Duration::from_secs(10), clock.clone());

        cache.store(1).await;
        clock.advance(Duration::from_secs(8));
        cache.store(2).await;
        clock.advance(Duration::from_secs(8));

        assert_eq!(cache.get().await, Some(2));
    }

    #[tokio::test]
    async fn invalidate_discards_the_entry_immediately() {
        let cache: SnapshotCache<u32> = SnapshotCache::new(Duration::from_secs(300));

        cache.store(7).await;
        cache.invalidate().await;
        assert_eq!(cache.get().await, None);
    }
}
