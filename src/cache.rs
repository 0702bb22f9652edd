// Stats cache - TTL-bounded store between scrapes
//
// Backed by a sharded map so concurrent fetch workers only contend on the
// shard they touch. Hit/miss counters are atomics outside the map.

use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::stats::Stats;

struct CacheEntry {
    stats: Stats,
    stored_at: Instant,
}

/// Thread-safe TTL cache of normalized stats keyed by container ID.
///
/// When disabled the cache holds nothing: `get` always misses (and counts
/// the miss) and `set` is a no-op.
pub struct StatsCache {
    entries: DashMap<String, CacheEntry>,
    ttl: Duration,
    enabled: bool,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl StatsCache {
    /// Creates a new cache.
    ///
    /// # Arguments
    /// * `ttl` - Maximum age before an entry is treated as absent
    /// * `enabled` - When false, the cache is a zero-storage bypass
    pub fn new(ttl: Duration, enabled: bool) -> Self {
        StatsCache {
            entries: DashMap::new(),
            ttl,
            enabled,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    /// Returns a copy of the cached stats if present and not older than the TTL.
    ///
    /// Expired entries count as a miss but are left for `evict_stale`.
    pub fn get(&self, id: &str) -> Option<Stats> {
        if !self.enabled {
            self.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        }

        let found = self
            .entries
            .get(id)
            .filter(|entry| entry.stored_at.elapsed() <= self.ttl)
            .map(|entry| entry.stats.clone());

        match found {
            Some(_) => self.hits.fetch_add(1, Ordering::Relaxed),
            None => self.misses.fetch_add(1, Ordering::Relaxed),
        };

        found
    }

    /// Stores stats, overwriting any previous entry and restarting its TTL.
    pub fn set(&self, id: impl Into<String>, stats: Stats) {
        if !self.enabled {
            return;
        }

        self.entries.insert(
            id.into(),
            CacheEntry {
                stats,
                stored_at: Instant::now(),
            },
        );
    }

    /// Removes a single entry.
    pub fn evict(&self, id: &str) {
        self.entries.remove(id);
    }

    /// Removes every entry older than the TTL. Run once per scrape cycle.
    pub fn evict_stale(&self) {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries.retain(|_, entry| entry.stored_at.elapsed() <= ttl);

        let evicted = before.saturating_sub(self.entries.len());
        if evicted > 0 {
            debug!(evicted, remaining = self.entries.len(), "Evicted stale cache entries");
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Total number of `get` calls that returned stats.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Total number of `get` calls that returned nothing.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn stats(id: &str, usage: u64) -> Stats {
        let mut s = Stats {
            id: id.to_string(),
            ..Default::default()
        };
        s.memory.usage = usage;
        s
    }

    #[test]
    fn test_get_set() {
        let cache = StatsCache::new(Duration::from_secs(5), true);
        cache.set("abc123", stats("abc123", 1024));

        let got = cache.get("abc123").unwrap();
        assert_eq!(got.memory.usage, 1024);
    }

    #[test]
    fn test_miss_counts() {
        let cache = StatsCache::new(Duration::from_secs(5), true);

        assert!(cache.get("nonexistent").is_none());
        assert_eq!(cache.misses(), 1);
        assert_eq!(cache.hits(), 0);
    }

    #[test]
    fn test_ttl_expiry() {
        let cache = StatsCache::new(Duration::from_millis(10), true);
        cache.set("abc", stats("abc", 1));

        thread::sleep(Duration::from_millis(20));
        assert!(cache.get("abc").is_none(), "expired entry should not be returned");

        // Get does not remove it; the sweep does
        assert_eq!(cache.len(), 1);
        cache.evict_stale();
        assert!(cache.is_empty());
    }

    // TTL widened from 10ms to 200ms so a slow sleep cannot turn the hit into a miss
    #[test]
    fn test_fresh_entry_is_hit_with_widened_ttl() {
        let cache = StatsCache::new(Duration::from_millis(200), true);
        cache.set("abc", stats("abc", 1));

        thread::sleep(Duration::from_millis(5));
        assert!(cache.get("abc").is_some());
        assert_eq!(cache.hits(), 1);

        thread::sleep(Duration::from_millis(200));
        assert!(cache.get("abc").is_none());
        assert_eq!(cache.misses(), 1);
    }

    #[test]
    fn test_set_overwrites() {
        let cache = StatsCache::new(Duration::from_secs(5), true);
        cache.set("abc", stats("abc", 1));
        cache.set("abc", stats("abc", 2));

        assert_eq!(cache.get("abc").unwrap().memory.usage, 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_evict() {
        let cache = StatsCache::new(Duration::from_secs(5), true);
        cache.set("abc", stats("abc", 1));
        cache.evict("abc");

        assert!(cache.get("abc").is_none());
    }

    #[test]
    fn test_evict_stale_keeps_fresh_entries() {
        let cache = StatsCache::new(Duration::from_millis(10), true);

        cache.set("old", stats("old", 1));
        thread::sleep(Duration::from_millis(20));
        cache.set("new", stats("new", 2));

        cache.evict_stale();

        assert!(cache.get("old").is_none());
        assert!(cache.get("new").is_some());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_disabled_is_bypass() {
        let cache = StatsCache::new(Duration::from_secs(5), false);

        cache.set("abc", stats("abc", 1));
        assert!(cache.get("abc").is_none(), "disabled cache should always miss");
        assert!(cache.get("abc").is_none());

        assert_eq!(cache.misses(), 2);
        assert_eq!(cache.hits(), 0);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_hit_miss_counters() {
        let cache = StatsCache::new(Duration::from_secs(5), true);

        cache.set("abc", stats("abc", 1));
        cache.get("abc");
        cache.get("abc");
        cache.get("miss");

        assert_eq!(cache.hits(), 2);
        assert_eq!(cache.misses(), 1);
    }

    #[test]
    fn test_concurrent_access() {
        let cache = Arc::new(StatsCache::new(Duration::from_secs(5), true));

        let handles: Vec<_> = (0..16)
            .map(|worker| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..100 {
                        let id = format!("container-{}", (worker + i) % 26);
                        cache.set(id.clone(), stats(&id, i));
                        cache.get(&id);
                    }
                    cache.evict_stale();
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.hits() + cache.misses(), 1600);
        assert!(cache.len() <= 26);
    }
}
