use dashmap::DashMap;
use std::hash::Hash;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Time source for cache and throttle decisions. Injected so tests can
/// drive TTL expiry deterministically instead of sleeping on wall-clock.
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

struct CacheEntry<V> {
    value: V,
    written_at: Instant,
}

/// Key -> (value, written-at) store with lazy expiry. A read is a hit only
/// while the entry is younger than the TTL; stale values stay retrievable
/// through [`TtlCache::get_stale`] for fallback serving. Entries are only
/// ever replaced wholesale, never mutated in place, and eviction happens on
/// an explicit [`TtlCache::sweep`] rather than a background timer.
pub struct TtlCache<K, V>
where
    K: Eq + Hash,
{
    entries: DashMap<K, CacheEntry<V>>,
    ttl: Duration,
    clock: Arc<dyn Clock>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            clock,
        }
    }

    fn is_fresh(&self, entry: &CacheEntry<V>) -> bool {
        self.clock.now().duration_since(entry.written_at) < self.ttl
    }

    /// Miss both when the key is absent and when the entry has expired.
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries
            .get(key)
            .filter(|entry| self.is_fresh(entry))
            .map(|entry| entry.value.clone())
    }

    /// Returns the last written value regardless of age.
    pub fn get_stale(&self, key: &K) -> Option<V> {
        self.entries.get(key).map(|entry| entry.value.clone())
    }

    /// Always overwrites with a fresh timestamp.
    pub fn insert(&self, key: K, value: V) {
        self.entries.insert(
            key,
            CacheEntry {
                value,
                written_at: self.clock.now(),
            },
        );
    }

    /// Drops every entry older than the TTL.
    pub fn sweep(&self) {
        let now = self.clock.now();
        self.entries
            .retain(|_, entry| now.duration_since(entry.written_at) < self.ttl);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Clock;
    use std::sync::Mutex;
    use std::time::{Duration, Instant};

    /// Manually advanced clock for deterministic expiry in tests.
    pub struct ManualClock {
        origin: Instant,
        elapsed: Mutex<Duration>,
    }

    impl ManualClock {
        pub fn new() -> Self {
            Self {
                origin: Instant::now(),
                elapsed: Mutex::new(Duration::ZERO),
            }
        }

        pub fn advance(&self, by: Duration) {
            *self.elapsed.lock().unwrap() += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.origin + *self.elapsed.lock().unwrap()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ManualClock;
    use super::*;

    fn cache_with_clock(ttl_secs: u64) -> (TtlCache<String, u32>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let cache = TtlCache::new(Duration::from_secs(ttl_secs), clock.clone());
        (cache, clock)
    }

    #[test]
    fn fresh_entry_hits_until_ttl_elapses() {
        let (cache, clock) = cache_with_clock(10);
        cache.insert("k".to_string(), 1);

        assert_eq!(cache.get(&"k".to_string()), Some(1));
        clock.advance(Duration::from_secs(9));
        assert_eq!(cache.get(&"k".to_string()), Some(1));
        clock.advance(Duration::from_secs(1));
        assert_eq!(cache.get(&"k".to_string()), None);
    }

    #[test]
    fn stale_read_survives_expiry_until_sweep() {
        let (cache, clock) = cache_with_clock(5);
        cache.insert("k".to_string(), 7);
        clock.advance(Duration::from_secs(6));

        assert_eq!(cache.get(&"k".to_string()), None);
        assert_eq!(cache.get_stale(&"k".to_string()), Some(7));

        cache.sweep();
        assert_eq!(cache.get_stale(&"k".to_string()), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn insert_replaces_value_and_timestamp() {
        let (cache, clock) = cache_with_clock(5);
        cache.insert("k".to_string(), 1);
        clock.advance(Duration::from_secs(4));
        cache.insert("k".to_string(), 2);
        clock.advance(Duration::from_secs(4));

        // A refresh restarts the TTL window for the new value.
        assert_eq!(cache.get(&"k".to_string()), Some(2));
    }

    #[test]
    fn sweep_keeps_fresh_entries() {
        let (cache, clock) = cache_with_clock(5);
        cache.insert("old".to_string(), 1);
        clock.advance(Duration::from_secs(6));
        cache.insert("new".to_string(), 2);
        cache.sweep();

        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&"new".to_string()), Some(2));
    }
}
