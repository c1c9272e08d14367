use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

/// Source of "now" for expiry checks.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Read-through cache for remote lookups. Entries older than `ttl` are
/// dropped on access; staleness inside the window is accepted.
pub struct TtlCache<K, V> {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<K, (Instant, V)>>,
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let now = self.clock.now();
        let mut entries = self.lock();
        let expired = match entries.get(key) {
            Some((stored_at, _)) => now.duration_since(*stored_at) >= self.ttl,
            None => return None,
        };
        if expired {
            entries.remove(key);
            return None;
        }
        entries.get(key).map(|(_, value)| value.clone())
    }

    pub fn insert(&self, key: K, value: V) {
        let now = self.clock.now();
        self.lock().insert(key, (now, value));
    }

    pub fn invalidate(&self, key: &K) {
        self.lock().remove(key);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // A panic while holding the lock cannot leave a half-written entry.
    fn lock(&self) -> MutexGuard<'_, HashMap<K, (Instant, V)>> {
        self.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;

    /// Clock that only moves when told to.
    pub struct ManualClock {
        base: Instant,
        offset: Mutex<Duration>,
    }

    impl ManualClock {
        pub fn new() -> Self {
            Self {
                base: Instant::now(),
                offset: Mutex::new(Duration::ZERO),
            }
        }

        pub fn advance(&self, by: Duration) {
            *self.offset.lock().unwrap() += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.base + *self.offset.lock().unwrap()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ManualClock;
    use super::*;

    fn cache(clock: &Arc<ManualClock>) -> TtlCache<&'static str, u32> {
        TtlCache::with_clock(Duration::from_secs(300), clock.clone())
    }

    #[test]
    fn fresh_entries_are_served() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache(&clock);
        cache.insert("meals", 3);
        clock.advance(Duration::from_secs(299));
        assert_eq!(cache.get(&"meals"), Some(3));
    }

    #[test]
    fn entries_expire_at_ttl() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache(&clock);
        cache.insert("meals", 3);
        clock.advance(Duration::from_secs(300));
        assert_eq!(cache.get(&"meals"), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn reinsert_restarts_the_window() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache(&clock);
        cache.insert("goals", 1);
        clock.advance(Duration::from_secs(200));
        cache.insert("goals", 2);
        clock.advance(Duration::from_secs(200));
        assert_eq!(cache.get(&"goals"), Some(2));
    }

    #[test]
    fn invalidate_and_clear() {
        let clock = Arc::new(ManualClock::new());
        let cache = cache(&clock);
        cache.insert("a", 1);
        cache.insert("b", 2);
        cache.invalidate(&"a");
        assert_eq!(cache.get(&"a"), None);
        assert_eq!(cache.len(), 1);
        cache.clear();
        assert_eq!(cache.get(&"b"), None);
    }
}
