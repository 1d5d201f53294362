//! Time-indexed in-memory cache.
//!
//! Process-local, lost on restart. Expiry is enforced on read, so
//! correctness never depends on a background timer; callers may still spawn
//! best-effort eviction timers and use [`TtlCache::remove_if`] so an older
//! timer cannot clobber a newer entry under the same key.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Time source, swappable in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Production clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

struct Entry<V> {
    value: V,
    deadline: Instant,
}

/// Mutex-guarded map from key to value with a per-entry deadline.
pub struct TtlCache<K, V> {
    entries: Mutex<HashMap<K, Entry<V>>>,
    clock: Arc<dyn Clock>,
}

impl<K: Eq + Hash + Clone, V: Clone> TtlCache<K, V> {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Insert a value, overwriting any existing entry and restarting its window.
    pub fn insert(&self, key: K, value: V, ttl: Duration) {
        let deadline = self.clock.now() + ttl;
        let mut entries = self.entries.lock().unwrap();
        entries.insert(key, Entry { value, deadline });
    }

    /// Get a value if it has not expired. An expired entry is removed on
    /// this path so stale values never remain readable.
    pub fn get_if_valid(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if self.clock.now() <= entry.deadline => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Get and remove under one lock when the entry is unexpired, so a
    /// single-use token cannot be consumed twice by concurrent callers.
    /// Expired entries are evicted and yield `None`.
    pub fn take_if_valid(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if self.clock.now() <= entry.deadline => {
                entries.remove(key).map(|e| e.value)
            }
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Remove and return the entry regardless of expiry.
    pub fn remove(&self, key: &K) -> Option<V> {
        let mut entries = self.entries.lock().unwrap();
        entries.remove(key).map(|e| e.value)
    }

    /// Remove the entry only when the predicate holds for the stored value.
    /// Returns whether an entry was removed.
    pub fn remove_if<F: FnOnce(&V) -> bool>(&self, key: &K, pred: F) -> bool {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(entry) if pred(&entry.value) => {
                entries.remove(key);
                true
            }
            _ => false,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Default for TtlCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
pub mod test_clock {
    use super::*;

    /// Manually advanced clock for expiry tests without real sleeps.
    pub struct ManualClock {
        start: Instant,
        offset: Mutex<Duration>,
    }

    impl ManualClock {
        pub fn new() -> Self {
            Self {
                start: Instant::now(),
                offset: Mutex::new(Duration::ZERO),
            }
        }

        pub fn advance(&self, by: Duration) {
            *self.offset.lock().unwrap() += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            self.start + *self.offset.lock().unwrap()
        }
    }
}
