//! Bounded memoization of loader results.
//!
//! Keys are canonical JSON serializations of the inputs. Values are stored
//! behind `Arc` and never change once inserted; the oldest entry is dropped
//! when the capacity is exceeded.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use utoipa::ToSchema;

/// Hit/miss counters and current size.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub entries: usize,
}

#[derive(Debug)]
struct CacheState<V> {
    entries: HashMap<String, Arc<V>>,
    order: VecDeque<String>,
    hits: u64,
    misses: u64,
}

/// Thread-safe FIFO-evicting result cache.
#[derive(Debug)]
pub struct ResultCache<V> {
    capacity: usize,
    state: Mutex<CacheState<V>>,
}

impl<V> ResultCache<V> {
    /// A capacity of 0 disables storing.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            state: Mutex::new(CacheState {
                entries: HashMap::new(),
                order: VecDeque::new(),
                hits: 0,
                misses: 0,
            }),
        }
    }

    // Entries are immutable, so a panic in another holder cannot leave them half-written.
    fn lock(&self) -> MutexGuard<'_, CacheState<V>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Looks up `key` and records a hit or miss.
    pub fn get(&self, key: &str) -> Option<Arc<V>> {
        let mut state = self.lock();
        match state.entries.get(key).cloned() {
            Some(value) => {
                state.hits += 1;
                Some(value)
            }
            None => {
                state.misses += 1;
                None
            }
        }
    }

    /// Stores `value` unless `key` is already present; returns the stored entry.
    pub fn insert(&self, key: String, value: V) -> Arc<V> {
        let value = Arc::new(value);
        if self.capacity == 0 {
            return value;
        }

        let mut state = self.lock();
        if let Some(existing) = state.entries.get(&key) {
            return Arc::clone(existing);
        }
        state.entries.insert(key.clone(), Arc::clone(&value));
        state.order.push_back(key);
        while state.entries.len() > self.capacity {
            match state.order.pop_front() {
                Some(oldest) => {
                    state.entries.remove(&oldest);
                }
                None => break,
            }
        }
        value
    }

    /// Returns the cached value or computes and stores it.
    ///
    /// `compute` runs without holding the lock.
    pub fn get_or_insert_with(&self, key: String, compute: impl FnOnce() -> V) -> Arc<V> {
        if let Some(hit) = self.get(&key) {
            return hit;
        }
        self.insert(key, compute())
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.lock();
        CacheStats {
            hits: state.hits,
            misses: state.misses,
            entries: state.entries.len(),
        }
    }

    /// Drops all entries; counters are kept.
    pub fn clear(&self) {
        let mut state = self.lock();
        state.entries.clear();
        state.order.clear();
    }
}

/// Canonical serialization used as cache key.
pub fn cache_key<T: Serialize>(value: &T) -> serde_json::Result<String> {
    serde_json::to_string(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn computes_once_per_key() {
        let cache = ResultCache::new(4);
        let calls = AtomicUsize::new(0);
        let compute = || {
            calls.fetch_add(1, Ordering::SeqCst);
            42
        };

        assert_eq!(*cache.get_or_insert_with("a".to_string(), compute), 42);
        assert_eq!(*cache.get_or_insert_with("a".to_string(), compute), 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            cache.stats(),
            CacheStats {
                hits: 1,
                misses: 1,
                entries: 1
            }
        );
    }

    #[test]
    fn evicts_oldest_entry_when_full() {
        let cache = ResultCache::new(2);
        cache.insert("a".to_string(), 1);
        cache.insert("b".to_string(), 2);
        cache.insert("c".to_string(), 3);

        assert_eq!(cache.len(), 2);
        assert!(cache.get("a").is_none());
        assert_eq!(cache.get("b").as_deref(), Some(&2));
        assert_eq!(cache.get("c").as_deref(), Some(&3));
    }

    #[test]
    fn first_insert_wins() {
        let cache = ResultCache::new(2);
        cache.insert("a".to_string(), 1);
        let stored = cache.insert("a".to_string(), 2);
        assert_eq!(*stored, 1);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn zero_capacity_never_stores() {
        let cache = ResultCache::new(0);
        let value = cache.insert("a".to_string(), 7);
        assert_eq!(*value, 7);
        assert!(cache.is_empty());
        assert!(cache.get("a").is_none());
    }

    #[test]
    fn clear_keeps_counters() {
        let cache = ResultCache::new(2);
        cache.insert("a".to_string(), 1);
        let _ = cache.get("a");
        cache.clear();
        assert!(cache.is_empty());
        assert_eq!(cache.stats().hits, 1);
    }

    #[test]
    fn concurrent_readers_and_writers() {
        let cache = ResultCache::new(16);
        std::thread::scope(|scope| {
            for worker in 0..8 {
                let cache = &cache;
                scope.spawn(move || {
                    for i in 0..32 {
                        let key = format!("k{}", (i + worker) % 8);
                        let value = cache.get_or_insert_with(key.clone(), || key.len());
                        assert_eq!(*value, key.len());
                    }
                });
            }
        });
        assert_eq!(cache.len(), 8);
    }

    #[test]
    fn keys_are_canonical_json() {
        #[derive(Serialize)]
        struct Input<'a> {
            id: &'a str,
            qty: u32,
        }
        let key = cache_key(&Input { id: "x", qty: 3 }).unwrap();
        assert_eq!(key, r#"{"id":"x","qty":3}"#);
    }
}
