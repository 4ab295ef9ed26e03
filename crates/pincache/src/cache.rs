//! SharedCache: lock-guarded handle around a PinnedLru

use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::debug;

use crate::config::CacheConfig;
use crate::error::Result;
use crate::lru::{PinnedLru, PutOutcome};
use crate::stats::CacheStats;

/// Thread-safe handle to a pinned LRU cache
///
/// Every call holds the lock for its whole duration, so each operation is
/// atomic with respect to the others. Clones share the same cache and
/// statistics.
pub struct SharedCache<K, V> {
    /// Label used in log events
    name: Arc<str>,

    /// The cache itself
    cache: Arc<RwLock<PinnedLru<K, V>>>,

    /// Cache statistics
    stats: Arc<CacheStats>,

    /// Cache capacity
    capacity: usize,
}

impl<K, V> Clone for SharedCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            name: Arc::clone(&self.name),
            cache: Arc::clone(&self.cache),
            stats: Arc::clone(&self.stats),
            capacity: self.capacity,
        }
    }
}

impl<K, V> SharedCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Create a new cache with the given capacity
    pub fn new(capacity: usize) -> Self {
        Self::from_config(&CacheConfig::with_capacity(capacity))
    }

    /// Create a cache from loaded configuration
    pub fn from_config(config: &CacheConfig) -> Self {
        debug!(cache = %config.name, capacity = config.capacity, "creating cache");

        Self {
            name: Arc::from(config.name.as_str()),
            cache: Arc::new(RwLock::new(PinnedLru::new(config.capacity))),
            stats: Arc::new(CacheStats::new()),
            capacity: config.capacity,
        }
    }

    /// Name given in the configuration
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Get a copy of the value for `key`, refreshing recency if unpinned
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let value = self.cache.write().get(key);
        match value {
            Some(_) => self.stats.record_hit(),
            None => self.stats.record_miss(),
        }
        value
    }

    /// Get a copy of the value for `key` without touching recency
    pub fn peek<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.cache.read().peek(key).cloned()
    }

    /// Check whether `key` is present
    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.cache.read().contains(key)
    }

    /// Check whether `key` is present and pinned
    pub fn is_pinned<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.cache.read().is_pinned(key)
    }

    /// Insert or update a key-value pair
    pub fn put(&self, key: K, value: V) -> PutOutcome {
        let outcome = self.tracked(|cache| cache.put(key, value));
        match outcome {
            PutOutcome::Inserted => self.stats.record_insert(),
            PutOutcome::RejectedPinnedFull => {
                self.stats.record_rejection();
                debug!(cache = %self.name, "put rejected");
            }
            PutOutcome::UpdatedExisting => {}
        }
        outcome
    }

    /// Remove `key`, returning false if it was absent
    pub fn erase<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.cache.write().erase(key)
    }

    /// Exempt `key` from eviction
    pub fn pin<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.cache.write().pin(key)
    }

    /// Make `key` evictable again
    pub fn unpin<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.tracked(|cache| cache.unpin(key))
    }

    /// Copy entries of `other` whose keys are absent here
    ///
    /// Merging a handle into itself, or into any clone of itself, does
    /// nothing. `other` is read under its own lock and released before this
    /// cache is locked, so concurrent merges in opposite directions cannot
    /// deadlock.
    pub fn merge(&self, other: &SharedCache<K, V>) {
        if Arc::ptr_eq(&self.cache, &other.cache) {
            debug!(cache = %self.name, "ignoring merge into itself");
            return;
        }

        let donor = other.cache.read().clone();
        self.tracked(|cache| cache.merge(&donor));
        debug!(cache = %self.name, donor = %other.name, "merged");
    }

    /// Remove every entry and reset statistics
    pub fn clear(&self) {
        self.cache.write().clear();
        self.stats.reset();
    }

    /// Get cache statistics
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }

    /// Get current entry count
    pub fn len(&self) -> usize {
        self.cache.read().len()
    }

    /// Check if the cache is empty
    pub fn is_empty(&self) -> bool {
        self.cache.read().is_empty()
    }

    /// Get current pinned entry count
    pub fn pinned_len(&self) -> usize {
        self.cache.read().pinned_len()
    }

    /// Get cache capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Verify internal consistency of the cache
    pub fn check_invariants(&self) -> Result<()> {
        self.cache.read().check_invariants()
    }

    /// Copy the current contents into a standalone cache
    pub fn snapshot(&self) -> PinnedLru<K, V> {
        self.cache.read().clone()
    }

    /// Run `op` under the write lock and count the evictions it caused
    fn tracked<R>(&self, op: impl FnOnce(&mut PinnedLru<K, V>) -> R) -> R {
        let mut cache = self.cache.write();
        let before = cache.evictions();
        let result = op(&mut cache);
        self.stats.record_evictions(cache.evictions() - before);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    type Cache = SharedCache<String, i64>;

    #[test]
    fn test_cache_basic() {
        let cache = Cache::new(10);

        assert_eq!(cache.put("a".into(), 1), PutOutcome::Inserted);
        assert_eq!(cache.get("a"), Some(1));

        assert_eq!(cache.stats().hits(), 1);
        assert_eq!(cache.stats().misses(), 0);
        assert_eq!(cache.stats().inserts(), 1);
    }

    #[test]
    fn test_cache_miss() {
        let cache = Cache::new(10);

        assert_eq!(cache.get("nope"), None);
        assert_eq!(cache.stats().misses(), 1);
        assert_eq!(cache.stats().hit_ratio(), 0.0);
    }

    #[test]
    fn test_cache_eviction() {
        let cache = Cache::new(2);

        cache.put("x".into(), 1);
        cache.put("y".into(), 2);
        assert_eq!(cache.len(), 2);

        cache.put("z".into(), 3);

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().evictions(), 1);
        assert_eq!(cache.get("x"), None);
        assert_eq!(cache.get("y"), Some(2));
        assert_eq!(cache.get("z"), Some(3));
    }

    #[test]
    fn test_cache_pin_and_reject() {
        let cache = Cache::new(1);

        cache.put("a".into(), 1);
        assert!(cache.pin("a"));
        assert!(cache.is_pinned("a"));

        assert_eq!(cache.put("b".into(), 2), PutOutcome::RejectedPinnedFull);
        assert_eq!(cache.stats().rejections(), 1);
        assert_eq!(cache.pinned_len(), 1);
    }

    #[test]
    fn test_cache_unpin_counts_evictions() {
        let src = Cache::new(4);
        for key in ["p", "q"] {
            src.put(key.into(), 0);
            src.pin(key);
        }

        let cache = Cache::new(2);
        cache.put("a".into(), 1);
        cache.merge(&src);
        assert_eq!(cache.stats().evictions(), 1);
        assert_eq!(cache.len(), 2);

        assert!(cache.unpin("p"));
        assert!(cache.unpin("q"));
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.stats().evictions(), 1);
        cache.check_invariants().unwrap();
    }

    #[test]
    fn test_cache_erase() {
        let cache = Cache::new(10);

        cache.put("a".into(), 1);
        assert!(cache.erase("a"));
        assert!(!cache.erase("a"));
        assert!(!cache.contains("a"));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_cache_clear() {
        let cache = Cache::new(10);

        cache.put("a".into(), 1);
        cache.put("b".into(), 2);
        cache.get("a");
        cache.clear();

        assert_eq!(cache.len(), 0);
        assert_eq!(cache.stats().hits(), 0);
        assert_eq!(cache.capacity(), 10);
    }

    #[test]
    fn test_cache_peek() {
        let cache = Cache::new(2);

        cache.put("a".into(), 1);
        cache.put("b".into(), 2);
        assert_eq!(cache.peek("a"), Some(1));
        cache.put("c".into(), 3);

        assert!(!cache.contains("a"));
        assert_eq!(cache.stats().hits(), 0);
    }

    #[test]
    fn test_self_merge_is_noop() {
        let cache = Cache::new(2);
        cache.put("a".into(), 1);

        let alias = cache.clone();
        cache.merge(&alias);
        cache.merge(&cache);

        assert_eq!(cache.len(), 1);
        cache.check_invariants().unwrap();
    }

    #[test]
    fn test_merge_leaves_donor_untouched() {
        let a = Cache::new(4);
        let b = Cache::new(4);

        a.put("k".into(), 1);
        b.put("k".into(), 2);
        b.put("j".into(), 3);
        b.pin("j");
        let donor_stats = b.stats().snapshot();

        a.merge(&b);

        assert_eq!(a.get("k"), Some(1));
        assert!(a.is_pinned("j"));
        assert_eq!(b.peek("k"), Some(2));
        assert_eq!(b.len(), 2);
        assert_eq!(b.stats().snapshot(), donor_stats);
    }

    #[test]
    fn test_from_config() {
        let config = CacheConfig {
            name: "sessions".to_string(),
            capacity: 3,
        };
        let cache: Cache = SharedCache::from_config(&config);

        assert_eq!(cache.name(), "sessions");
        assert_eq!(cache.capacity(), 3);
    }

    #[test]
    fn test_snapshot_is_detached() {
        let cache = Cache::new(3);
        cache.put("a".into(), 1);

        let mut copy = cache.snapshot();
        copy.put("b".to_string(), 2);

        assert_eq!(copy.len(), 2);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_concurrent_access() {
        let cache = Cache::new(16);

        let handles: Vec<_> = (0..4)
            .map(|t| {
                let cache = cache.clone();
                thread::spawn(move || {
                    for i in 0..200i64 {
                        let key = format!("t{}-{}", t, i % 24);
                        cache.put(key.clone(), i);
                        if i % 7 == 0 {
                            cache.pin(&key);
                        }
                        if i % 11 == 0 {
                            cache.unpin(&key);
                        }
                        cache.get(&key);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        cache.check_invariants().unwrap();
        assert!(cache.len() <= cache.capacity() || cache.snapshot().unpinned_len() == 0);
    }

    #[test]
    fn test_concurrent_cross_merge() {
        let a = Cache::new(8);
        let b = Cache::new(8);
        for i in 0..8 {
            a.put(format!("a{}", i), i);
            b.put(format!("b{}", i), i);
        }

        let (a2, b2) = (a.clone(), b.clone());
        let left = thread::spawn(move || {
            for _ in 0..50 {
                a2.merge(&b2);
            }
        });
        let (a3, b3) = (a.clone(), b.clone());
        let right = thread::spawn(move || {
            for _ in 0..50 {
                b3.merge(&a3);
            }
        });

        left.join().unwrap();
        right.join().unwrap();

        a.check_invariants().unwrap();
        b.check_invariants().unwrap();
        assert_eq!(a.len(), 8);
        assert_eq!(b.len(), 8);
    }
}
