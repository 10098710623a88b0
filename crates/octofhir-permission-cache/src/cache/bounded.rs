//! Fixed-capacity LRU map.
//!
//! [`BoundedCache`] knows nothing about permissions or expiry: it only keeps
//! at most `capacity` entries and, when full, evicts the least recently used
//! key to make room for a new one. Callers that need TTL semantics store a
//! [`CacheEntry`](super::CacheEntry) as the value and check it themselves.
//!
//! # Example
//!
//! ```
//! use octofhir_permission_cache::cache::BoundedCache;
//!
//! let mut cache = BoundedCache::new(2)?;
//! cache.set("a", 1);
//! cache.set("b", 2);
//! cache.get(&"a"); // touch "a"
//! cache.set("c", 3); // evicts "b"
//!
//! assert!(cache.has(&"a"));
//! assert!(!cache.has(&"b"));
//! # Ok::<(), octofhir_permission_cache::CacheError>(())
//! ```

use std::borrow::Borrow;
use std::hash::Hash;
use std::num::NonZeroUsize;

use lru::LruCache;

use crate::{CacheError, CacheResult};

/// Least-recently-used bounded map.
///
/// Iteration order (for [`keys`](Self::keys), [`values`](Self::values) and
/// [`entries`](Self::entries)) is recency order, oldest first.
pub struct BoundedCache<K, V>
where
    K: Hash + Eq,
{
    inner: LruCache<K, V>,
    evictions: u64,
}

impl<K, V> BoundedCache<K, V>
where
    K: Hash + Eq,
{
    /// Create a cache holding at most `capacity` entries.
    ///
    /// # Errors
    ///
    /// Returns a configuration error when `capacity` is zero.
    pub fn new(capacity: usize) -> CacheResult<Self> {
        let capacity = NonZeroUsize::new(capacity)
            .ok_or_else(|| CacheError::configuration("cache capacity must be > 0"))?;
        Ok(Self {
            inner: LruCache::new(capacity),
            evictions: 0,
        })
    }

    /// Get a value and mark its key as most recently used.
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.get(key)
    }

    /// Get a value without touching recency.
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.peek(key)
    }

    /// Insert or replace a value; the key becomes most recently used.
    ///
    /// Inserting a new key into a full cache evicts exactly one entry, the
    /// least recently used one, and returns it.
    pub fn set(&mut self, key: K, value: V) -> Option<(K, V)> {
        if self.inner.contains(&key) {
            // Replacing never evicts.
            self.inner.push(key, value);
            return None;
        }

        let evicted = self.inner.push(key, value);
        if evicted.is_some() {
            self.evictions += 1;
        }
        evicted
    }

    /// Check for a key without touching recency.
    pub fn has<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.contains(key)
    }

    /// Remove a key, returning its value.
    pub fn delete<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.inner.pop(key)
    }

    /// Remove every entry.
    pub fn clear(&mut self) {
        self.inner.clear();
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Returns `true` if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.inner.cap().get()
    }

    /// Get cache statistics.
    pub fn stats(&self) -> BoundedCacheStats {
        let size = self.len();
        let capacity = self.capacity();
        BoundedCacheStats {
            size,
            capacity,
            utilization_percent: size as f64 / capacity as f64 * 100.0,
            is_full: size >= capacity,
            evictions: self.evictions,
        }
    }
}

impl<K, V> BoundedCache<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Remove every entry whose key and value satisfy `predicate`.
    ///
    /// Matching keys are collected before anything is removed. Returns the
    /// number of entries removed.
    pub fn delete_where<F>(&mut self, mut predicate: F) -> usize
    where
        F: FnMut(&K, &V) -> bool,
    {
        let doomed: Vec<K> = self
            .inner
            .iter()
            .filter(|(k, v)| predicate(k, v))
            .map(|(k, _)| k.clone())
            .collect();

        for key in &doomed {
            self.inner.pop(key);
        }
        doomed.len()
    }

    /// Snapshot of keys, least recently used first.
    pub fn keys(&self) -> Vec<K> {
        self.inner.iter().rev().map(|(k, _)| k.clone()).collect()
    }
}

impl<K, V> BoundedCache<K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    /// Snapshot of values, least recently used first.
    pub fn values(&self) -> Vec<V> {
        self.inner.iter().rev().map(|(_, v)| v.clone()).collect()
    }
}

impl<K, V> BoundedCache<K, V>
where
    K: Hash + Eq + Clone,
    V: Clone,
{
    /// Snapshot of entries, least recently used first.
    pub fn entries(&self) -> Vec<(K, V)> {
        self.inner
            .iter()
            .rev()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl<K, V> std::fmt::Debug for BoundedCache<K, V>
where
    K: Hash + Eq,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedCache")
            .field("size", &self.len())
            .field("capacity", &self.capacity())
            .field("evictions", &self.evictions)
            .finish()
    }
}

/// Size statistics for a [`BoundedCache`].
#[derive(Debug, Clone, PartialEq)]
pub struct BoundedCacheStats {
    /// Number of entries.
    pub size: usize,

    /// Maximum number of entries.
    pub capacity: usize,

    /// `size / capacity` as a percentage.
    pub utilization_percent: f64,

    /// Whether the next new key will evict.
    pub is_full: bool,

    /// Entries evicted for capacity since creation.
    pub evictions: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_capacity_is_rejected() {
        let err = BoundedCache::<String, u32>::new(0).unwrap_err();
        assert!(matches!(err, CacheError::Configuration { .. }));
    }

    #[test]
    fn test_touched_key_survives_eviction() {
        let mut cache = BoundedCache::new(2).unwrap();
        cache.set("a", 1);
        cache.set("b", 2);
        assert_eq!(cache.get(&"a"), Some(&1));

        let evicted = cache.set("c", 3);

        assert_eq!(evicted, Some(("b", 2)));
        assert_eq!(cache.keys(), vec!["a", "c"]);
        assert_eq!(cache.stats().evictions, 1);
    }

    #[test]
    fn test_oldest_key_evicted_without_touch() {
        let mut cache = BoundedCache::new(3).unwrap();
        for (i, key) in ["a", "b", "c", "d"].into_iter().enumerate() {
            cache.set(key, i);
        }
        assert!(!cache.has(&"a"));
        assert_eq!(cache.keys(), vec!["b", "c", "d"]);
        assert_eq!(cache.len(), 3);
    }

    #[test]
    fn test_reset_same_key_does_not_evict() {
        let mut cache = BoundedCache::new(2).unwrap();
        cache.set("a", 1);
        cache.set("b", 2);
        assert!(cache.set("b", 20).is_none());
        assert!(cache.set("b", 200).is_none());

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.peek(&"b"), Some(&200));
        assert_eq!(cache.stats().evictions, 0);
    }

    #[test]
    fn test_reset_refreshes_recency() {
        let mut cache = BoundedCache::new(2).unwrap();
        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("a", 10);
        cache.set("c", 3);

        assert!(cache.has(&"a"));
        assert!(!cache.has(&"b"));
    }

    #[test]
    fn test_has_and_peek_do_not_touch() {
        let mut cache = BoundedCache::new(2).unwrap();
        cache.set("a", 1);
        cache.set("b", 2);
        assert!(cache.has(&"a"));
        assert_eq!(cache.peek(&"a"), Some(&1));
        cache.set("c", 3);

        assert!(!cache.has(&"a"));
    }

    #[test]
    fn test_capacity_one() {
        let mut cache = BoundedCache::new(1).unwrap();
        cache.set("a", 1);
        assert_eq!(cache.set("b", 2), Some(("a", 1)));
        assert_eq!(cache.keys(), vec!["b"]);
        assert!(cache.stats().is_full);
    }

    #[test]
    fn test_delete_where_by_prefix() {
        let mut cache = BoundedCache::new(10).unwrap();
        cache.set("tasks:1".to_string(), 1);
        cache.set("tasks:2".to_string(), 2);
        cache.set("documents:1".to_string(), 3);

        let removed = cache.delete_where(|k, _| k.starts_with("tasks:"));

        assert_eq!(removed, 2);
        assert_eq!(cache.keys(), vec!["documents:1".to_string()]);
        assert_eq!(cache.delete_where(|k, _| k.starts_with("tasks:")), 0);
    }

    #[test]
    fn test_delete_where_by_value() {
        let mut cache = BoundedCache::new(4).unwrap();
        for i in 0..4 {
            cache.set(i, i * 10);
        }
        assert_eq!(cache.delete_where(|_, v| *v >= 20), 2);
        assert_eq!(cache.values(), vec![0, 10]);
    }

    #[test]
    fn test_entries_oldest_first() {
        let mut cache = BoundedCache::new(3).unwrap();
        cache.set("a", 1);
        cache.set("b", 2);
        cache.set("c", 3);
        cache.get(&"a");

        assert_eq!(cache.entries(), vec![("b", 2), ("c", 3), ("a", 1)]);
    }

    #[test]
    fn test_delete_and_clear() {
        let mut cache = BoundedCache::new(3).unwrap();
        cache.set("a", 1);
        cache.set("b", 2);
        assert_eq!(cache.delete(&"a"), Some(1));
        assert_eq!(cache.delete(&"a"), None);

        cache.clear();
        assert!(cache.is_empty());
        cache.clear();
        assert_eq!(cache.stats().size, 0);
    }

    #[test]
    fn test_stats() {
        let mut cache = BoundedCache::new(4).unwrap();
        cache.set("a", 1);
        let stats = cache.stats();
        assert_eq!(stats.size, 1);
        assert_eq!(stats.capacity, 4);
        assert!((stats.utilization_percent - 25.0).abs() < f64::EPSILON);
        assert!(!stats.is_full);
    }
}
