//! Bounded, optionally time-limited keyed cache with compute-on-miss.
//!
//! Uses DashMap for concurrent access with per-key sharding, the same store
//! the in-memory backend is built on. Expiry is lazy: an entry past its TTL is
//! treated as absent (and dropped) the next time it is read; [`CacheManager::sweep`]
//! is available for callers that want to reclaim memory eagerly.
//!
//! # Eviction
//!
//! When a put would grow the cache past its capacity, the entry with the
//! oldest access is evicted first. Finding it is an O(n) scan, fine for the
//! tens-to-hundreds of entries a service cache holds.
//!
//! The scan and the removal are two separate steps. Under concurrent writers
//! two puts can pick the same victim, so the cache may end up one entry over
//! capacity per racing writer, or evict an entry that was touched in between.
//! The cache is a performance layer, not a system of record, and this is
//! accepted.
//!
//! # Compute on miss
//!
//! [`CacheManager::get`] awaits the supplied future without holding any shard
//! lock. Concurrent misses on the same key are not coalesced: each caller runs
//! its own compute and the last put wins, so computes must be safe to repeat.

use crate::config::CacheConfig;
use crate::entry::CacheEntry;
use crate::error::Result;
use crate::observability::{CacheMetrics, CacheStats, NoOpMetrics};
use dashmap::DashMap;
use std::fmt::Debug;
use std::future::Future;
use std::hash::Hash;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Default)]
struct Counters {
    seq: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
    expirations: AtomicU64,
}

enum Lookup<V> {
    Hit(V),
    Expired,
    Absent,
}

/// Thread-safe TTL + LRU cache.
///
/// Cloning is cheap and shares the underlying store, which is how a service
/// hands one of its caches to an [`InvalidationSink`](crate::cache_set::InvalidationSink).
///
/// # Example
///
/// ```
/// use commerce_cache::{CacheConfig, CacheManager};
///
/// let cache: CacheManager<&str, u32> =
///     CacheManager::new("Demo Cache", CacheConfig::no_expiry(2).unwrap());
///
/// cache.put("a", 1);
/// cache.put("b", 2);
/// assert_eq!(cache.get_if_present(&"a"), Some(1)); // "a" is now most recent
/// cache.put("c", 3);                               // evicts "b"
///
/// assert_eq!(cache.get_if_present(&"b"), None);
/// assert_eq!(cache.size(), 2);
/// ```
pub struct CacheManager<K, V> {
    name: Arc<str>,
    config: CacheConfig,
    store: Arc<DashMap<K, CacheEntry<V>>>,
    counters: Arc<Counters>,
    metrics: Arc<dyn CacheMetrics>,
}

impl<K, V> Clone for CacheManager<K, V> {
    fn clone(&self) -> Self {
        CacheManager {
            name: Arc::clone(&self.name),
            config: self.config,
            store: Arc::clone(&self.store),
            counters: Arc::clone(&self.counters),
            metrics: Arc::clone(&self.metrics),
        }
    }
}

impl<K, V> CacheManager<K, V>
where
    K: Eq + Hash + Clone + Debug,
    V: Clone,
{
    /// Create an empty cache. `config` is already validated.
    pub fn new(name: impl Into<String>, config: CacheConfig) -> Self {
        CacheManager {
            name: Arc::from(name.into()),
            config,
            store: Arc::new(DashMap::with_capacity(config.capacity())),
            counters: Arc::new(Counters::default()),
            metrics: Arc::new(NoOpMetrics),
        }
    }

    /// Set custom metrics handler.
    pub fn with_metrics(mut self, metrics: Arc<dyn CacheMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn config(&self) -> CacheConfig {
        self.config
    }

    /// Return the live value for `key`, computing and storing it on a miss.
    ///
    /// A hit refreshes the entry's last access. On a miss `compute` is awaited
    /// once and its value stored before being returned. `None`-like values are
    /// stored like any other, so `V = Option<T>` gives negative caching.
    ///
    /// # Errors
    ///
    /// Returns whatever `compute` returns, unmodified. Nothing is cached in
    /// that case.
    pub async fn get<F, Fut>(&self, key: K, compute: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        if let Some(value) = self.lookup(&key) {
            return Ok(value);
        }

        let started = Instant::now();
        let value = match compute().await {
            Ok(value) => value,
            Err(e) => {
                debug!("✗ {} compute for {:?} failed: {}", self.name, key, e);
                return Err(e);
            }
        };
        self.insert(key, value.clone(), Some(started.elapsed()));
        Ok(value)
    }

    /// Return the live value for `key` without ever computing.
    pub fn get_if_present(&self, key: &K) -> Option<V> {
        self.lookup(key)
    }

    /// True if a live entry exists. Does not count as an access.
    pub fn contains(&self, key: &K) -> bool {
        let now = Instant::now();
        self.store
            .get(key)
            .is_some_and(|entry| entry.is_live(self.config.ttl(), now))
    }

    /// Insert or overwrite `key`, evicting the least recently used entry
    /// first if the cache is full and `key` is new.
    pub fn put(&self, key: K, value: V) {
        self.insert(key, value, None);
    }

    /// Remove `key`. No-op if absent.
    pub fn invalidate(&self, key: &K) {
        if self.store.remove(key).is_some() {
            debug!("✓ {} INVALIDATE {:?}", self.name, key);
            self.metrics.record_invalidation(&self.name, 1);
        }
    }

    /// Remove every entry.
    pub fn invalidate_all(&self) {
        let count = self.store.len();
        self.store.clear();
        debug!("✓ {} INVALIDATE_ALL ({} entries)", self.name, count);
        self.metrics.record_invalidation(&self.name, count);
    }

    /// Number of entries, including expired ones nobody has read or swept.
    pub fn size(&self) -> usize {
        self.store.len()
    }

    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// Remove expired entries and return how many were removed.
    pub fn sweep(&self) -> usize {
        let Some(ttl) = self.config.ttl() else {
            return 0;
        };
        let now = Instant::now();
        let mut removed = 0;
        self.store.retain(|_, entry| {
            let live = entry.is_live(Some(ttl), now);
            if !live {
                removed += 1;
            }
            live
        });
        if removed > 0 {
            self.counters
                .expirations
                .fetch_add(removed as u64, Ordering::Relaxed);
            debug!("✓ {} SWEEP removed {} expired entries", self.name, removed);
        }
        removed
    }

    /// Snapshot of size, configuration and counters.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            name: self.name.to_string(),
            entries: self.store.len(),
            capacity: self.config.capacity(),
            ttl: self.config.ttl(),
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
            expirations: self.counters.expirations.load(Ordering::Relaxed),
        }
    }

    fn next_seq(&self) -> u64 {
        self.counters.seq.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn lookup(&self, key: &K) -> Option<V> {
        let now = Instant::now();
        let ttl = self.config.ttl();

        let outcome = match self.store.get_mut(key) {
            Some(mut guard) => {
                let entry = guard.value_mut();
                if entry.is_live(ttl, now) {
                    entry.touch(now, self.next_seq());
                    Lookup::Hit(entry.value().clone())
                } else {
                    Lookup::Expired
                }
            }
            None => Lookup::Absent,
        };

        match outcome {
            Lookup::Hit(value) => {
                self.counters.hits.fetch_add(1, Ordering::Relaxed);
                self.metrics.record_hit(&self.name);
                debug!("✓ {} GET {:?} -> HIT", self.name, key);
                return Some(value);
            }
            Lookup::Expired => {
                // Leave it alone if a concurrent put already replaced it.
                if self
                    .store
                    .remove_if(key, |_, entry| !entry.is_live(ttl, now))
                    .is_some()
                {
                    self.counters.expirations.fetch_add(1, Ordering::Relaxed);
                }
            }
            Lookup::Absent => {}
        }

        self.counters.misses.fetch_add(1, Ordering::Relaxed);
        self.metrics.record_miss(&self.name);
        debug!("✓ {} GET {:?} -> MISS", self.name, key);
        None
    }

    fn insert(&self, key: K, value: V, compute: Option<Duration>) {
        if self.store.len() >= self.config.capacity() && !self.store.contains_key(&key) {
            self.evict_lru();
        }

        debug!("✓ {} SET {:?}", self.name, key);
        let entry = CacheEntry::new(value, Instant::now(), self.next_seq());
        self.store.insert(key, entry);
        self.metrics.record_put(&self.name, compute);
    }

    fn evict_lru(&self) {
        let oldest = self
            .store
            .iter()
            .min_by_key(|item| item.value().last_access_seq())
            .map(|item| (item.key().clone(), item.value().last_access_seq()));

        // Only remove the victim if nobody touched it since the scan.
        if let Some((key, seq)) = oldest {
            if self
                .store
                .remove_if(&key, |_, entry| entry.last_access_seq() == seq)
                .is_some()
            {
                self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                self.metrics.record_eviction(&self.name);
                debug!("✓ {} EVICT {:?} (LRU)", self.name, key);
            }
        }
    }
}
