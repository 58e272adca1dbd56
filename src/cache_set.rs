//! Per-service cache sets and the cross-service invalidation capability.
//!
//! Every service owns one cache set: a handful of independent
//! [`CacheManager`]s (by id, by natural key, list/search results, derived
//! values). The [`CacheSet`] trait is the part every set shares, so callers
//! can flush, sweep and report any of them the same way.
//!
//! A service whose writes change another service's *derived* values (an
//! inventory change alters a product's total stock) is handed an
//! [`InvalidationSink`] at construction time and calls it after each
//! successful write. The sink removes exactly one derived entry and nothing
//! else.

use crate::manager::CacheManager;
use crate::observability::CacheReport;
use std::fmt::Debug;
use std::hash::Hash;

/// Operations shared by every service's cache set.
pub trait CacheSet: Send + Sync {
    /// Clear every manager in the set, plus any side index.
    fn invalidate_all(&self);

    /// Drop expired entries from every manager. Returns the total removed.
    fn sweep(&self) -> usize;

    /// Entry counts (and extras such as active sessions) for the set.
    fn report(&self) -> CacheReport;
}

/// Narrow invalidation of one derived entry owned by another service.
pub trait InvalidationSink<K>: Send + Sync {
    fn invalidate_derived(&self, key: &K);
}

impl<K, V> InvalidationSink<K> for CacheManager<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync,
    V: Clone + Send + Sync,
{
    fn invalidate_derived(&self, key: &K) {
        self.invalidate(key);
    }
}
