//! Cache entry with creation and last-access bookkeeping.

use std::time::Duration;
use tokio::time::Instant;

/// A cached value plus the timestamps the manager needs for TTL and LRU.
///
/// The value is immutable once inserted. `last_access_at` and
/// `last_access_seq` move forward on every hit; `last_access_seq` is a
/// per-manager counter and is what LRU eviction compares, so two accesses
/// within the same clock tick still have a strict order.
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    value: V,
    created_at: Instant,
    last_access_at: Instant,
    last_access_seq: u64,
}

impl<V> CacheEntry<V> {
    /// Create an entry created (and last accessed) at `now`.
    pub fn new(value: V, now: Instant, seq: u64) -> Self {
        CacheEntry {
            value,
            created_at: now,
            last_access_at: now,
            last_access_seq: seq,
        }
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn last_access_at(&self) -> Instant {
        self.last_access_at
    }

    pub fn last_access_seq(&self) -> u64 {
        self.last_access_seq
    }

    /// Age of the entry relative to `now`.
    pub fn age(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.created_at)
    }

    /// An entry is live when TTL is disabled or its age does not exceed TTL.
    ///
    /// An entry aged exactly `ttl` is still live.
    pub fn is_live(&self, ttl: Option<Duration>, now: Instant) -> bool {
        match ttl {
            None => true,
            Some(ttl) => self.age(now) <= ttl,
        }
    }

    /// Record an access.
    pub fn touch(&mut self, now: Instant, seq: u64) {
        // Clock may not go backwards relative to creation.
        self.last_access_at = now.max(self.created_at);
        self.last_access_seq = seq;
    }
}
