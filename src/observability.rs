//! Observability for cache sets: metrics hooks, stats snapshots and reports.
//!
//! # Module Overview
//!
//! - **Metrics (`CacheMetrics`)**: hooks called on every hit, miss, put,
//!   eviction and invalidation, for wiring into a monitoring system
//! - **Stats (`CacheStats`)**: point-in-time snapshot of one cache (size,
//!   capacity, TTL, hit/miss/eviction counters)
//! - **Reports (`CacheReport`)**: the per-service summary returned by
//!   `cache_stats()`, printable as a single line
//!
//! # Metrics
//!
//! ```ignore
//! use commerce_cache::observability::CacheMetrics;
//!
//! struct PrometheusMetrics;
//!
//! impl CacheMetrics for PrometheusMetrics {
//!     fn record_hit(&self, cache: &str) {
//!         // counter!("cache_hits", "cache" => cache).inc();
//!     }
//!     // ... other methods default to debug logging
//! }
//!
//! // let cache = CacheManager::new("Product Cache", config)
//! //     .with_metrics(Arc::new(PrometheusMetrics));
//! ```
//!
//! Managers default to `NoOpMetrics`. Size counts include entries that have
//! expired but have not been read or swept yet; they are for observability
//! only.

use std::fmt;
use std::time::Duration;

/// Trait for cache metrics collection.
pub trait CacheMetrics: Send + Sync {
    /// Record a cache hit.
    fn record_hit(&self, cache: &str) {
        debug!("Cache HIT: {}", cache);
    }

    /// Record a cache miss (absent or expired entry).
    fn record_miss(&self, cache: &str) {
        debug!("Cache MISS: {}", cache);
    }

    /// Record a cache put and how long the compute took, if there was one.
    fn record_put(&self, cache: &str, compute: Option<Duration>) {
        debug!("Cache PUT: {} (compute {:?})", cache, compute);
    }

    /// Record an LRU eviction.
    fn record_eviction(&self, cache: &str) {
        debug!("Cache EVICT: {}", cache);
    }

    /// Record an invalidation of `count` entries.
    fn record_invalidation(&self, cache: &str, count: usize) {
        debug!("Cache INVALIDATE: {} ({} entries)", cache, count);
    }
}

/// Default metrics implementation (no-op).
#[derive(Clone, Debug, Default)]
pub struct NoOpMetrics;

impl CacheMetrics for NoOpMetrics {
    fn record_hit(&self, _cache: &str) {}
    fn record_miss(&self, _cache: &str) {}
    fn record_put(&self, _cache: &str, _compute: Option<Duration>) {}
    fn record_eviction(&self, _cache: &str) {}
    fn record_invalidation(&self, _cache: &str, _count: usize) {}
}

/// Snapshot of one cache.
#[derive(Clone, Debug, PartialEq)]
pub struct CacheStats {
    pub name: String,
    /// Entry count, including expired-but-unswept entries.
    pub entries: usize,
    pub capacity: usize,
    pub ttl: Option<Duration>,
    pub hits: u64,
    pub misses: u64,
    pub evictions: u64,
    pub expirations: u64,
}

impl CacheStats {
    /// Hit rate in `0.0..=1.0`. Returns 0.0 if nothing was looked up yet.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Per-service cache summary.
///
/// Renders as `"<name>: <n> entries"` per cache followed by any extra
/// counters (`"Active Sessions: 2 users"`), comma separated.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CacheReport {
    pub caches: Vec<CacheStats>,
    pub extras: Vec<ReportExtra>,
}

/// Non-cache counter shown in a report (sessions, side indexes).
#[derive(Clone, Debug, PartialEq)]
pub struct ReportExtra {
    pub label: String,
    pub count: usize,
    pub unit: &'static str,
}

impl CacheReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_cache(mut self, stats: CacheStats) -> Self {
        self.caches.push(stats);
        self
    }

    pub fn with_extra(mut self, label: impl Into<String>, count: usize, unit: &'static str) -> Self {
        self.extras.push(ReportExtra {
            label: label.into(),
            count,
            unit,
        });
        self
    }

    /// Append another report's caches and extras.
    pub fn merge(mut self, other: CacheReport) -> Self {
        self.caches.extend(other.caches);
        self.extras.extend(other.extras);
        self
    }

    /// Look up a cache by name.
    pub fn cache(&self, name: &str) -> Option<&CacheStats> {
        self.caches.iter().find(|s| s.name == name)
    }

    /// Sum of entries over every cache in the report.
    pub fn total_entries(&self) -> usize {
        self.caches.iter().map(|s| s.entries).sum()
    }

    /// Print the report to the debug log.
    pub fn log(&self) {
        debug!("Cache Stats: {}", self);
    }
}

impl fmt::Display for CacheReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for stats in &self.caches {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{}: {} entries", stats.name, stats.entries)?;
            first = false;
        }
        for extra in &self.extras {
            if !first {
                write!(f, ", ")?;
            }
            write!(f, "{}: {} {}", extra.label, extra.count, extra.unit)?;
            first = false;
        }
        Ok(())
    }
}
