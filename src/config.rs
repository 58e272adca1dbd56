//! Cache configuration: per-cache TTL and capacity, per-service settings.
//!
//! A [`CacheConfig`] is validated when it is built, so a misconfigured cache
//! fails at construction instead of misbehaving later. Settings can be loaded
//! from JSON; every field is optional and falls back to the defaults below.
//!
//! ```
//! use commerce_cache::config::CacheSettings;
//! use commerce_cache::strategy::InvalidationPolicy;
//!
//! let settings = CacheSettings::from_json_str(r#"{
//!     "invalidation": "targeted",
//!     "product": { "stock": { "ttl_ms": 30000, "capacity": 500 } }
//! }"#).unwrap();
//!
//! assert_eq!(settings.invalidation, InvalidationPolicy::Targeted);
//! assert_eq!(settings.product.stock.capacity(), 500);
//! // Untouched caches keep their defaults
//! assert_eq!(settings.user.by_id.capacity(), 100);
//! ```
//!
//! # Defaults
//!
//! | Cache | TTL | Capacity |
//! |-------|-----|----------|
//! | `user.by_id` | 10 min | 100 |
//! | `user.by_email` | 5 min | 100 |
//! | `user.all` | 5 min | 1 |
//! | `category.by_id` | 10 min | 100 |
//! | `category.all` | 5 min | 1 |
//! | `product.by_id` | 5 min | 200 |
//! | `product.all` | 3 min | 8 |
//! | `product.search` | 2 min | 50 |
//! | `product.stock` | 1 min | 200 |

use crate::error::{Error, Result};
use crate::strategy::InvalidationPolicy;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// TTL and capacity of one cache.
///
/// `ttl == None` disables expiry; entries then leave only through LRU
/// eviction or explicit invalidation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCacheConfig", into = "RawCacheConfig")]
pub struct CacheConfig {
    ttl: Option<Duration>,
    capacity: usize,
}

impl CacheConfig {
    /// Build a validated config.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` when `capacity` is zero or `ttl` is
    /// `Some(Duration::ZERO)` (use `None` to disable expiry).
    pub fn new(ttl: Option<Duration>, capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(Error::ConfigError(
                "cache capacity must be positive".to_string(),
            ));
        }
        if ttl == Some(Duration::ZERO) {
            return Err(Error::ConfigError(
                "zero TTL is ambiguous, use None to disable expiry".to_string(),
            ));
        }
        Ok(CacheConfig { ttl, capacity })
    }

    /// Build a config from a millisecond TTL (`0` disables expiry) and a
    /// signed capacity.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` for a negative TTL or a capacity `<= 0`.
    pub fn from_millis(ttl_ms: i64, capacity: i64) -> Result<Self> {
        if ttl_ms < 0 {
            return Err(Error::ConfigError(format!(
                "cache TTL must not be negative (got {} ms)",
                ttl_ms
            )));
        }
        if capacity <= 0 {
            return Err(Error::ConfigError(format!(
                "cache capacity must be positive (got {})",
                capacity
            )));
        }
        let capacity = usize::try_from(capacity)
            .map_err(|_| Error::ConfigError(format!("cache capacity {} too large", capacity)))?;
        let ttl = (ttl_ms > 0).then(|| Duration::from_millis(ttl_ms as u64));
        Self::new(ttl, capacity)
    }

    /// Unbounded-in-time cache of the given capacity.
    pub fn no_expiry(capacity: usize) -> Result<Self> {
        Self::new(None, capacity)
    }

    // Built-in defaults only; bypasses validation.
    const fn preset(ttl_secs: u64, capacity: usize) -> Self {
        CacheConfig {
            ttl: Some(Duration::from_secs(ttl_secs)),
            capacity,
        }
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

#[derive(Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
struct RawCacheConfig {
    #[serde(default)]
    ttl_ms: i64,
    capacity: i64,
}

impl TryFrom<RawCacheConfig> for CacheConfig {
    type Error = Error;

    fn try_from(raw: RawCacheConfig) -> Result<Self> {
        CacheConfig::from_millis(raw.ttl_ms, raw.capacity)
    }
}

impl From<CacheConfig> for RawCacheConfig {
    fn from(config: CacheConfig) -> Self {
        RawCacheConfig {
            ttl_ms: config
                .ttl
                .map(|d| i64::try_from(d.as_millis()).unwrap_or(i64::MAX))
                .unwrap_or(0),
            capacity: i64::try_from(config.capacity).unwrap_or(i64::MAX),
        }
    }
}

/// Caches owned by the user service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UserCacheSettings {
    pub by_id: CacheConfig,
    pub by_email: CacheConfig,
    pub all: CacheConfig,
}

impl Default for UserCacheSettings {
    fn default() -> Self {
        UserCacheSettings {
            by_id: CacheConfig::preset(600, 100),
            by_email: CacheConfig::preset(300, 100),
            all: CacheConfig::preset(300, 1),
        }
    }
}

/// Caches owned by the category service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CategoryCacheSettings {
    pub by_id: CacheConfig,
    pub all: CacheConfig,
}

impl Default for CategoryCacheSettings {
    fn default() -> Self {
        CategoryCacheSettings {
            by_id: CacheConfig::preset(600, 100),
            all: CacheConfig::preset(300, 1),
        }
    }
}

/// Caches owned by the product service.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProductCacheSettings {
    pub by_id: CacheConfig,
    /// Holds `ALL` plus one entry per sort order in use.
    pub all: CacheConfig,
    pub search: CacheConfig,
    pub stock: CacheConfig,
}

impl Default for ProductCacheSettings {
    fn default() -> Self {
        ProductCacheSettings {
            by_id: CacheConfig::preset(300, 200),
            all: CacheConfig::preset(180, 8),
            search: CacheConfig::preset(120, 50),
            stock: CacheConfig::preset(60, 200),
        }
    }
}

/// Settings for every cache set in the process.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CacheSettings {
    /// Write-path invalidation granularity shared by all services.
    pub invalidation: InvalidationPolicy,
    pub user: UserCacheSettings,
    pub category: CategoryCacheSettings,
    pub product: ProductCacheSettings,
}

impl CacheSettings {
    /// Parse settings from a JSON document.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` for malformed JSON, unknown fields, a
    /// negative TTL or a non-positive capacity.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let settings = serde_json::from_str(json)?;
        debug!("Loaded cache settings: {:?}", settings);
        Ok(settings)
    }

    /// Read and parse settings from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns `Error::ConfigError` if the file cannot be read or parsed.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&json)
    }

    pub fn with_invalidation(mut self, policy: InvalidationPolicy) -> Self {
        self.invalidation = policy;
        self
    }
}
