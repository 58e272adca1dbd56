//! Write-path invalidation policies.
//!
//! Every service write (create, update, delete) commits to persistence first and
//! then invalidates its own cache set. How much it invalidates is a policy:
//!
//! ```
//! use commerce_cache::strategy::InvalidationPolicy;
//!
//! // 1. Coarse - clear every cache in the set (default)
//! let _p = InvalidationPolicy::Coarse;
//!
//! // 2. Targeted - remove only the keys the write can affect
//! let _p = InvalidationPolicy::Targeted;
//! ```
//!
//! # When to Use Each Policy
//!
//! | Policy | By-id caches | Natural-key caches | List / search caches | Derived caches |
//! |--------|--------------|--------------------|----------------------|----------------|
//! | **Coarse** | Cleared | Cleared | Cleared | Cleared |
//! | **Targeted** | Touched id only | Old and new key only | Cleared | Deleted ids only |
//!
//! # Trade-offs
//!
//! - **Coarse** (default): Cannot leave a stale entry behind. Over-invalidates,
//!   so a write-heavy workload degrades towards uncached reads.
//! - **Targeted**: Keeps unrelated entries warm. List and search results still
//!   have to go because they cannot be keyed by record.
//!
//! The one fine-grained path that exists regardless of policy is the derived
//! stock cache, invalidated per product through an
//! [`InvalidationSink`](crate::cache_set::InvalidationSink).

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Granularity of write-path invalidation inside one cache set.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InvalidationPolicy {
    /// **Coarse**: `invalidate_all` on every cache in the set.
    ///
    /// Flow:
    /// 1. Persistence call succeeds
    /// 2. Every manager in the set is cleared
    /// 3. Any natural-key side index is cleared
    #[default]
    Coarse,

    /// **Targeted**: remove only the entries a write can affect.
    ///
    /// Flow:
    /// 1. Persistence call succeeds
    /// 2. By-id entry for the touched record removed
    /// 3. Natural-key entries for the old and new key removed
    /// 4. List and search caches cleared
    Targeted,
}

impl InvalidationPolicy {
    pub fn is_coarse(&self) -> bool {
        matches!(self, InvalidationPolicy::Coarse)
    }
}

impl std::fmt::Display for InvalidationPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InvalidationPolicy::Coarse => write!(f, "coarse"),
            InvalidationPolicy::Targeted => write!(f, "targeted"),
        }
    }
}

impl FromStr for InvalidationPolicy {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "coarse" => Ok(InvalidationPolicy::Coarse),
            "targeted" => Ok(InvalidationPolicy::Targeted),
            other => Err(crate::error::Error::ConfigError(format!(
                "unknown invalidation policy '{}'",
                other
            ))),
        }
    }
}
