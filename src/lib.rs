//! # commerce-cache
//!
//! In-memory caching for a small commerce back end: users, categories,
//! products and inventory.
//!
//! ## Features
//!
//! - **TTL + LRU:** [`CacheManager`] is a bounded keyed cache with optional
//!   expiry and least-recently-used eviction
//! - **Compute on miss:** reads take an async closure that calls persistence
//!   only when the cache has nothing live
//! - **Per-service cache sets:** each service owns its caches; nothing lives in
//!   a process-wide static
//! - **Sessions:** logged-in users are served from a [`SessionCache`] that never
//!   expires
//! - **Selective invalidation:** inventory writes drop exactly one product's
//!   cached stock through an [`InvalidationSink`]
//! - **Configurable:** TTLs, capacities and the write-invalidation policy load
//!   from JSON via [`CacheSettings`]
//!
//! ## Quick Start
//!
//! ```
//! use commerce_cache::{CacheConfig, CacheManager};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> commerce_cache::Result<()> {
//! let cache: CacheManager<i64, Option<String>> = CacheManager::new(
//!     "Name Cache",
//!     CacheConfig::new(Some(Duration::from_secs(60)), 100)?,
//! );
//!
//! // Computed once, then served from cache until it expires.
//! let name = cache.get(7, || async { Ok(Some("Ada".to_string())) }).await?;
//! assert_eq!(name.as_deref(), Some("Ada"));
//! assert_eq!(cache.size(), 1);
//! # Ok(())
//! # }
//! ```
//!
//! ## Services
//!
//! ```ignore
//! use commerce_cache::{CacheSettings, Services};
//!
//! let settings = CacheSettings::from_json_file("cache.json")?;
//! let services = Services::new(Arc::new(my_repository), my_hasher, &settings);
//!
//! let user = services.users.login("ada@example.com", "secret").await?;
//! services.inventory.adjust_inventory(product_id, "north", -1).await?;
//! let stock = services.products.get_total_stock(product_id).await?; // recomputed
//!
//! println!("{}", services.cache_stats());
//! ```

#[macro_use]
extern crate log;

pub mod cache_set;
pub mod config;
pub mod entity;
pub mod entry;
pub mod error;
pub mod key;
pub mod manager;
pub mod observability;
pub mod repository;
pub mod service;
pub mod session;
pub mod strategy;

// Re-exports for convenience
pub use cache_set::{CacheSet, InvalidationSink};
pub use config::{CacheConfig, CacheSettings};
pub use error::{Error, Result};
pub use manager::CacheManager;
pub use observability::{CacheReport, CacheStats};
pub use service::{CategoryService, InventoryService, ProductService, Services, UserService};
pub use session::SessionCache;
pub use strategy::InvalidationPolicy;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
