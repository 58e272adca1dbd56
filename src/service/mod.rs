//! Domain services and the registry that wires them together.
//!
//! Each service owns its cache set outright; nothing is shared through
//! statics. The only link between sets is the product stock sink handed to
//! the inventory service when [`Services`] is built.

pub mod category;
pub mod inventory;
pub mod product;
pub mod user;

pub use category::CategoryService;
pub use inventory::InventoryService;
pub use product::ProductService;
pub use user::UserService;

use crate::config::CacheSettings;
use crate::entity::Entity;
use crate::error::{Error, Result};
use crate::observability::CacheReport;
use crate::repository::{
    CategoryRepository, InventoryRepository, PasswordHasher, ProductRepository, UserRepository,
};
use std::sync::Arc;

pub(crate) fn check_id<E: Entity>(id: i64) -> Result<()> {
    if id <= 0 {
        return Err(Error::InvalidArgument(format!(
            "{} ID must be positive, got {}",
            E::NAME,
            id
        )));
    }
    Ok(())
}

/// All four services over one repository.
///
/// # Example
///
/// ```
/// use commerce_cache::repository::{InMemoryRepository, PlaintextHasher};
/// use commerce_cache::{CacheSettings, Services};
/// use std::sync::Arc;
///
/// let services = Services::new(
///     Arc::new(InMemoryRepository::new()),
///     PlaintextHasher,
///     &CacheSettings::default(),
/// );
/// assert_eq!(services.cache_stats().total_entries(), 0);
/// ```
pub struct Services<R, H> {
    pub users: UserService<R, H>,
    pub categories: CategoryService<R>,
    pub products: ProductService<R>,
    pub inventory: InventoryService<R>,
}

impl<R, H> Services<R, H>
where
    R: UserRepository + CategoryRepository + ProductRepository + InventoryRepository,
    H: PasswordHasher,
{
    pub fn new(repository: Arc<R>, hasher: H, settings: &CacheSettings) -> Self {
        let products = ProductService::new(Arc::clone(&repository), settings);
        let inventory =
            InventoryService::new(Arc::clone(&repository), Some(products.stock_invalidator()));

        info!(
            "Cache services ready (invalidation: {})",
            settings.invalidation
        );
        Services {
            users: UserService::new(Arc::clone(&repository), hasher, settings),
            categories: CategoryService::new(repository, settings),
            products,
            inventory,
        }
    }

    /// Flush every cache set. Sessions survive.
    pub fn invalidate_all_caches(&self) {
        self.users.invalidate_all_caches();
        self.categories.invalidate_all_caches();
        self.products.invalidate_all_caches();
    }

    /// Sweep every cache set. Returns the total number of expired entries removed.
    pub fn sweep_caches(&self) -> usize {
        let removed =
            self.users.sweep_caches() + self.categories.sweep_caches() + self.products.sweep_caches();
        if removed > 0 {
            debug!("✓ Swept {} expired entries", removed);
        }
        removed
    }

    /// One report covering every service.
    pub fn cache_stats(&self) -> CacheReport {
        self.users
            .cache_stats()
            .merge(self.categories.cache_stats())
            .merge(self.products.cache_stats())
    }
}
