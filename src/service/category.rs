//! Category service.
//!
//! Name lookups go through the cached `ALL` listing, which carries a name
//! index built from the same rows. Both live in one cache entry, so the index
//! never outlives the listing it was built from.

use super::check_id;
use crate::cache_set::CacheSet;
use crate::config::{CacheSettings, CategoryCacheSettings};
use crate::entity::{Category, CategoryPatch, Entity, NewCategory};
use crate::error::{Error, Result};
use crate::key::CacheKeyBuilder;
use crate::manager::CacheManager;
use crate::observability::CacheReport;
use crate::repository::CategoryRepository;
use crate::strategy::InvalidationPolicy;
use std::collections::HashMap;
use std::sync::Arc;

/// One full listing and its name index.
#[derive(Debug)]
struct CategoryListing {
    categories: Vec<Category>,
    /// Normalized name -> position in `categories`. First row wins on a clash.
    by_name: HashMap<String, usize>,
}

impl CategoryListing {
    fn new(categories: Vec<Category>) -> Self {
        let mut by_name = HashMap::with_capacity(categories.len());
        for (pos, category) in categories.iter().enumerate() {
            by_name
                .entry(CacheKeyBuilder::normalize(&category.name))
                .or_insert(pos);
        }
        CategoryListing {
            categories,
            by_name,
        }
    }

    fn find(&self, name: &str) -> Option<&Category> {
        self.by_name
            .get(&CacheKeyBuilder::normalize(name))
            .map(|&pos| &self.categories[pos])
    }
}

pub struct CategoryCaches {
    by_id: CacheManager<i64, Option<Category>>,
    all: CacheManager<String, Arc<CategoryListing>>,
}

impl CategoryCaches {
    pub fn new(settings: &CategoryCacheSettings) -> Self {
        CategoryCaches {
            by_id: CacheManager::new("Category Cache", settings.by_id),
            all: CacheManager::new("All Categories Cache", settings.all),
        }
    }
}

impl CacheSet for CategoryCaches {
    fn invalidate_all(&self) {
        self.by_id.invalidate_all();
        self.all.invalidate_all();
    }

    fn sweep(&self) -> usize {
        self.by_id.sweep() + self.all.sweep()
    }

    fn report(&self) -> CacheReport {
        CacheReport::new()
            .with_cache(self.by_id.stats())
            .with_cache(self.all.stats())
    }
}

pub struct CategoryService<R> {
    repository: Arc<R>,
    caches: CategoryCaches,
    policy: InvalidationPolicy,
}

impl<R: CategoryRepository> CategoryService<R> {
    pub fn new(repository: Arc<R>, settings: &CacheSettings) -> Self {
        CategoryService {
            repository,
            caches: CategoryCaches::new(&settings.category),
            policy: settings.invalidation,
        }
    }

    /// # Errors
    ///
    /// - `Error::InvalidArgument` for a blank name
    /// - `Error::RepositoryError` if persistence fails
    pub async fn create_category(&self, category: NewCategory) -> Result<Category> {
        let name = category.name.trim().to_string();
        if name.is_empty() {
            return Err(Error::InvalidArgument(
                "Category name cannot be empty".to_string(),
            ));
        }

        let created = self
            .repository
            .create_category(NewCategory { name, ..category })
            .await?;
        self.invalidate_after_write(created.id);
        info!("Created category {} ({})", created.id, created.name);
        Ok(created)
    }

    /// # Errors
    ///
    /// - `Error::InvalidArgument` for a non-positive id
    /// - `Error::NotFound` if the category does not exist
    /// - `Error::RepositoryError` if persistence fails
    pub async fn get_category_by_id(&self, id: i64) -> Result<Category> {
        check_id::<Category>(id)?;
        self.caches
            .by_id
            .get(id, || self.repository.fetch_category(id))
            .await?
            .ok_or_else(|| Error::not_found(Category::NAME, id))
    }

    /// # Errors
    ///
    /// Returns `Error::RepositoryError` if persistence fails
    pub async fn get_all_categories(&self) -> Result<Vec<Category>> {
        Ok(self.listing().await?.categories.clone())
    }

    /// # Errors
    ///
    /// - `Error::InvalidArgument` for a non-positive id or a blank new name
    /// - `Error::NotFound` if the category does not exist
    /// - `Error::RepositoryError` if persistence fails
    pub async fn update_category(&self, id: i64, patch: CategoryPatch) -> Result<Category> {
        check_id::<Category>(id)?;
        let mut category = self
            .repository
            .fetch_category(id)
            .await?
            .ok_or_else(|| Error::not_found(Category::NAME, id))?;

        if let Some(name) = patch.name {
            let name = name.trim().to_string();
            if name.is_empty() {
                return Err(Error::InvalidArgument(
                    "Category name cannot be empty".to_string(),
                ));
            }
            category.name = name;
        }
        if let Some(description) = patch.description {
            category.description = Some(description);
        }

        let saved = self.repository.save_category(&category).await?;
        self.invalidate_after_write(id);
        info!("Updated category {}", id);
        Ok(saved)
    }

    /// # Errors
    ///
    /// - `Error::InvalidArgument` for a non-positive id
    /// - `Error::NotFound` if the category does not exist
    /// - `Error::RepositoryError` if persistence fails
    pub async fn delete_category(&self, id: i64) -> Result<()> {
        check_id::<Category>(id)?;
        if !self.repository.remove_category(id).await? {
            return Err(Error::not_found(Category::NAME, id));
        }
        self.invalidate_after_write(id);
        info!("Deleted category {}", id);
        Ok(())
    }

    /// Uncached existence check.
    ///
    /// # Errors
    ///
    /// Returns `Error::RepositoryError` if persistence fails
    pub async fn category_exists(&self, id: i64) -> Result<bool> {
        self.repository.category_exists(id).await
    }

    /// Case-insensitive lookup in the cached `ALL` listing.
    ///
    /// # Errors
    ///
    /// - `Error::NotFound` if no category has this name
    /// - `Error::RepositoryError` if persistence fails
    pub async fn get_category_by_name(&self, name: &str) -> Result<Category> {
        self.listing()
            .await?
            .find(name)
            .cloned()
            .ok_or_else(|| Error::not_found(Category::NAME, name.trim()))
    }

    pub fn invalidate_all_caches(&self) {
        warn!("Flushing all category caches");
        self.caches.invalidate_all();
    }

    pub fn sweep_caches(&self) -> usize {
        self.caches.sweep()
    }

    pub fn cache_stats(&self) -> CacheReport {
        let report = self.caches.report();
        report.log();
        report
    }

    async fn listing(&self) -> Result<Arc<CategoryListing>> {
        self.caches
            .all
            .get(CacheKeyBuilder::all(), || async {
                let categories = self.repository.fetch_all_categories().await?;
                Ok(Arc::new(CategoryListing::new(categories)))
            })
            .await
    }

    fn invalidate_after_write(&self, id: i64) {
        match self.policy {
            InvalidationPolicy::Coarse => self.caches.invalidate_all(),
            InvalidationPolicy::Targeted => {
                self.caches.by_id.invalidate(&id);
                self.caches.all.invalidate_all();
            }
        }
    }
}
