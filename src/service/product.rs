//! Product service.
//!
//! | cache | key | value |
//! |---|---|---|
//! | Product Cache | product id | `Option<Product>` |
//! | All Products Cache | `ALL`, `ALL_SORTED_<sort>` | `Vec<Product>` |
//! | Search Cache | `SEARCH_<term>`, `SEARCH_CAT_<category>_<term>` | `Vec<Product>` |
//! | Stock Cache | product id | total quantity over all warehouses |
//!
//! Stock is derived from inventory rows this service never writes. The
//! inventory service invalidates it through [`ProductService::stock_invalidator`].

use super::check_id;
use crate::cache_set::{CacheSet, InvalidationSink};
use crate::config::{CacheSettings, ProductCacheSettings};
use crate::entity::{Category, Entity, NewProduct, Product, ProductPatch, ProductSort};
use crate::error::{Error, Result};
use crate::key::CacheKeyBuilder;
use crate::manager::CacheManager;
use crate::observability::CacheReport;
use crate::repository::{CategoryRepository, ProductRepository};
use crate::strategy::InvalidationPolicy;
use futures::future::try_join_all;
use std::sync::Arc;

pub struct ProductCaches {
    products: CacheManager<i64, Option<Product>>,
    all: CacheManager<String, Vec<Product>>,
    search: CacheManager<String, Vec<Product>>,
    stock: CacheManager<i64, i64>,
}

impl ProductCaches {
    pub fn new(settings: &ProductCacheSettings) -> Self {
        ProductCaches {
            products: CacheManager::new("Product Cache", settings.by_id),
            all: CacheManager::new("All Products Cache", settings.all),
            search: CacheManager::new("Search Cache", settings.search),
            stock: CacheManager::new("Stock Cache", settings.stock),
        }
    }
}

impl CacheSet for ProductCaches {
    fn invalidate_all(&self) {
        self.products.invalidate_all();
        self.all.invalidate_all();
        self.search.invalidate_all();
        self.stock.invalidate_all();
    }

    fn sweep(&self) -> usize {
        self.products.sweep() + self.all.sweep() + self.search.sweep() + self.stock.sweep()
    }

    fn report(&self) -> CacheReport {
        CacheReport::new()
            .with_cache(self.products.stats())
            .with_cache(self.all.stats())
            .with_cache(self.search.stats())
            .with_cache(self.stock.stats())
    }
}

pub struct ProductService<R> {
    repository: Arc<R>,
    caches: ProductCaches,
    policy: InvalidationPolicy,
}

impl<R> ProductService<R>
where
    R: ProductRepository + CategoryRepository,
{
    pub fn new(repository: Arc<R>, settings: &CacheSettings) -> Self {
        ProductService {
            repository,
            caches: ProductCaches::new(&settings.product),
            policy: settings.invalidation,
        }
    }

    /// # Errors
    ///
    /// - `Error::InvalidArgument` for a blank name, a negative price or a
    ///   missing category
    /// - `Error::RepositoryError` if persistence fails
    pub async fn create_product(&self, product: NewProduct) -> Result<Product> {
        let name = Self::check_name(&product.name)?;
        Self::check_price(product.price_cents)?;
        self.check_category(product.category_id).await?;

        let created = self
            .repository
            .create_product(NewProduct { name, ..product })
            .await?;
        self.invalidate_after_write(created.id, false);
        info!("Created product {} ({})", created.id, created.name);
        Ok(created)
    }

    /// # Errors
    ///
    /// - `Error::InvalidArgument` for a non-positive id, a blank name, a
    ///   negative price or a missing category
    /// - `Error::NotFound` if the product does not exist
    /// - `Error::RepositoryError` if persistence fails
    pub async fn update_product(&self, id: i64, patch: ProductPatch) -> Result<Product> {
        check_id::<Product>(id)?;
        let mut product = self
            .repository
            .fetch_product(id)
            .await?
            .ok_or_else(|| Error::not_found(Product::NAME, id))?;

        if let Some(name) = patch.name {
            product.name = Self::check_name(&name)?;
        }
        if let Some(description) = patch.description {
            product.description = Some(description);
        }
        if let Some(price_cents) = patch.price_cents {
            Self::check_price(price_cents)?;
            product.price_cents = price_cents;
        }
        if let Some(category_id) = patch.category_id {
            if category_id != product.category_id {
                self.check_category(category_id).await?;
            }
            product.category_id = category_id;
        }

        let saved = self.repository.save_product(&product).await?;
        self.invalidate_after_write(id, false);
        info!("Updated product {}", id);
        Ok(saved)
    }

    /// # Errors
    ///
    /// - `Error::InvalidArgument` for a non-positive id
    /// - `Error::NotFound` if the product does not exist
    /// - `Error::RepositoryError` if persistence fails
    pub async fn delete_product(&self, id: i64) -> Result<()> {
        check_id::<Product>(id)?;
        if !self.repository.remove_product(id).await? {
            return Err(Error::not_found(Product::NAME, id));
        }
        self.invalidate_after_write(id, true);
        info!("Deleted product {}", id);
        Ok(())
    }

    /// # Errors
    ///
    /// - `Error::InvalidArgument` for a non-positive id
    /// - `Error::NotFound` if the product does not exist
    /// - `Error::RepositoryError` if persistence fails
    pub async fn get_product_by_id(&self, id: i64) -> Result<Product> {
        check_id::<Product>(id)?;
        self.caches
            .products
            .get(id, || self.repository.fetch_product(id))
            .await?
            .ok_or_else(|| Error::not_found(Product::NAME, id))
    }

    /// Look up several products concurrently, in the order given.
    /// Unknown ids are skipped.
    ///
    /// # Errors
    ///
    /// Returns the first non-`NotFound` error of any lookup.
    pub async fn get_products_by_ids(&self, ids: &[i64]) -> Result<Vec<Product>> {
        let lookups = ids.iter().map(|&id| async move {
            match self.get_product_by_id(id).await {
                Ok(product) => Ok(Some(product)),
                Err(e) if e.is_not_found() => Ok(None),
                Err(e) => Err(e),
            }
        });
        let found = try_join_all(lookups).await?;
        Ok(found.into_iter().flatten().collect())
    }

    /// # Errors
    ///
    /// Returns `Error::RepositoryError` if persistence fails
    pub async fn get_all_products(&self) -> Result<Vec<Product>> {
        self.caches
            .all
            .get(CacheKeyBuilder::all(), || self.repository.fetch_all_products())
            .await
    }

    /// All products in `sort` order. Each order is cached under its own key.
    ///
    /// # Errors
    ///
    /// Returns `Error::RepositoryError` if persistence fails
    pub async fn get_all_products_sorted(&self, sort: ProductSort) -> Result<Vec<Product>> {
        self.caches
            .all
            .get(CacheKeyBuilder::sorted(&sort), || async {
                let mut products = self.get_all_products().await?;
                sort.sort(&mut products);
                Ok(products)
            })
            .await
    }

    /// Products of one category in `sort` order, filtered from the cached
    /// full listing.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidArgument` for a non-positive category id
    /// - `Error::RepositoryError` if persistence fails
    pub async fn get_products_by_category_sorted(
        &self,
        category_id: i64,
        sort: ProductSort,
    ) -> Result<Vec<Product>> {
        check_id::<Category>(category_id)?;
        let mut products: Vec<Product> = self
            .get_all_products()
            .await?
            .into_iter()
            .filter(|p| p.category_id == category_id)
            .collect();
        sort.sort(&mut products);
        Ok(products)
    }

    /// Total stock of a product over all warehouses.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidArgument` for a non-positive id
    /// - `Error::NotFound` if the product does not exist
    /// - `Error::RepositoryError` if persistence fails
    pub async fn get_total_stock(&self, id: i64) -> Result<i64> {
        self.get_product_by_id(id).await?;
        self.caches
            .stock
            .get(id, || self.repository.fetch_total_stock(id))
            .await
    }

    /// Case-insensitive name/description search. A blank term lists every
    /// product.
    ///
    /// # Errors
    ///
    /// Returns `Error::RepositoryError` if persistence fails
    pub async fn search_products(&self, term: &str) -> Result<Vec<Product>> {
        let term = CacheKeyBuilder::normalize(term);
        if term.is_empty() {
            return self.get_all_products().await;
        }
        self.caches
            .search
            .get(CacheKeyBuilder::search(&term), || {
                self.repository.search_products(&term)
            })
            .await
    }

    /// Search restricted to a category. Either filter may be omitted.
    ///
    /// # Errors
    ///
    /// - `Error::NotFound` if `category_id` names a missing category
    /// - `Error::RepositoryError` if persistence fails
    pub async fn search_products_by_category(
        &self,
        category_id: Option<i64>,
        term: Option<&str>,
    ) -> Result<Vec<Product>> {
        if let Some(category_id) = category_id {
            if !self.repository.category_exists(category_id).await? {
                return Err(Error::not_found(Category::NAME, category_id));
            }
        }
        let term = term
            .map(CacheKeyBuilder::normalize)
            .filter(|t| !t.is_empty());

        self.caches
            .search
            .get(
                CacheKeyBuilder::search_in_category(category_id, term.as_deref()),
                || {
                    self.repository
                        .search_products_by_category(category_id, term.as_deref())
                },
            )
            .await
    }

    pub fn invalidate_all_caches(&self) {
        warn!("Flushing all product caches");
        self.caches.invalidate_all();
    }

    /// Drop every cached stock total.
    pub fn invalidate_stock_cache(&self) {
        self.caches.stock.invalidate_all();
    }

    /// Drop the cached stock total of one product.
    pub fn invalidate_stock_for(&self, product_id: i64) {
        self.caches.stock.invalidate(&product_id);
    }

    /// Handle for the inventory service. Invalidating through it removes one
    /// stock entry and touches nothing else.
    pub fn stock_invalidator(&self) -> Arc<dyn InvalidationSink<i64>> {
        Arc::new(self.caches.stock.clone())
    }

    pub fn sweep_caches(&self) -> usize {
        self.caches.sweep()
    }

    pub fn cache_stats(&self) -> CacheReport {
        let report = self.caches.report();
        report.log();
        report
    }

    fn check_name(name: &str) -> Result<String> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::InvalidArgument(
                "Product name cannot be empty".to_string(),
            ));
        }
        Ok(name.to_string())
    }

    fn check_price(price_cents: i64) -> Result<()> {
        if price_cents < 0 {
            return Err(Error::InvalidArgument(format!(
                "Price cannot be negative: {}",
                price_cents
            )));
        }
        Ok(())
    }

    async fn check_category(&self, category_id: i64) -> Result<()> {
        if !self.repository.category_exists(category_id).await? {
            return Err(Error::InvalidArgument(format!(
                "Category with ID {} does not exist",
                category_id
            )));
        }
        Ok(())
    }

    fn invalidate_after_write(&self, id: i64, deleted: bool) {
        match self.policy {
            InvalidationPolicy::Coarse => self.caches.invalidate_all(),
            InvalidationPolicy::Targeted => {
                self.caches.products.invalidate(&id);
                self.caches.all.invalidate_all();
                self.caches.search.invalidate_all();
                if deleted {
                    self.caches.stock.invalidate(&id);
                }
            }
        }
    }
}
