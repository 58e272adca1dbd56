//! Persistence collaborator traits consumed by the services.
//!
//! The cache layer never talks to a database itself. Each service is generic
//! over the repository traits it needs, and every cache miss turns into one of
//! these calls. Implement them for your database client (SQLx,
//! tokio-postgres, Diesel, ...), or use [`InMemoryRepository`] for tests.
//!
//! # Error Handling
//!
//! Return `Err(Error::RepositoryError(..))` for any storage failure:
//! - Database connectivity issues
//! - Query timeouts
//! - Constraint violations not covered by a service rule
//!
//! The caches propagate these errors unchanged and never store them. Return
//! `Ok(None)` (not an error) for "no such record".

use crate::entity::{
    Category, Entity, Inventory, NewCategory, NewInventory, NewProduct, NewUser, Product, User,
};
use crate::error::{Error, Result};
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

/// User table access.
#[allow(async_fn_in_trait)]
pub trait UserRepository: Send + Sync {
    /// Fetch a user by primary key.
    ///
    /// # Errors
    /// Returns `Err` if the data source is unavailable or the fetch fails
    async fn fetch_user(&self, id: i64) -> Result<Option<User>>;

    /// Fetch a user by email (exact match).
    ///
    /// # Errors
    /// Returns `Err` if the data source is unavailable or the fetch fails
    async fn fetch_user_by_email(&self, email: &str) -> Result<Option<User>>;

    /// All users ordered by id.
    ///
    /// # Errors
    /// Returns `Err` if the data source is unavailable or the fetch fails
    async fn fetch_all_users(&self) -> Result<Vec<User>>;

    /// Check whether an email is already registered.
    ///
    /// Default implementation goes through `fetch_user_by_email()`.
    ///
    /// # Errors
    /// Returns `Err` if the data source is unavailable or the fetch fails
    async fn email_exists(&self, email: &str) -> Result<bool> {
        Ok(self.fetch_user_by_email(email).await?.is_some())
    }

    /// Insert a user. `password_hash` is already hashed.
    ///
    /// # Errors
    /// Returns `Err` if the write fails
    async fn create_user(&self, user: NewUser, password_hash: String) -> Result<User>;

    /// Persist every field of `user`.
    ///
    /// # Errors
    /// Returns `Err` if the write fails
    async fn save_user(&self, user: &User) -> Result<User>;

    /// Delete a user, returning whether a row was removed.
    ///
    /// # Errors
    /// Returns `Err` if the write fails
    async fn remove_user(&self, id: i64) -> Result<bool>;
}

/// Category table access.
#[allow(async_fn_in_trait)]
pub trait CategoryRepository: Send + Sync {
    /// # Errors
    /// Returns `Err` if the data source is unavailable or the fetch fails
    async fn fetch_category(&self, id: i64) -> Result<Option<Category>>;

    /// All categories ordered by id.
    ///
    /// # Errors
    /// Returns `Err` if the data source is unavailable or the fetch fails
    async fn fetch_all_categories(&self) -> Result<Vec<Category>>;

    /// Default implementation goes through `fetch_category()`.
    ///
    /// # Errors
    /// Returns `Err` if the data source is unavailable or the fetch fails
    async fn category_exists(&self, id: i64) -> Result<bool> {
        Ok(self.fetch_category(id).await?.is_some())
    }

    /// # Errors
    /// Returns `Err` if the write fails
    async fn create_category(&self, category: NewCategory) -> Result<Category>;

    /// # Errors
    /// Returns `Err` if the write fails
    async fn save_category(&self, category: &Category) -> Result<Category>;

    /// # Errors
    /// Returns `Err` if the write fails
    async fn remove_category(&self, id: i64) -> Result<bool>;
}

/// Product table access, plus the stock aggregate derived from inventory.
#[allow(async_fn_in_trait)]
pub trait ProductRepository: Send + Sync {
    /// # Errors
    /// Returns `Err` if the data source is unavailable or the fetch fails
    async fn fetch_product(&self, id: i64) -> Result<Option<Product>>;

    /// All products ordered by id.
    ///
    /// # Errors
    /// Returns `Err` if the data source is unavailable or the fetch fails
    async fn fetch_all_products(&self) -> Result<Vec<Product>>;

    /// Case-insensitive match on name or description. `term` is already
    /// trimmed and lower-cased.
    ///
    /// # Errors
    /// Returns `Err` if the data source is unavailable or the fetch fails
    async fn search_products(&self, term: &str) -> Result<Vec<Product>>;

    /// Optional category filter combined with an optional search term.
    ///
    /// # Errors
    /// Returns `Err` if the data source is unavailable or the fetch fails
    async fn search_products_by_category(
        &self,
        category_id: Option<i64>,
        term: Option<&str>,
    ) -> Result<Vec<Product>>;

    /// Sum of inventory quantities for a product (0 with no inventory rows).
    ///
    /// # Errors
    /// Returns `Err` if the data source is unavailable or the fetch fails
    async fn fetch_total_stock(&self, product_id: i64) -> Result<i64>;

    /// # Errors
    /// Returns `Err` if the write fails
    async fn create_product(&self, product: NewProduct) -> Result<Product>;

    /// # Errors
    /// Returns `Err` if the write fails
    async fn save_product(&self, product: &Product) -> Result<Product>;

    /// # Errors
    /// Returns `Err` if the write fails
    async fn remove_product(&self, id: i64) -> Result<bool>;
}

/// Inventory table access.
#[allow(async_fn_in_trait)]
pub trait InventoryRepository: Send + Sync {
    /// # Errors
    /// Returns `Err` if the data source is unavailable or the fetch fails
    async fn fetch_inventory(&self, id: i64) -> Result<Option<Inventory>>;

    /// # Errors
    /// Returns `Err` if the data source is unavailable or the fetch fails
    async fn fetch_inventory_by_product(&self, product_id: i64) -> Result<Vec<Inventory>>;

    /// # Errors
    /// Returns `Err` if the data source is unavailable or the fetch fails
    async fn fetch_inventory_at(
        &self,
        product_id: i64,
        warehouse_location: &str,
    ) -> Result<Option<Inventory>>;

    /// # Errors
    /// Returns `Err` if the write fails
    async fn create_inventory(&self, inventory: NewInventory) -> Result<Inventory>;

    /// # Errors
    /// Returns `Err` if the write fails
    async fn save_inventory(&self, inventory: &Inventory) -> Result<Inventory>;

    /// # Errors
    /// Returns `Err` if the write fails
    async fn remove_inventory(&self, id: i64) -> Result<bool>;
}

/// Password hashing collaborator used by the user service.
pub trait PasswordHasher: Send + Sync {
    /// Hash a plain-text password.
    ///
    /// # Errors
    /// Returns `Err` if hashing fails
    fn hash(&self, plain: &str) -> Result<String>;

    /// Check a plain-text password against a stored hash.
    fn verify(&self, plain: &str, hashed: &str) -> bool;
}

/// Stores passwords verbatim with a marker prefix. Tests and demos only.
#[derive(Clone, Debug, Default)]
pub struct PlaintextHasher;

impl PasswordHasher for PlaintextHasher {
    fn hash(&self, plain: &str) -> Result<String> {
        if plain.is_empty() {
            return Err(Error::InvalidArgument(
                "Password cannot be empty".to_string(),
            ));
        }
        Ok(format!("plain:{}", plain))
    }

    fn verify(&self, plain: &str, hashed: &str) -> bool {
        hashed.strip_prefix("plain:") == Some(plain)
    }
}

// ============================================================================
// In-Memory Test Repository
// ============================================================================

/// In-memory implementation of every repository trait.
///
/// Provides a straightforward persistence double for unit tests, demos and
/// benchmarks, with two knobs tests lean on:
///
/// - **Call counters**: `call_count("fetch_user")` tells whether a read
///   reached persistence or was served from cache
/// - **Failure injection**: `set_failing(true)` makes every call return
///   `Error::RepositoryError`
///
/// Seed data with the synchronous `insert_*` methods; they bypass the
/// services (and therefore their caches), which is how tests simulate a
/// record changing underneath a warm cache.
#[derive(Default)]
pub struct InMemoryRepository {
    users: DashMap<i64, User>,
    categories: DashMap<i64, Category>,
    products: DashMap<i64, Product>,
    inventory: DashMap<i64, Inventory>,
    next_id: AtomicI64,
    calls: DashMap<&'static str, u64>,
    failing: AtomicBool,
}

impl InMemoryRepository {
    /// Create a new empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// How many times the named trait method was called.
    pub fn call_count(&self, op: &str) -> u64 {
        self.calls.get(op).map(|c| *c).unwrap_or(0)
    }

    /// Reset every call counter.
    pub fn reset_calls(&self) {
        self.calls.clear();
    }

    /// Insert or replace a user directly.
    pub fn insert_user(&self, user: User) {
        self.seed(&self.users, user);
    }

    /// Insert or replace a category directly.
    pub fn insert_category(&self, category: Category) {
        self.seed(&self.categories, category);
    }

    /// Insert or replace a product directly.
    pub fn insert_product(&self, product: Product) {
        self.seed(&self.products, product);
    }

    /// Insert or replace an inventory row directly.
    pub fn insert_inventory(&self, inventory: Inventory) {
        self.seed(&self.inventory, inventory);
    }

    fn seed<E: Entity>(&self, table: &DashMap<i64, E>, row: E) {
        self.next_id.fetch_max(row.id(), Ordering::SeqCst);
        table.insert(row.id(), row);
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn enter(&self, op: &'static str) -> Result<()> {
        *self.calls.entry(op).or_insert(0) += 1;
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::RepositoryError(format!(
                "{}: connection refused",
                op
            )));
        }
        Ok(())
    }

    fn sorted<E: Entity>(table: &DashMap<i64, E>, filter: impl Fn(&E) -> bool) -> Vec<E> {
        let mut rows: Vec<E> = table
            .iter()
            .filter(|r| filter(r.value()))
            .map(|r| r.value().clone())
            .collect();
        rows.sort_by_key(E::id);
        rows
    }

    fn matches_term(product: &Product, term: &str) -> bool {
        product.name.to_lowercase().contains(term)
            || product
                .description
                .as_deref()
                .is_some_and(|d| d.to_lowercase().contains(term))
    }
}

impl UserRepository for InMemoryRepository {
    async fn fetch_user(&self, id: i64) -> Result<Option<User>> {
        self.enter("fetch_user")?;
        Ok(self.users.get(&id).map(|u| u.clone()))
    }

    async fn fetch_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.enter("fetch_user_by_email")?;
        Ok(self
            .users
            .iter()
            .find(|u| u.email == email)
            .map(|u| u.value().clone()))
    }

    async fn fetch_all_users(&self) -> Result<Vec<User>> {
        self.enter("fetch_all_users")?;
        Ok(Self::sorted(&self.users, |_| true))
    }

    async fn create_user(&self, user: NewUser, password_hash: String) -> Result<User> {
        self.enter("create_user")?;
        let created = User {
            id: self.next_id(),
            firstname: user.firstname,
            lastname: user.lastname,
            phone: user.phone,
            role: user.role,
            email: user.email,
            password_hash,
            created_at: Utc::now(),
        };
        self.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn save_user(&self, user: &User) -> Result<User> {
        self.enter("save_user")?;
        self.users.insert(user.id, user.clone());
        Ok(user.clone())
    }

    async fn remove_user(&self, id: i64) -> Result<bool> {
        self.enter("remove_user")?;
        Ok(self.users.remove(&id).is_some())
    }
}

impl CategoryRepository for InMemoryRepository {
    async fn fetch_category(&self, id: i64) -> Result<Option<Category>> {
        self.enter("fetch_category")?;
        Ok(self.categories.get(&id).map(|c| c.clone()))
    }

    async fn fetch_all_categories(&self) -> Result<Vec<Category>> {
        self.enter("fetch_all_categories")?;
        Ok(Self::sorted(&self.categories, |_| true))
    }

    async fn category_exists(&self, id: i64) -> Result<bool> {
        self.enter("category_exists")?;
        Ok(self.categories.contains_key(&id))
    }

    async fn create_category(&self, category: NewCategory) -> Result<Category> {
        self.enter("create_category")?;
        let now = Utc::now();
        let created = Category {
            id: self.next_id(),
            name: category.name,
            description: category.description,
            created_at: now,
            updated_at: now,
        };
        self.categories.insert(created.id, created.clone());
        Ok(created)
    }

    async fn save_category(&self, category: &Category) -> Result<Category> {
        self.enter("save_category")?;
        let mut saved = category.clone();
        saved.updated_at = Utc::now();
        self.categories.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn remove_category(&self, id: i64) -> Result<bool> {
        self.enter("remove_category")?;
        Ok(self.categories.remove(&id).is_some())
    }
}

impl ProductRepository for InMemoryRepository {
    async fn fetch_product(&self, id: i64) -> Result<Option<Product>> {
        self.enter("fetch_product")?;
        Ok(self.products.get(&id).map(|p| p.clone()))
    }

    async fn fetch_all_products(&self) -> Result<Vec<Product>> {
        self.enter("fetch_all_products")?;
        Ok(Self::sorted(&self.products, |_| true))
    }

    async fn search_products(&self, term: &str) -> Result<Vec<Product>> {
        self.enter("search_products")?;
        Ok(Self::sorted(&self.products, |p| Self::matches_term(p, term)))
    }

    async fn search_products_by_category(
        &self,
        category_id: Option<i64>,
        term: Option<&str>,
    ) -> Result<Vec<Product>> {
        self.enter("search_products_by_category")?;
        let term = term.map(str::to_lowercase).filter(|t| !t.trim().is_empty());
        Ok(Self::sorted(&self.products, |p| {
            category_id.map_or(true, |c| p.category_id == c)
                && term
                    .as_deref()
                    .map_or(true, |t| Self::matches_term(p, t.trim()))
        }))
    }

    async fn fetch_total_stock(&self, product_id: i64) -> Result<i64> {
        self.enter("fetch_total_stock")?;
        Ok(self
            .inventory
            .iter()
            .filter(|row| row.product_id == product_id)
            .map(|row| row.quantity)
            .sum())
    }

    async fn create_product(&self, product: NewProduct) -> Result<Product> {
        self.enter("create_product")?;
        let now = Utc::now();
        let created = Product {
            id: self.next_id(),
            name: product.name,
            description: product.description,
            price_cents: product.price_cents,
            category_id: product.category_id,
            created_at: now,
            updated_at: now,
        };
        self.products.insert(created.id, created.clone());
        Ok(created)
    }

    async fn save_product(&self, product: &Product) -> Result<Product> {
        self.enter("save_product")?;
        let mut saved = product.clone();
        saved.updated_at = Utc::now();
        self.products.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn remove_product(&self, id: i64) -> Result<bool> {
        self.enter("remove_product")?;
        Ok(self.products.remove(&id).is_some())
    }
}

impl InventoryRepository for InMemoryRepository {
    async fn fetch_inventory(&self, id: i64) -> Result<Option<Inventory>> {
        self.enter("fetch_inventory")?;
        Ok(self.inventory.get(&id).map(|i| i.clone()))
    }

    async fn fetch_inventory_by_product(&self, product_id: i64) -> Result<Vec<Inventory>> {
        self.enter("fetch_inventory_by_product")?;
        Ok(Self::sorted(&self.inventory, |i| i.product_id == product_id))
    }

    async fn fetch_inventory_at(
        &self,
        product_id: i64,
        warehouse_location: &str,
    ) -> Result<Option<Inventory>> {
        self.enter("fetch_inventory_at")?;
        Ok(self
            .inventory
            .iter()
            .find(|i| i.product_id == product_id && i.warehouse_location == warehouse_location)
            .map(|i| i.value().clone()))
    }

    async fn create_inventory(&self, inventory: NewInventory) -> Result<Inventory> {
        self.enter("create_inventory")?;
        let now = Utc::now();
        let created = Inventory {
            id: self.next_id(),
            product_id: inventory.product_id,
            quantity: inventory.quantity,
            warehouse_location: inventory.warehouse_location,
            created_at: now,
            last_updated: now,
        };
        self.inventory.insert(created.id, created.clone());
        Ok(created)
    }

    async fn save_inventory(&self, inventory: &Inventory) -> Result<Inventory> {
        self.enter("save_inventory")?;
        let mut saved = inventory.clone();
        saved.last_updated = Utc::now();
        self.inventory.insert(saved.id, saved.clone());
        Ok(saved)
    }

    async fn remove_inventory(&self, id: i64) -> Result<bool> {
        self.enter("remove_inventory")?;
        Ok(self.inventory.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_product(name: &str, category_id: i64) -> NewProduct {
        NewProduct {
            name: name.to_string(),
            description: Some(format!("{} description", name)),
            price_cents: 1000,
            category_id,
        }
    }

    #[tokio::test]
    async fn test_in_memory_repository_create_and_fetch() {
        let repo = InMemoryRepository::new();

        let created = repo
            .create_product(new_product("Laptop", 1))
            .await
            .expect("Failed to create");
        let fetched = repo
            .fetch_product(created.id)
            .await
            .expect("Failed to fetch");

        assert_eq!(fetched, Some(created));
        assert_eq!(repo.call_count("fetch_product"), 1);
    }

    #[tokio::test]
    async fn test_in_memory_repository_miss() {
        let repo = InMemoryRepository::new();

        let fetched = repo.fetch_user(99).await.expect("Failed to fetch");
        assert!(fetched.is_none());
    }

    #[tokio::test]
    async fn test_in_memory_repository_failure_injection() {
        let repo = InMemoryRepository::new();
        repo.set_failing(true);

        let err = repo.fetch_all_products().await.unwrap_err();
        assert!(matches!(err, Error::RepositoryError(_)));

        repo.set_failing(false);
        assert!(repo.fetch_all_products().await.is_ok());
        assert_eq!(repo.call_count("fetch_all_products"), 2);
    }

    #[tokio::test]
    async fn test_total_stock_sums_rows() {
        let repo = InMemoryRepository::new();
        let product = repo
            .create_product(new_product("Mouse", 1))
            .await
            .expect("Failed to create");

        assert_eq!(repo.fetch_total_stock(product.id).await.unwrap(), 0);

        for (warehouse, quantity) in [("north", 5), ("south", 7)] {
            repo.create_inventory(NewInventory {
                product_id: product.id,
                quantity,
                warehouse_location: warehouse.to_string(),
            })
            .await
            .expect("Failed to create inventory");
        }

        assert_eq!(repo.fetch_total_stock(product.id).await.unwrap(), 12);
    }

    #[tokio::test]
    async fn test_search() {
        let repo = InMemoryRepository::new();
        repo.create_product(new_product("Gaming Laptop", 1)).await.unwrap();
        repo.create_product(new_product("Mouse", 2)).await.unwrap();

        assert_eq!(repo.search_products("laptop").await.unwrap().len(), 1);
        assert_eq!(
            repo.search_products_by_category(Some(2), None)
                .await
                .unwrap()
                .len(),
            1
        );
        assert_eq!(
            repo.search_products_by_category(None, Some("DESCRIPTION"))
                .await
                .unwrap()
                .len(),
            2
        );
    }

    #[test]
    fn test_insert_advances_id_sequence() {
        let repo = InMemoryRepository::new();
        repo.insert_category(Category {
            id: 41,
            name: "Seeded".to_string(),
            description: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        });
        assert_eq!(repo.next_id(), 42);
    }

    #[test]
    fn test_plaintext_hasher() {
        let hasher = PlaintextHasher;
        let hashed = hasher.hash("secret").unwrap();

        assert!(hasher.verify("secret", &hashed));
        assert!(!hasher.verify("wrong", &hashed));
        assert!(hasher.hash("").is_err());
    }
}
