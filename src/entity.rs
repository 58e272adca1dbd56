//! Domain records held by the service caches.
//!
//! These mirror rows owned by the persistence collaborator. The caches treat
//! them as opaque snapshots: a cached record is never mutated in place, a
//! write goes to persistence and the stale snapshot is invalidated.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt::{self, Display};
use std::str::FromStr;

/// A persisted record addressed by a numeric primary key.
///
/// Services take their error labels from [`Entity::NAME`], and the in-memory
/// repository keys and orders its tables by [`Entity::id`].
pub trait Entity: Clone + Send + Sync + 'static {
    /// Label used in error messages, e.g. `"Product"`.
    const NAME: &'static str;

    fn id(&self) -> i64;
}

// ============================================================================
// Users
// ============================================================================

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UserRole {
    #[default]
    Customer,
    Admin,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub firstname: String,
    pub lastname: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub email: String,
    /// Output of the password hashing collaborator, never the plain password.
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl Entity for User {
    const NAME: &'static str = "User";

    fn id(&self) -> i64 {
        self.id
    }
}

/// Input for creating a user. `password` is plain text and is hashed by the
/// service before it reaches persistence.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewUser {
    pub firstname: String,
    pub lastname: String,
    pub phone: Option<String>,
    pub role: UserRole,
    pub email: String,
    pub password: String,
}

/// Partial update; `None` keeps the stored value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPatch {
    pub firstname: Option<String>,
    pub lastname: Option<String>,
    pub phone: Option<String>,
    pub role: Option<UserRole>,
    pub email: Option<String>,
    pub password: Option<String>,
}

// ============================================================================
// Categories
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Category {
    const NAME: &'static str = "Category";

    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub description: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryPatch {
    pub name: Option<String>,
    pub description: Option<String>,
}

// ============================================================================
// Products
// ============================================================================

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub category_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Entity for Product {
    const NAME: &'static str = "Product";

    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub price_cents: i64,
    pub category_id: i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub price_cents: Option<i64>,
    pub category_id: Option<i64>,
}

/// In-memory sort orders for product listings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    /// Name, case-insensitive, A→Z
    #[default]
    Name,
    NameDesc,
    PriceAsc,
    PriceDesc,
    /// Newest first
    Newest,
    Oldest,
    /// Category id, then name
    Category,
}

impl ProductSort {
    /// Parse leniently; unknown or missing criteria sort by name.
    pub fn parse(sort_by: Option<&str>) -> Self {
        sort_by
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }

    pub fn compare(&self, a: &Product, b: &Product) -> Ordering {
        let by_name = || a.name.to_lowercase().cmp(&b.name.to_lowercase());
        match self {
            ProductSort::Name => by_name(),
            ProductSort::NameDesc => by_name().reverse(),
            ProductSort::PriceAsc => a.price_cents.cmp(&b.price_cents),
            ProductSort::PriceDesc => b.price_cents.cmp(&a.price_cents),
            ProductSort::Newest => b.created_at.cmp(&a.created_at),
            ProductSort::Oldest => a.created_at.cmp(&b.created_at),
            ProductSort::Category => a.category_id.cmp(&b.category_id).then_with(by_name),
        }
    }

    /// Stable in-place sort.
    pub fn sort(&self, products: &mut [Product]) {
        products.sort_by(|a, b| self.compare(a, b));
    }
}

impl Display for ProductSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ProductSort::Name => "name",
            ProductSort::NameDesc => "name_desc",
            ProductSort::PriceAsc => "price_asc",
            ProductSort::PriceDesc => "price_desc",
            ProductSort::Newest => "newest",
            ProductSort::Oldest => "oldest",
            ProductSort::Category => "category",
        };
        write!(f, "{}", s)
    }
}

impl FromStr for ProductSort {
    type Err = crate::error::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "name" | "name_asc" => Ok(ProductSort::Name),
            "name_desc" => Ok(ProductSort::NameDesc),
            "price" | "price_asc" => Ok(ProductSort::PriceAsc),
            "price_desc" => Ok(ProductSort::PriceDesc),
            "newest" | "date_desc" => Ok(ProductSort::Newest),
            "oldest" | "date_asc" => Ok(ProductSort::Oldest),
            "category" => Ok(ProductSort::Category),
            other => Err(crate::error::Error::InvalidArgument(format!(
                "unknown sort order '{}'",
                other
            ))),
        }
    }
}

// ============================================================================
// Inventory
// ============================================================================

/// Stock of one product at one warehouse. A product's total stock is the
/// sum over its rows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    pub id: i64,
    pub product_id: i64,
    pub quantity: i64,
    pub warehouse_location: String,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl Entity for Inventory {
    const NAME: &'static str = "Inventory";

    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewInventory {
    pub product_id: i64,
    pub quantity: i64,
    pub warehouse_location: String,
}
