//! Integration tests for commerce-cache
//!
//! These tests drive the services end to end through the `Services`
//! registry, with the in-memory repository standing in for the database.

use chrono::Utc;
use commerce_cache::entity::{Category, NewInventory, NewProduct, NewUser, UserPatch, UserRole};
use commerce_cache::repository::{InMemoryRepository, PlaintextHasher};
use commerce_cache::{CacheSettings, Error, InvalidationPolicy, Services};
use std::sync::Arc;
use std::time::Duration;

type TestServices = Services<InMemoryRepository, PlaintextHasher>;

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn setup(settings: CacheSettings) -> (Arc<InMemoryRepository>, TestServices) {
    init_logger();
    let repo = Arc::new(InMemoryRepository::new());
    repo.insert_category(Category {
        id: 1,
        name: "Electronics".to_string(),
        description: Some("Gadgets".to_string()),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    });
    let services = Services::new(Arc::clone(&repo), PlaintextHasher, &settings);
    (repo, services)
}

fn new_user(email: &str) -> NewUser {
    NewUser {
        firstname: "Grace".to_string(),
        lastname: "Hopper".to_string(),
        phone: Some("555-0100".to_string()),
        role: UserRole::Admin,
        email: email.to_string(),
        password: "cobol".to_string(),
    }
}

fn new_product(name: &str) -> NewProduct {
    NewProduct {
        name: name.to_string(),
        description: None,
        price_cents: 9_999,
        category_id: 1,
    }
}

fn stock(product_id: i64, quantity: i64, warehouse: &str) -> NewInventory {
    NewInventory {
        product_id,
        quantity,
        warehouse_location: warehouse.to_string(),
    }
}

/// Test 1: Inventory writes drop only the affected product's stock
///
/// - P and Q both have cached totals
/// - Adjusting P's inventory forces a recompute of P on the next read
/// - Q's cached total is served without touching persistence
#[tokio::test]
async fn test_inventory_mutation_invalidates_only_that_products_stock() {
    let (repo, services) = setup(CacheSettings::default());

    let p = services.products.create_product(new_product("P")).await.unwrap();
    let q = services.products.create_product(new_product("Q")).await.unwrap();
    services.inventory.create_inventory(stock(p.id, 10, "north")).await.unwrap();
    services.inventory.create_inventory(stock(q.id, 4, "north")).await.unwrap();

    assert_eq!(services.products.get_total_stock(p.id).await.unwrap(), 10);
    assert_eq!(services.products.get_total_stock(q.id).await.unwrap(), 4);
    repo.reset_calls();

    services.inventory.adjust_inventory(p.id, "north", -3).await.unwrap();

    assert_eq!(services.products.get_total_stock(p.id).await.unwrap(), 7);
    assert_eq!(repo.call_count("fetch_total_stock"), 1);

    assert_eq!(services.products.get_total_stock(q.id).await.unwrap(), 4);
    assert_eq!(repo.call_count("fetch_total_stock"), 1);
}

/// Test 2: Every kind of inventory mutation reaches the stock cache
#[tokio::test]
async fn test_inventory_create_update_delete_refresh_stock() {
    let (_repo, services) = setup(CacheSettings::default());
    let p = services.products.create_product(new_product("P")).await.unwrap();

    assert_eq!(services.products.get_total_stock(p.id).await.unwrap(), 0);

    let north = services.inventory.create_inventory(stock(p.id, 5, "north")).await.unwrap();
    assert_eq!(services.products.get_total_stock(p.id).await.unwrap(), 5);

    services.inventory.create_inventory(stock(p.id, 2, "south")).await.unwrap();
    assert_eq!(services.products.get_total_stock(p.id).await.unwrap(), 7);

    services.inventory.update_inventory(p.id, "south", 20).await.unwrap();
    assert_eq!(services.products.get_total_stock(p.id).await.unwrap(), 25);

    services.inventory.delete_inventory(north.id).await.unwrap();
    assert_eq!(services.products.get_total_stock(p.id).await.unwrap(), 20);
}

/// Test 3: Session snapshots win over the TTL cache and persistence
#[tokio::test]
async fn test_session_priority() {
    let (repo, services) = setup(CacheSettings::default());
    let user = services.users.create_user(new_user("grace@example.com")).await.unwrap();

    services.users.login("grace@example.com", "cobol").await.unwrap();

    let mut renamed = user.clone();
    renamed.lastname = "Murray".to_string();
    repo.insert_user(renamed);

    let served = services.users.get_user_by_id(user.id).await.unwrap();
    assert_eq!(served.lastname, "Hopper");
    assert_eq!(repo.call_count("fetch_user"), 0);

    services.users.logout(user.id);
    let served = services.users.get_user_by_id(user.id).await.unwrap();
    assert_eq!(served.lastname, "Murray");
}

/// Test 4: Updating a logged-in user refreshes the session snapshot
#[tokio::test]
async fn test_update_refreshes_active_session() {
    let (_repo, services) = setup(CacheSettings::default());
    let user = services.users.create_user(new_user("grace@example.com")).await.unwrap();
    services.users.login("grace@example.com", "cobol").await.unwrap();

    let patch = UserPatch {
        phone: Some("555-0199".to_string()),
        ..Default::default()
    };
    services.users.update_user(user.id, patch).await.unwrap();

    let served = services.users.get_user_by_id(user.id).await.unwrap();
    assert_eq!(served.phone.as_deref(), Some("555-0199"));
    assert_eq!(services.users.active_session_count(), 1);
}

/// Test 5: Coarse and targeted policies differ in what a write flushes
#[tokio::test]
async fn test_invalidation_policies() {
    for (policy, expected_refetches) in [
        (InvalidationPolicy::Coarse, 1),
        (InvalidationPolicy::Targeted, 0),
    ] {
        let (repo, services) = setup(CacheSettings::default().with_invalidation(policy));
        let a = services.products.create_product(new_product("A")).await.unwrap();
        services.products.get_product_by_id(a.id).await.unwrap();
        services.products.get_all_products().await.unwrap();
        repo.reset_calls();

        services.products.create_product(new_product("B")).await.unwrap();
        services.products.get_product_by_id(a.id).await.unwrap();
        let all = services.products.get_all_products().await.unwrap();

        assert_eq!(all.len(), 2, "listings are always flushed ({})", policy);
        assert_eq!(repo.call_count("fetch_product"), expected_refetches, "{}", policy);
    }
}

/// Test 6: Settings loaded from JSON drive the services
#[tokio::test(start_paused = true)]
async fn test_settings_from_json() {
    let settings = CacheSettings::from_json_str(
        r#"{
            "invalidation": "targeted",
            "product": { "by_id": { "ttl_ms": 1000, "capacity": 2 } }
        }"#,
    )
    .unwrap();
    assert_eq!(settings.invalidation, InvalidationPolicy::Targeted);

    let (repo, services) = setup(settings);
    let a = services.products.create_product(new_product("A")).await.unwrap();
    services.products.get_product_by_id(a.id).await.unwrap();

    tokio::time::advance(Duration::from_millis(1001)).await;
    services.products.get_product_by_id(a.id).await.unwrap();

    assert_eq!(repo.call_count("fetch_product"), 2);
}

/// Test 7: Repository failures surface unchanged and are not cached
#[tokio::test]
async fn test_repository_errors_propagate() {
    let (repo, services) = setup(CacheSettings::default());
    let p = services.products.create_product(new_product("P")).await.unwrap();

    repo.set_failing(true);
    let err = services.products.get_product_by_id(p.id).await.unwrap_err();
    assert!(matches!(err, Error::RepositoryError(_)));
    assert!(services.categories.get_all_categories().await.is_err());

    repo.set_failing(false);
    assert_eq!(services.products.get_product_by_id(p.id).await.unwrap().id, p.id);
    assert_eq!(services.categories.get_all_categories().await.unwrap().len(), 1);
}

/// Test 8: The combined report lists every cache and the session count
#[tokio::test]
async fn test_combined_cache_stats() {
    let (_repo, services) = setup(CacheSettings::default());
    let user = services.users.create_user(new_user("grace@example.com")).await.unwrap();
    services.users.get_user_by_id(user.id).await.unwrap();
    services.users.login("grace@example.com", "cobol").await.unwrap();
    services.categories.get_category_by_id(1).await.unwrap();

    let report = services.cache_stats();

    assert_eq!(report.cache("User Cache").unwrap().entries, 1);
    assert_eq!(report.cache("Email Cache").unwrap().entries, 1);
    assert_eq!(report.cache("Category Cache").unwrap().entries, 1);
    assert_eq!(report.cache("Stock Cache").unwrap().entries, 0);
    assert!(report.to_string().ends_with("Active Sessions: 1 users"));

    services.invalidate_all_caches();
    assert_eq!(services.cache_stats().total_entries(), 0);
    assert_eq!(services.users.active_session_count(), 1);
}

/// Test 9: Sweeping removes expired entries across every service
#[tokio::test(start_paused = true)]
async fn test_sweep_all_services() {
    let (_repo, services) = setup(CacheSettings::default());
    let p = services.products.create_product(new_product("P")).await.unwrap();
    services.products.get_total_stock(p.id).await.unwrap();
    services.categories.get_category_by_id(1).await.unwrap();

    // Stock lives 1 minute, products 5, categories 10.
    tokio::time::advance(Duration::from_secs(61)).await;
    assert_eq!(services.sweep_caches(), 1);

    tokio::time::advance(Duration::from_secs(600)).await;
    assert_eq!(services.sweep_caches(), 2);
    assert_eq!(services.cache_stats().total_entries(), 0);
}
