//! Basic usage example: the four services over the in-memory repository.

use chrono::Utc;
use commerce_cache::entity::{Category, NewInventory, NewProduct, NewUser, UserRole};
use commerce_cache::error::Result;
use commerce_cache::repository::{InMemoryRepository, PlaintextHasher};
use commerce_cache::{CacheSettings, Services};
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Debug)
        .try_init()
        .ok();

    println!("\n=== Commerce Cache - Basic Example ===\n");

    // 1. Wire the services
    println!("1. Building services over the in-memory repository...");
    let repository = Arc::new(InMemoryRepository::new());
    repository.insert_category(Category {
        id: 1,
        name: "Electronics".to_string(),
        description: Some("Gadgets and gear".to_string()),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    });
    let services = Services::new(
        Arc::clone(&repository),
        PlaintextHasher,
        &CacheSettings::default(),
    );
    println!("   ✓ Services ready\n");

    // 2. Product reads: first one hits persistence, second one the cache
    println!("2. Reading a product twice:");
    let laptop = services
        .products
        .create_product(NewProduct {
            name: "Laptop".to_string(),
            description: Some("14 inch".to_string()),
            price_cents: 129_900,
            category_id: 1,
        })
        .await?;
    services.products.get_product_by_id(laptop.id).await?;
    services.products.get_product_by_id(laptop.id).await?;
    println!(
        "   ✓ {} read twice, {} persistence fetch(es)\n",
        laptop.name,
        repository.call_count("fetch_product")
    );

    // 3. Stock is derived from inventory and invalidated by inventory writes
    println!("3. Stock before and after an inventory adjustment:");
    services
        .inventory
        .create_inventory(NewInventory {
            product_id: laptop.id,
            quantity: 12,
            warehouse_location: "north".to_string(),
        })
        .await?;
    let before = services.products.get_total_stock(laptop.id).await?;
    services
        .inventory
        .adjust_inventory(laptop.id, "north", -2)
        .await?;
    let after = services.products.get_total_stock(laptop.id).await?;
    println!("   ✓ Stock {} -> {}\n", before, after);

    // 4. Logged-in users are served from the session cache
    println!("4. Login and session lookup:");
    let user = services
        .users
        .create_user(NewUser {
            firstname: "Grace".to_string(),
            lastname: "Hopper".to_string(),
            phone: None,
            role: UserRole::Admin,
            email: "grace@example.com".to_string(),
            password: "cobol".to_string(),
        })
        .await?;
    services.users.login("grace@example.com", "cobol").await?;
    let active = services.users.get_user_by_id(user.id).await?;
    println!("   ✓ {} {} served from session\n", active.firstname, active.lastname);

    // 5. Report
    println!("5. Cache stats:");
    println!("   {}\n", services.cache_stats());

    Ok(())
}
