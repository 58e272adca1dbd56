//! Inventory service.
//!
//! Inventory rows are read straight from persistence. What this service does
//! own is the consequence of its writes: every successful mutation tells the
//! stock sink (the product service's stock cache, when wired) that the
//! product's total has changed.

use super::check_id;
use crate::cache_set::InvalidationSink;
use crate::entity::{Entity, Inventory, NewInventory};
use crate::error::{Error, Result};
use crate::repository::{InventoryRepository, ProductRepository};
use std::sync::Arc;

pub struct InventoryService<R> {
    repository: Arc<R>,
    stock_sink: Option<Arc<dyn InvalidationSink<i64>>>,
}

impl<R> InventoryService<R>
where
    R: InventoryRepository + ProductRepository,
{
    /// `stock_sink` is fixed for the service's lifetime. Pass `None` to run
    /// without a product service.
    pub fn new(repository: Arc<R>, stock_sink: Option<Arc<dyn InvalidationSink<i64>>>) -> Self {
        InventoryService {
            repository,
            stock_sink,
        }
    }

    /// Add a stock row for a product at a warehouse.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidArgument` for a negative quantity, a blank warehouse
    ///   or a missing product
    /// - `Error::Duplicate` if the product already has a row at the warehouse
    /// - `Error::RepositoryError` if persistence fails
    pub async fn create_inventory(&self, inventory: NewInventory) -> Result<Inventory> {
        Self::check_quantity(inventory.quantity)?;
        let warehouse = inventory.warehouse_location.trim().to_string();
        if warehouse.is_empty() {
            return Err(Error::InvalidArgument(
                "Warehouse location cannot be empty".to_string(),
            ));
        }
        if self
            .repository
            .fetch_product(inventory.product_id)
            .await?
            .is_none()
        {
            return Err(Error::InvalidArgument(format!(
                "Product with ID {} does not exist",
                inventory.product_id
            )));
        }
        if self
            .repository
            .fetch_inventory_at(inventory.product_id, &warehouse)
            .await?
            .is_some()
        {
            return Err(Error::duplicate(
                Inventory::NAME,
                "warehouse_location",
                &warehouse,
            ));
        }

        let created = self
            .repository
            .create_inventory(NewInventory {
                warehouse_location: warehouse,
                ..inventory
            })
            .await?;
        self.stock_changed(created.product_id);
        info!(
            "Created inventory {} for product {} at {}",
            created.id, created.product_id, created.warehouse_location
        );
        Ok(created)
    }

    /// Set the quantity of an existing row.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidArgument` for a negative quantity
    /// - `Error::NotFound` if there is no row for the product at the warehouse
    /// - `Error::RepositoryError` if persistence fails
    pub async fn update_inventory(
        &self,
        product_id: i64,
        warehouse_location: &str,
        quantity: i64,
    ) -> Result<Inventory> {
        Self::check_quantity(quantity)?;
        let mut row = self.locate(product_id, warehouse_location).await?;
        row.quantity = quantity;

        let saved = self.repository.save_inventory(&row).await?;
        self.stock_changed(product_id);
        info!("Updated inventory {} to {}", saved.id, saved.quantity);
        Ok(saved)
    }

    /// # Errors
    ///
    /// - `Error::InvalidArgument` for a non-positive id
    /// - `Error::NotFound` if the row does not exist
    /// - `Error::RepositoryError` if persistence fails
    pub async fn delete_inventory(&self, id: i64) -> Result<()> {
        check_id::<Inventory>(id)?;
        let row = self
            .repository
            .fetch_inventory(id)
            .await?
            .ok_or_else(|| Error::not_found(Inventory::NAME, id))?;

        if !self.repository.remove_inventory(id).await? {
            return Err(Error::not_found(Inventory::NAME, id));
        }
        self.stock_changed(row.product_id);
        info!("Deleted inventory {}", id);
        Ok(())
    }

    /// # Errors
    ///
    /// Returns `Error::RepositoryError` if persistence fails
    pub async fn get_inventory_by_product(&self, product_id: i64) -> Result<Vec<Inventory>> {
        self.repository.fetch_inventory_by_product(product_id).await
    }

    /// # Errors
    ///
    /// - `Error::NotFound` if there is no row for the product at the warehouse
    /// - `Error::RepositoryError` if persistence fails
    pub async fn get_inventory_by_product_and_warehouse(
        &self,
        product_id: i64,
        warehouse_location: &str,
    ) -> Result<Inventory> {
        self.locate(product_id, warehouse_location).await
    }

    /// Add `delta` (possibly negative) to a row's quantity.
    ///
    /// # Errors
    ///
    /// - `Error::InvalidArgument` if the result would be negative
    /// - `Error::NotFound` if there is no row for the product at the warehouse
    /// - `Error::RepositoryError` if persistence fails
    pub async fn adjust_inventory(
        &self,
        product_id: i64,
        warehouse_location: &str,
        delta: i64,
    ) -> Result<Inventory> {
        let mut row = self.locate(product_id, warehouse_location).await?;
        let quantity = row
            .quantity
            .checked_add(delta)
            .filter(|q| *q >= 0)
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "Insufficient stock: {} available, adjustment {}",
                    row.quantity, delta
                ))
            })?;
        row.quantity = quantity;

        let saved = self.repository.save_inventory(&row).await?;
        self.stock_changed(product_id);
        info!(
            "Adjusted inventory {} by {} to {}",
            saved.id, delta, saved.quantity
        );
        Ok(saved)
    }

    async fn locate(&self, product_id: i64, warehouse_location: &str) -> Result<Inventory> {
        let warehouse_location = warehouse_location.trim();
        self.repository
            .fetch_inventory_at(product_id, warehouse_location)
            .await?
            .ok_or_else(|| {
                Error::not_found(
                    Inventory::NAME,
                    format!("{}@{}", product_id, warehouse_location),
                )
            })
    }

    fn check_quantity(quantity: i64) -> Result<()> {
        if quantity < 0 {
            return Err(Error::InvalidArgument(format!(
                "Quantity cannot be negative: {}",
                quantity
            )));
        }
        Ok(())
    }

    fn stock_changed(&self, product_id: i64) {
        if let Some(sink) = &self.stock_sink {
            debug!("✓ Stock changed for product {}", product_id);
            sink.invalidate_derived(&product_id);
        }
    }
}
