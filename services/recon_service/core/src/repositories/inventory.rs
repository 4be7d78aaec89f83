//! Inventory repository trait
//!
//! The backing store is opaque; implementations range from in-memory maps
//! to a relational schema. All operations are tenant-scoped.

use crate::domains::inventory::InventoryItem;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared_error::AppError;
use uuid::Uuid;

#[async_trait]
pub trait InventoryRepository: Send + Sync {
    async fn find_by_sku(
        &self,
        tenant_id: Uuid,
        sku: &str,
    ) -> Result<Option<InventoryItem>, AppError>;

    /// Every item for the tenant, active and inactive
    async fn list(&self, tenant_id: Uuid) -> Result<Vec<InventoryItem>, AppError>;

    /// Insert or replace by `(tenant_id, sku)`
    async fn upsert(&self, item: InventoryItem) -> Result<(), AppError>;

    /// Soft delete: the item stays but no longer participates in syncs
    async fn deactivate(&self, tenant_id: Uuid, sku: &str) -> Result<(), AppError>;

    /// Set the available quantity and stamp the sync time
    async fn update_quantity(
        &self,
        tenant_id: Uuid,
        sku: &str,
        quantity: i64,
        at: DateTime<Utc>,
    ) -> Result<(), AppError>;

    /// Refresh only `last_synced_at`
    async fn touch_last_synced(
        &self,
        tenant_id: Uuid,
        sku: &str,
        at: DateTime<Utc>,
    ) -> Result<(), AppError>;
}
