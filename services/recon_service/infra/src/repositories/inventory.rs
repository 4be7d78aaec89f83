use async_trait::async_trait;
use chrono::{DateTime, Utc};
use recon_service_core::domains::inventory::InventoryItem;
use recon_service_core::repositories::inventory::InventoryRepository;
use shared_error::AppError;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Tenant-partitioned in-memory inventory store
#[derive(Debug, Default)]
pub struct InMemoryInventoryRepository {
    items: RwLock<HashMap<Uuid, BTreeMap<String, InventoryItem>>>,
}

impl InMemoryInventoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InventoryRepository for InMemoryInventoryRepository {
    async fn find_by_sku(
        &self,
        tenant_id: Uuid,
        sku: &str,
    ) -> Result<Option<InventoryItem>, AppError> {
        let items = self.items.read().await;
        Ok(items.get(&tenant_id).and_then(|t| t.get(sku)).cloned())
    }

    async fn list(&self, tenant_id: Uuid) -> Result<Vec<InventoryItem>, AppError> {
        let items = self.items.read().await;
        Ok(items
            .get(&tenant_id)
            .map(|t| t.values().cloned().collect())
            .unwrap_or_default())
    }

    async fn upsert(&self, item: InventoryItem) -> Result<(), AppError> {
        let mut items = self.items.write().await;
        items
            .entry(item.tenant_id)
            .or_default()
            .insert(item.sku.clone(), item);
        Ok(())
    }

    async fn deactivate(&self, tenant_id: Uuid, sku: &str) -> Result<(), AppError> {
        let mut items = self.items.write().await;
        let item = items
            .get_mut(&tenant_id)
            .and_then(|t| t.get_mut(sku))
            .ok_or_else(|| AppError::NotFound(format!("inventory item {}", sku)))?;
        item.is_active = false;
        item.updated_at = Utc::now();
        Ok(())
    }

    async fn update_quantity(
        &self,
        tenant_id: Uuid,
        sku: &str,
        quantity: i64,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut items = self.items.write().await;
        let item = items
            .get_mut(&tenant_id)
            .and_then(|t| t.get_mut(sku))
            .ok_or_else(|| AppError::NotFound(format!("inventory item {}", sku)))?;
        item.quantity_available = quantity.max(0);
        item.last_synced_at = Some(at);
        item.updated_at = at;
        Ok(())
    }

    async fn touch_last_synced(
        &self,
        tenant_id: Uuid,
        sku: &str,
        at: DateTime<Utc>,
    ) -> Result<(), AppError> {
        let mut items = self.items.write().await;
        let item = items
            .get_mut(&tenant_id)
            .and_then(|t| t.get_mut(sku))
            .ok_or_else(|| AppError::NotFound(format!("inventory item {}", sku)))?;
        item.last_synced_at = Some(at);
        Ok(())
    }
}
