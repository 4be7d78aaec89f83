//! Discrepancy repository trait

use crate::domains::discrepancy::{Discrepancy, DiscrepancyStatus, DiscrepancySummary};
use async_trait::async_trait;
use shared_error::AppError;
use uuid::Uuid;

#[async_trait]
pub trait DiscrepancyRepository: Send + Sync {
    /// Insert one record. Duplicate `(tenant, sku, kind, created_at)`
    /// inserts are dropped silently so one run emits at most one record
    /// per sku and kind.
    async fn insert(&self, discrepancy: Discrepancy) -> Result<(), AppError>;

    /// Whether the sku has any previously recorded discrepancy
    async fn has_prior(&self, tenant_id: Uuid, sku: &str) -> Result<bool, AppError>;

    async fn update_status(
        &self,
        tenant_id: Uuid,
        discrepancy_id: Uuid,
        status: DiscrepancyStatus,
    ) -> Result<(), AppError>;

    async fn list_open(&self, tenant_id: Uuid) -> Result<Vec<Discrepancy>, AppError>;

    async fn summary(&self, tenant_id: Uuid) -> Result<DiscrepancySummary, AppError>;
}
