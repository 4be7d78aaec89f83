//! Sync log repository trait
//!
//! Append-only history of finished syncs; the incremental path reads the
//! latest completed entry per source to derive its `since` bound.

use crate::domains::sync::SyncLog;
use async_trait::async_trait;
use shared_error::AppError;
use uuid::Uuid;

#[async_trait]
pub trait SyncLogRepository: Send + Sync {
    async fn append(&self, log: SyncLog) -> Result<(), AppError>;

    /// Latest completed entry for `(tenant, provider)`, if any
    async fn latest_completed(
        &self,
        tenant_id: Uuid,
        provider: &str,
    ) -> Result<Option<SyncLog>, AppError>;

    /// Recent history, newest first
    async fn list(&self, tenant_id: Uuid, limit: usize) -> Result<Vec<SyncLog>, AppError>;
}
