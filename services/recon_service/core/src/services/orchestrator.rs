//! Sync orchestration trait

use crate::domains::sync::{SyncJob, SyncJobKind};
use async_trait::async_trait;
use shared_error::AppError;
use uuid::Uuid;

#[async_trait]
pub trait SyncService: Send + Sync {
    /// Create and enqueue a job; returns its id immediately while
    /// execution proceeds in the background.
    async fn start_sync_job(
        &self,
        tenant_id: Uuid,
        kind: SyncJobKind,
        sources: Vec<String>,
    ) -> Result<Uuid, AppError>;

    /// Cooperatively cancel a running job. Only `Running` jobs
    /// transition; anything else is a validation error.
    async fn cancel(&self, job_id: Uuid) -> Result<(), AppError>;

    async fn get_job(&self, job_id: Uuid) -> Result<Option<SyncJob>, AppError>;

    async fn list_jobs(&self, tenant_id: Uuid) -> Result<Vec<SyncJob>, AppError>;
}
