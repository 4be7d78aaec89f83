use async_trait::async_trait;
use recon_service_core::domains::sync::{JobState, SyncLog};
use recon_service_core::repositories::sync_log::SyncLogRepository;
use shared_error::AppError;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Append-only in-memory sync history
#[derive(Debug, Default)]
pub struct InMemorySyncLogRepository {
    logs: RwLock<HashMap<Uuid, Vec<SyncLog>>>,
}

impl InMemorySyncLogRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SyncLogRepository for InMemorySyncLogRepository {
    async fn append(&self, log: SyncLog) -> Result<(), AppError> {
        let mut logs = self.logs.write().await;
        logs.entry(log.tenant_id).or_default().push(log);
        Ok(())
    }

    async fn latest_completed(
        &self,
        tenant_id: Uuid,
        provider: &str,
    ) -> Result<Option<SyncLog>, AppError> {
        let logs = self.logs.read().await;
        Ok(logs
            .get(&tenant_id)
            .and_then(|logs| {
                logs.iter()
                    .filter(|l| l.provider == provider && l.state == JobState::Completed)
                    .max_by_key(|l| l.completed_at)
            })
            .cloned())
    }

    async fn list(&self, tenant_id: Uuid, limit: usize) -> Result<Vec<SyncLog>, AppError> {
        let logs = self.logs.read().await;
        let mut result: Vec<SyncLog> = logs.get(&tenant_id).cloned().unwrap_or_default();
        result.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        result.truncate(limit);
        Ok(result)
    }
}
