use async_trait::async_trait;
use recon_service_core::domains::discrepancy::{
    Discrepancy, DiscrepancyStatus, DiscrepancySummary, Severity,
};
use recon_service_core::repositories::discrepancy::DiscrepancyRepository;
use shared_error::AppError;
use std::collections::{HashMap, HashSet};
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory discrepancy store with persistence-level dedup on
/// `(tenant, sku, kind, created_at)`
#[derive(Debug, Default)]
pub struct InMemoryDiscrepancyRepository {
    records: RwLock<HashMap<Uuid, Vec<Discrepancy>>>,
    dedup: RwLock<HashSet<(Uuid, String, String, i64)>>,
}

impl InMemoryDiscrepancyRepository {
    pub fn new() -> Self {
        Self::default()
    }

    fn dedup_key(discrepancy: &Discrepancy) -> (Uuid, String, String, i64) {
        (
            discrepancy.tenant_id,
            discrepancy.sku.clone(),
            discrepancy.kind.to_string(),
            discrepancy.created_at.timestamp_millis(),
        )
    }
}

#[async_trait]
impl DiscrepancyRepository for InMemoryDiscrepancyRepository {
    async fn insert(&self, discrepancy: Discrepancy) -> Result<(), AppError> {
        let key = Self::dedup_key(&discrepancy);
        let mut dedup = self.dedup.write().await;
        if !dedup.insert(key) {
            tracing::debug!(
                tenant_id = %discrepancy.tenant_id,
                sku = %discrepancy.sku,
                "Duplicate discrepancy dropped at persistence"
            );
            return Ok(());
        }
        drop(dedup);

        let mut records = self.records.write().await;
        records
            .entry(discrepancy.tenant_id)
            .or_default()
            .push(discrepancy);
        Ok(())
    }

    async fn has_prior(&self, tenant_id: Uuid, sku: &str) -> Result<bool, AppError> {
        let records = self.records.read().await;
        Ok(records
            .get(&tenant_id)
            .map(|r| r.iter().any(|d| d.sku == sku))
            .unwrap_or(false))
    }

    async fn update_status(
        &self,
        tenant_id: Uuid,
        discrepancy_id: Uuid,
        status: DiscrepancyStatus,
    ) -> Result<(), AppError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(&tenant_id)
            .and_then(|r| r.iter_mut().find(|d| d.discrepancy_id == discrepancy_id))
            .ok_or_else(|| AppError::NotFound(format!("discrepancy {}", discrepancy_id)))?;
        record.status = status;
        Ok(())
    }

    async fn list_open(&self, tenant_id: Uuid) -> Result<Vec<Discrepancy>, AppError> {
        let records = self.records.read().await;
        Ok(records
            .get(&tenant_id)
            .map(|r| {
                r.iter()
                    .filter(|d| d.status == DiscrepancyStatus::Open)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn summary(&self, tenant_id: Uuid) -> Result<DiscrepancySummary, AppError> {
        let records = self.records.read().await;
        let mut summary = DiscrepancySummary::default();
        if let Some(records) = records.get(&tenant_id) {
            for record in records {
                match record.status {
                    DiscrepancyStatus::Open => {
                        summary.open += 1;
                        if record.severity == Severity::Critical {
                            summary.critical_open += 1;
                        }
                    },
                    DiscrepancyStatus::Resolved => summary.resolved += 1,
                    DiscrepancyStatus::Suppressed => summary.suppressed += 1,
                }
            }
        }
        Ok(summary)
    }
}
