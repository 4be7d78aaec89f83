//! Reconciliation rule repository trait

use crate::domains::rules::ReconciliationRule;
use async_trait::async_trait;
use shared_error::AppError;
use uuid::Uuid;

#[async_trait]
pub trait RuleRepository: Send + Sync {
    /// Rules applying to every tenant, in insertion order
    async fn global_rules(&self) -> Result<Vec<ReconciliationRule>, AppError>;

    /// Tenant-scoped rules, in insertion order
    async fn tenant_rules(&self, tenant_id: Uuid) -> Result<Vec<ReconciliationRule>, AppError>;

    async fn upsert(&self, rule: ReconciliationRule) -> Result<(), AppError>;
}
