//! Claim repository trait

use crate::domains::claim::{AuditEntry, ClaimCandidate, ClaimStatus};
use async_trait::async_trait;
use shared_error::AppError;
use uuid::Uuid;

#[async_trait]
pub trait ClaimRepository: Send + Sync {
    async fn insert(&self, claim: ClaimCandidate) -> Result<(), AppError>;

    async fn get(&self, tenant_id: Uuid, claim_id: Uuid)
        -> Result<Option<ClaimCandidate>, AppError>;

    /// Most recent claims for a sku, reverse chronological
    async fn recent_for_sku(
        &self,
        tenant_id: Uuid,
        sku: &str,
        limit: usize,
    ) -> Result<Vec<ClaimCandidate>, AppError>;

    async fn update_status(
        &self,
        tenant_id: Uuid,
        claim_id: Uuid,
        status: ClaimStatus,
    ) -> Result<(), AppError>;

    /// Append to the claim's audit trail
    async fn append_audit(
        &self,
        tenant_id: Uuid,
        claim_id: Uuid,
        entry: AuditEntry,
    ) -> Result<(), AppError>;
}
