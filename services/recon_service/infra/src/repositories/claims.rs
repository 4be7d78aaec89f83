use async_trait::async_trait;
use recon_service_core::domains::claim::{AuditEntry, ClaimCandidate, ClaimStatus};
use recon_service_core::repositories::claims::ClaimRepository;
use shared_error::AppError;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// In-memory claim store
#[derive(Debug, Default)]
pub struct InMemoryClaimRepository {
    claims: RwLock<HashMap<Uuid, Vec<ClaimCandidate>>>,
}

impl InMemoryClaimRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ClaimRepository for InMemoryClaimRepository {
    async fn insert(&self, claim: ClaimCandidate) -> Result<(), AppError> {
        let mut claims = self.claims.write().await;
        claims.entry(claim.tenant_id).or_default().push(claim);
        Ok(())
    }

    async fn get(
        &self,
        tenant_id: Uuid,
        claim_id: Uuid,
    ) -> Result<Option<ClaimCandidate>, AppError> {
        let claims = self.claims.read().await;
        Ok(claims
            .get(&tenant_id)
            .and_then(|c| c.iter().find(|claim| claim.claim_id == claim_id))
            .cloned())
    }

    async fn recent_for_sku(
        &self,
        tenant_id: Uuid,
        sku: &str,
        limit: usize,
    ) -> Result<Vec<ClaimCandidate>, AppError> {
        let claims = self.claims.read().await;
        let mut matching: Vec<ClaimCandidate> = claims
            .get(&tenant_id)
            .map(|c| c.iter().filter(|claim| claim.sku == sku).cloned().collect())
            .unwrap_or_default();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching.truncate(limit);
        Ok(matching)
    }

    async fn update_status(
        &self,
        tenant_id: Uuid,
        claim_id: Uuid,
        status: ClaimStatus,
    ) -> Result<(), AppError> {
        let mut claims = self.claims.write().await;
        let claim = claims
            .get_mut(&tenant_id)
            .and_then(|c| c.iter_mut().find(|claim| claim.claim_id == claim_id))
            .ok_or_else(|| AppError::NotFound(format!("claim {}", claim_id)))?;
        claim.status = status;
        Ok(())
    }

    async fn append_audit(
        &self,
        tenant_id: Uuid,
        claim_id: Uuid,
        entry: AuditEntry,
    ) -> Result<(), AppError> {
        let mut claims = self.claims.write().await;
        let claim = claims
            .get_mut(&tenant_id)
            .and_then(|c| c.iter_mut().find(|claim| claim.claim_id == claim_id))
            .ok_or_else(|| AppError::NotFound(format!("claim {}", claim_id)))?;
        claim.audit_trail.push(entry);
        Ok(())
    }
}
