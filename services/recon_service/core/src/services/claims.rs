//! Claim integration trait
//!
//! Converts a discrepancy stream into valued, risk-graded claim
//! candidates routed to the downstream claim services.

use crate::domains::claim::ClaimCandidate;
use crate::dto::standardized::StandardizedDiscrepancy;
use async_trait::async_trait;
use shared_error::AppError;
use uuid::Uuid;

/// Result of one claim pipeline run for a sync job
#[derive(Debug, Clone, Default)]
pub struct ClaimBatchOutcome {
    pub claims: Vec<ClaimCandidate>,
    /// Discrepancies below the confidence threshold
    pub skipped: usize,
    /// Batch-level failures; the enclosing sync is never aborted by these
    pub errors: Vec<String>,
}

#[async_trait]
pub trait ClaimIntegrationService: Send + Sync {
    /// Run the full pipeline: filter, batch, enrich, value, document,
    /// classify, persist and fan out. Each source discrepancy yields at
    /// most one claim per sync job.
    async fn process(
        &self,
        tenant_id: Uuid,
        sync_job_id: Uuid,
        discrepancies: &[StandardizedDiscrepancy],
    ) -> Result<ClaimBatchOutcome, AppError>;
}
