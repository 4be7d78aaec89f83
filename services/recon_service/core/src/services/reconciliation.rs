//! Reconciliation engine trait
//!
//! Turns a tenant's upstream snapshot into inventory mutations plus a
//! graded discrepancy stream.

use crate::domains::discrepancy::{Discrepancy, DiscrepancySummary};
use crate::domains::inventory::SourceItem;
use async_trait::async_trait;
use shared_error::AppError;
use uuid::Uuid;

/// Counters and records produced by one reconcile pass.
/// `items_processed = created + updated + no_change` always holds.
#[derive(Debug, Clone, Default)]
pub struct ReconcileOutcome {
    pub created: usize,
    pub updated: usize,
    pub no_change: usize,
    pub deactivated: usize,
    /// Every discrepancy recorded this pass, resolved ones included
    pub discrepancies: Vec<Discrepancy>,
    pub resolved: usize,
    /// Malformed source records skipped and counted, never fatal
    pub skipped_invalid: usize,
}

impl ReconcileOutcome {
    pub fn items_processed(&self) -> usize {
        self.created + self.updated + self.no_change
    }

    pub fn discrepancies_found(&self) -> usize {
        self.discrepancies.len()
    }
}

#[async_trait]
pub trait ReconciliationService: Send + Sync {
    /// Reconcile one tenant's source snapshot against internal state.
    ///
    /// Creates missing items, grades differences, soft-deletes items
    /// absent upstream, and auto-resolves low-severity discrepancies when
    /// rules allow.
    async fn reconcile(
        &self,
        tenant_id: Uuid,
        source_items: Vec<SourceItem>,
    ) -> Result<ReconcileOutcome, AppError>;

    /// Current discrepancy rollup for the tenant
    async fn summary(&self, tenant_id: Uuid) -> Result<DiscrepancySummary, AppError>;
}
