//! Upstream connector capability
//!
//! A connector is a pluggable source of discrepancies with a uniform
//! contract: no inheritance, just this capability set implemented by
//! concrete values.

use crate::dto::standardized::StandardizedDiscrepancy;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared_error::AppError;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Last-run health of a connector
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectorHealth {
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

impl ConnectorHealth {
    pub fn healthy(&self) -> bool {
        self.last_error.is_none()
    }
}

/// Per-source counters reported alongside collected discrepancies
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SourceRunStats {
    pub items_processed: usize,
    pub created: usize,
    pub updated: usize,
    pub deactivated: usize,
    pub discrepancies_found: usize,
    pub discrepancies_resolved: usize,
}

/// One connector run
#[derive(Debug, Clone, Default)]
pub struct CollectOutcome {
    pub discrepancies: Vec<StandardizedDiscrepancy>,
    pub stats: SourceRunStats,
}

#[async_trait]
pub trait Connector: Send + Sync {
    fn name(&self) -> &str;

    fn is_enabled(&self) -> bool;

    async fn health(&self) -> ConnectorHealth;

    /// Collect discrepancies for a tenant. `since` bounds incremental
    /// runs; `None` means a full pass.
    async fn collect_discrepancies(
        &self,
        tenant_id: Uuid,
        since: Option<DateTime<Utc>>,
        cancel: &CancellationToken,
    ) -> Result<CollectOutcome, AppError>;
}
