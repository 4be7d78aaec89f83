//! Connector registry
//!
//! Holds the ordered connector list. Ordering matters only for the
//! observable per-source counters; sources run sequentially inside one
//! job because the marketplace rate budget is shared per seller.

pub mod marketplace;
pub mod proof;

pub use marketplace::{MarketplaceConnector, MARKETPLACE_CONNECTOR};

use chrono::{DateTime, Utc};
use recon_service_core::services::connector::{CollectOutcome, Connector, ConnectorHealth};
use serde::{Deserialize, Serialize};
use shared_error::AppError;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Health rollup entry for one connector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectorReport {
    pub name: String,
    pub enabled: bool,
    pub healthy: bool,
    pub last_run_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

#[derive(Default)]
pub struct ConnectorRegistry {
    connectors: Vec<Arc<dyn Connector>>,
}

impl ConnectorRegistry {
    pub fn new(connectors: Vec<Arc<dyn Connector>>) -> Self {
        Self { connectors }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Connector>> {
        self.connectors.iter().find(|c| c.name() == name).cloned()
    }

    /// Names of enabled connectors, in registry order
    pub fn enabled_names(&self) -> Vec<String> {
        self.connectors
            .iter()
            .filter(|c| c.is_enabled())
            .map(|c| c.name().to_string())
            .collect()
    }

    /// Invoke every enabled connector sequentially; failures stay
    /// per-source and never abort the walk.
    pub async fn run_all(
        &self,
        tenant_id: Uuid,
        since: Option<DateTime<Utc>>,
        cancel: &CancellationToken,
    ) -> Vec<(String, Result<CollectOutcome, AppError>)> {
        let mut results = Vec::new();
        for connector in &self.connectors {
            if !connector.is_enabled() {
                continue;
            }
            if cancel.is_cancelled() {
                results.push((connector.name().to_string(), Err(AppError::Cancelled)));
                break;
            }
            let result = connector.collect_discrepancies(tenant_id, since, cancel).await;
            results.push((connector.name().to_string(), result));
        }
        results
    }

    /// Per-connector health; a connector with a `last_error` reports
    /// unhealthy while the service itself stays up.
    pub async fn health_report(&self) -> Vec<ConnectorReport> {
        let mut report = Vec::new();
        for connector in &self.connectors {
            let health: ConnectorHealth = connector.health().await;
            report.push(ConnectorReport {
                name: connector.name().to_string(),
                enabled: connector.is_enabled(),
                healthy: health.healthy(),
                last_run_at: health.last_run_at,
                last_error: health.last_error,
            });
        }
        report
    }
}
