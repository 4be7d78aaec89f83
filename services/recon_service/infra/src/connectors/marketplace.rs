//! Marketplace inventory connector
//!
//! The reference connector: pulls FBA inventory summaries through the
//! rate-limited client, hands the normalised snapshot to the
//! reconciliation engine, and re-emits the engine's open discrepancies in
//! the standardized wire form with a proof bundle attached. Inventory
//! summaries are point-in-time snapshots, so incremental bounds only
//! narrow the other datasets, not this one.

use crate::connectors::proof::build_proof_bundle;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use recon_service_core::domains::discrepancy::DiscrepancyStatus;
use recon_service_core::domains::inventory::SourceItem;
use recon_service_core::dto::standardized::StandardizedDiscrepancy;
use recon_service_core::repositories::inventory::InventoryRepository;
use recon_service_core::services::connector::{
    CollectOutcome, Connector, ConnectorHealth, SourceRunStats,
};
use recon_service_core::services::reconciliation::ReconciliationService;
use shared_error::AppError;
use shared_spapi_client::SpApiClient;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub const MARKETPLACE_CONNECTOR: &str = "marketplace";

pub struct MarketplaceConnector {
    client: Arc<SpApiClient>,
    engine: Arc<dyn ReconciliationService>,
    inventory: Arc<dyn InventoryRepository>,
    marketplace_ids: Vec<String>,
    enabled: bool,
    health: RwLock<ConnectorHealth>,
}

impl MarketplaceConnector {
    pub fn new(
        client: Arc<SpApiClient>,
        engine: Arc<dyn ReconciliationService>,
        inventory: Arc<dyn InventoryRepository>,
        marketplace_ids: Vec<String>,
        enabled: bool,
    ) -> Self {
        Self {
            client,
            engine,
            inventory,
            marketplace_ids,
            enabled,
            health: RwLock::new(ConnectorHealth::default()),
        }
    }

    async fn run(
        &self,
        tenant_id: Uuid,
        since: Option<DateTime<Utc>>,
        cancel: &CancellationToken,
    ) -> Result<CollectOutcome, AppError> {
        if since.is_some() {
            tracing::debug!(
                tenant_id = %tenant_id,
                "Inventory summaries are full snapshots; incremental bound not applicable"
            );
        }

        let source_items: Vec<SourceItem> = {
            let mut stream = self
                .client
                .inventory_summaries(tenant_id, &self.marketplace_ids, cancel);
            let mut items = Vec::new();
            while let Some(summary) = stream.try_next().await.map_err(AppError::from)? {
                items.push(SourceItem {
                    sku: summary.sku,
                    quantity: summary.available_quantity,
                    quantity_reserved: summary.reserved_quantity,
                    unit_price: None,
                    source_system: "marketplace".to_string(),
                    asin: summary.asin,
                    marketplace_id: Some(summary.marketplace_id),
                });
            }
            items
        };

        let outcome = self.engine.reconcile(tenant_id, source_items).await?;

        let marketplace = self.marketplace_ids.first().cloned().unwrap_or_default();
        let mut discrepancies = Vec::new();
        for record in &outcome.discrepancies {
            // Auto-resolved records stay internal; only open ones are
            // claim candidates.
            if record.status != DiscrepancyStatus::Open {
                continue;
            }

            let item = self.inventory.find_by_sku(tenant_id, &record.sku).await?;
            let quantity_synced: i64 = record.source_value.parse().unwrap_or(0);
            let quantity_actual: i64 = record.target_value.parse().unwrap_or(0);

            let mut standardized = StandardizedDiscrepancy::new(
                record.sku.clone(),
                quantity_synced,
                quantity_actual,
                marketplace.clone(),
            );
            standardized.product_id = item.as_ref().and_then(|i| i.asin.clone());
            standardized.confidence = Some(record.confidence);
            standardized.timestamp = record.created_at;
            standardized.metadata.insert(
                "severity".to_string(),
                serde_json::json!(record.severity.to_string()),
            );
            standardized.metadata.insert(
                "kind".to_string(),
                serde_json::json!(record.kind.to_string()),
            );
            standardized.metadata.insert(
                "source_system".to_string(),
                serde_json::json!(record.source_system),
            );
            standardized.metadata.insert(
                "discrepancy_id".to_string(),
                serde_json::json!(record.discrepancy_id.to_string()),
            );
            let proof = build_proof_bundle(item.as_ref(), quantity_synced, quantity_actual);
            standardized
                .metadata
                .insert("proof".to_string(), serde_json::to_value(proof)?);

            discrepancies.push(standardized);
        }

        Ok(CollectOutcome {
            discrepancies,
            stats: SourceRunStats {
                items_processed: outcome.items_processed(),
                created: outcome.created,
                updated: outcome.updated,
                deactivated: outcome.deactivated,
                discrepancies_found: outcome.discrepancies_found(),
                discrepancies_resolved: outcome.resolved,
            },
        })
    }
}

#[async_trait]
impl Connector for MarketplaceConnector {
    fn name(&self) -> &str {
        MARKETPLACE_CONNECTOR
    }

    fn is_enabled(&self) -> bool {
        self.enabled
    }

    async fn health(&self) -> ConnectorHealth {
        self.health.read().await.clone()
    }

    async fn collect_discrepancies(
        &self,
        tenant_id: Uuid,
        since: Option<DateTime<Utc>>,
        cancel: &CancellationToken,
    ) -> Result<CollectOutcome, AppError> {
        let result = self.run(tenant_id, since, cancel).await;

        let mut health = self.health.write().await;
        health.last_run_at = Some(Utc::now());
        health.last_error = match &result {
            Ok(_) => None,
            // Cancellation is not a connector fault
            Err(AppError::Cancelled) => health.last_error.take(),
            Err(e) => Some(e.to_string()),
        };

        result
    }
}
