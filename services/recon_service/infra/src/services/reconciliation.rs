//! Reconciliation engine
//!
//! One pass per tenant: create what's new upstream, grade what differs,
//! soft-delete what vanished, auto-resolve what the rules allow. The
//! scoring itself is pure (`recon_service_core::scoring`); this service
//! threads repositories around it.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use recon_service_core::domains::discrepancy::{
    Discrepancy, DiscrepancyStatus, DiscrepancySummary, Severity,
};
use recon_service_core::domains::inventory::{InventoryItem, SourceItem};
use recon_service_core::domains::rules::{resolve_rules, ReconciliationRule, RuleContext};
use recon_service_core::repositories::discrepancy::DiscrepancyRepository;
use recon_service_core::repositories::inventory::InventoryRepository;
use recon_service_core::repositories::rules::RuleRepository;
use recon_service_core::scoring::{analyze_quantity, AnalysisContext};
use recon_service_core::services::reconciliation::{ReconcileOutcome, ReconciliationService};
use shared_error::AppError;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use uuid::Uuid;

const TARGET_SYSTEM: &str = "internal";

pub struct ReconEngine {
    inventory: Arc<dyn InventoryRepository>,
    discrepancies: Arc<dyn DiscrepancyRepository>,
    rules: Arc<dyn RuleRepository>,
}

impl ReconEngine {
    pub fn new(
        inventory: Arc<dyn InventoryRepository>,
        discrepancies: Arc<dyn DiscrepancyRepository>,
        rules: Arc<dyn RuleRepository>,
    ) -> Self {
        Self {
            inventory,
            discrepancies,
            rules,
        }
    }

    async fn reconcile_existing(
        &self,
        tenant_id: Uuid,
        rules: &[ReconciliationRule],
        source: &SourceItem,
        item: &InventoryItem,
        now: DateTime<Utc>,
        outcome: &mut ReconcileOutcome,
    ) -> Result<(), AppError> {
        let has_prior = self.discrepancies.has_prior(tenant_id, &source.sku).await?;

        let mut fields = BTreeMap::new();
        fields.insert("sku".to_string(), serde_json::json!(source.sku));
        fields.insert(
            "quantity_synced".to_string(),
            serde_json::json!(source.quantity),
        );
        fields.insert(
            "quantity_actual".to_string(),
            serde_json::json!(item.quantity_available),
        );
        fields.insert(
            "diff".to_string(),
            serde_json::json!((source.quantity - item.quantity_available).abs()),
        );
        let rule_context = RuleContext {
            source_system: source.source_system.clone(),
            target_system: TARGET_SYSTEM.to_string(),
            fields,
        };
        let analysis = AnalysisContext {
            source_system: source.source_system.clone(),
            has_prior_discrepancy: has_prior,
            unit_price: item.selling_price.or(source.unit_price),
        };

        let Some(draft) = analyze_quantity(
            source.quantity,
            item.quantity_available,
            rules,
            &rule_context,
            &analysis,
        ) else {
            self.inventory
                .touch_last_synced(tenant_id, &source.sku, now)
                .await?;
            outcome.no_change += 1;
            return Ok(());
        };

        let status = if draft.auto_resolvable {
            DiscrepancyStatus::Resolved
        } else {
            DiscrepancyStatus::Open
        };
        let discrepancy = Discrepancy {
            discrepancy_id: Uuid::now_v7(),
            tenant_id,
            sku: source.sku.clone(),
            kind: draft.kind,
            source_system: source.source_system.clone(),
            source_value: source.quantity.to_string(),
            target_system: TARGET_SYSTEM.to_string(),
            target_value: item.quantity_available.to_string(),
            severity: draft.severity,
            confidence: draft.confidence,
            impact_score: draft.impact_score,
            suggested_action: draft.suggested_action,
            status,
            created_at: now,
        };
        self.discrepancies.insert(discrepancy.clone()).await?;

        if draft.auto_resolvable || draft.severity > Severity::Low {
            // Accept the source value: auto-resolution and anything worth
            // investigating both converge the target onto the source.
            self.inventory
                .update_quantity(tenant_id, &source.sku, source.quantity, now)
                .await?;
            outcome.updated += 1;
            if draft.auto_resolvable {
                outcome.resolved += 1;
            }
        } else {
            self.inventory
                .touch_last_synced(tenant_id, &source.sku, now)
                .await?;
            outcome.no_change += 1;
        }

        outcome.discrepancies.push(discrepancy);
        Ok(())
    }
}

#[async_trait]
impl ReconciliationService for ReconEngine {
    async fn reconcile(
        &self,
        tenant_id: Uuid,
        source_items: Vec<SourceItem>,
    ) -> Result<ReconcileOutcome, AppError> {
        let rules = resolve_rules(
            &self.rules.global_rules().await?,
            &self.rules.tenant_rules(tenant_id).await?,
        );
        let existing_by_sku: HashMap<String, InventoryItem> = self
            .inventory
            .list(tenant_id)
            .await?
            .into_iter()
            .map(|item| (item.sku.clone(), item))
            .collect();

        let now = Utc::now();
        let mut outcome = ReconcileOutcome::default();
        let mut seen: HashSet<String> = HashSet::new();

        for source in source_items {
            if source.sku.trim().is_empty() {
                tracing::warn!(tenant_id = %tenant_id, "Source record without sku skipped");
                outcome.skipped_invalid += 1;
                continue;
            }
            // At most one record per sku per run
            if !seen.insert(source.sku.clone()) {
                outcome.skipped_invalid += 1;
                continue;
            }

            match existing_by_sku.get(&source.sku) {
                None => {
                    self.inventory
                        .upsert(InventoryItem::from_source(tenant_id, &source, now))
                        .await?;
                    outcome.created += 1;
                },
                Some(item) => {
                    self.reconcile_existing(tenant_id, &rules, &source, item, now, &mut outcome)
                        .await?;
                },
            }
        }

        // Soft-delete items that vanished upstream; already-inactive ones
        // stay as they are and are never re-activated by this pass.
        for (sku, item) in &existing_by_sku {
            if !seen.contains(sku) && item.is_active {
                self.inventory.deactivate(tenant_id, sku).await?;
                outcome.deactivated += 1;
            }
        }

        tracing::info!(
            tenant_id = %tenant_id,
            items_processed = %outcome.items_processed(),
            created = %outcome.created,
            updated = %outcome.updated,
            deactivated = %outcome.deactivated,
            discrepancies = %outcome.discrepancies_found(),
            resolved = %outcome.resolved,
            "Reconcile pass finished"
        );
        Ok(outcome)
    }

    async fn summary(&self, tenant_id: Uuid) -> Result<DiscrepancySummary, AppError> {
        self.discrepancies.summary(tenant_id).await
    }
}
