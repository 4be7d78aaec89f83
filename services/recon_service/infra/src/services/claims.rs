//! Claim integration pipeline
//!
//! filter -> batch -> enrich -> value -> document -> classify -> persist
//! -> fan out. Batches run concurrently up to a cap, each batch
//! sequential inside. A detector failure downgrades the claim to a
//! zero-confidence placeholder instead of dropping it; MCDE and
//! notification failures degrade their feature and nothing else.

use crate::clients::{ClaimDetectorClient, McdeClient, RefundEngineClient};
use async_trait::async_trait;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use recon_service_core::domains::claim::{
    assess_risk, determine_claim_type, estimated_payout_at, risk_details, AuditEntry,
    ClaimCandidate, ClaimStatus, ProofItem,
};
use recon_service_core::dto::claims::{ClaimCalculationRequest, ClaimValuation};
use recon_service_core::dto::standardized::StandardizedDiscrepancy;
use recon_service_core::repositories::claims::ClaimRepository;
use recon_service_core::repositories::inventory::InventoryRepository;
use recon_service_core::repositories::sync_log::SyncLogRepository;
use recon_service_core::scoring::quantity_severity;
use recon_service_core::services::claims::{ClaimBatchOutcome, ClaimIntegrationService};
use recon_service_core::services::ports::NotificationPort;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use shared_error::AppError;
use shared_events::{NotificationEvent, NotificationKind};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone)]
pub struct ClaimPipelineConfig {
    pub confidence_threshold: f64,
    pub batch_size: usize,
    pub max_batches_in_flight: usize,
    pub auto_submission: bool,
    pub cache_max_age: Duration,
}

impl Default for ClaimPipelineConfig {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.7,
            batch_size: 10,
            max_batches_in_flight: 4,
            auto_submission: true,
            cache_max_age: Duration::from_secs(86_400),
        }
    }
}

impl ClaimPipelineConfig {
    pub fn from_config(config: &shared_config::Config) -> Self {
        Self {
            confidence_threshold: config.claim_detector_confidence_threshold,
            batch_size: config.claim_detector_batch_size.max(1),
            max_batches_in_flight: config.max_batches_in_flight.max(1),
            auto_submission: config.auto_submission_enabled(),
            cache_max_age: Duration::from_secs(config.job_max_age_secs),
        }
    }
}

pub struct ClaimPipeline {
    config: ClaimPipelineConfig,
    detector: Option<Arc<ClaimDetectorClient>>,
    mcde: Option<Arc<McdeClient>>,
    refund_engine: Option<Arc<RefundEngineClient>>,
    notifications: Arc<dyn NotificationPort>,
    inventory: Arc<dyn InventoryRepository>,
    claims: Arc<dyn ClaimRepository>,
    sync_logs: Arc<dyn SyncLogRepository>,
    cache: Mutex<HashMap<Uuid, (ClaimCandidate, Instant)>>,
}

impl ClaimPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: ClaimPipelineConfig,
        detector: Option<Arc<ClaimDetectorClient>>,
        mcde: Option<Arc<McdeClient>>,
        refund_engine: Option<Arc<RefundEngineClient>>,
        notifications: Arc<dyn NotificationPort>,
        inventory: Arc<dyn InventoryRepository>,
        claims: Arc<dyn ClaimRepository>,
        sync_logs: Arc<dyn SyncLogRepository>,
    ) -> Self {
        Self {
            config,
            detector,
            mcde,
            refund_engine,
            notifications,
            inventory,
            claims,
            sync_logs,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Cached claim lookup; the claims store stays authoritative.
    pub async fn cached_claim(&self, claim_id: Uuid) -> Option<ClaimCandidate> {
        let cache = self.cache.lock().await;
        cache.get(&claim_id).map(|(claim, _)| claim.clone())
    }

    async fn cache_claim(&self, claim: &ClaimCandidate) {
        let mut cache = self.cache.lock().await;
        let max_age = self.config.cache_max_age;
        cache.retain(|_, (_, at)| at.elapsed() < max_age);
        cache.insert(claim.claim_id, (claim.clone(), Instant::now()));
    }

    async fn notify(&self, kind: NotificationKind, tenant_id: Uuid, data: serde_json::Value) {
        let event = NotificationEvent::new(kind, tenant_id, data);
        if let Err(e) = self.notifications.process_event(event).await {
            tracing::warn!(error = %e, "Notification failed; claim unaffected");
        }
    }

    async fn process_batch(
        &self,
        tenant_id: Uuid,
        sync_job_id: Uuid,
        batch: Vec<StandardizedDiscrepancy>,
    ) -> (Vec<ClaimCandidate>, Vec<String>) {
        let mut claims = Vec::new();
        let mut errors = Vec::new();
        for discrepancy in batch {
            match self.process_one(tenant_id, sync_job_id, &discrepancy).await {
                Ok(claim) => claims.push(claim),
                Err(e) => {
                    tracing::error!(
                        tenant_id = %tenant_id,
                        sku = %discrepancy.sku,
                        error = %e,
                        "Claim processing failed for discrepancy"
                    );
                    errors.push(format!("{}: {}", discrepancy.sku, e));
                },
            }
        }
        (claims, errors)
    }

    async fn process_one(
        &self,
        tenant_id: Uuid,
        sync_job_id: Uuid,
        discrepancy: &StandardizedDiscrepancy,
    ) -> Result<ClaimCandidate, AppError> {
        let item = self.inventory.find_by_sku(tenant_id, &discrepancy.sku).await?;
        let recent_syncs = self.sync_logs.list(tenant_id, 5).await?;
        let history = self
            .claims
            .recent_for_sku(tenant_id, &discrepancy.sku, 10)
            .await?;

        let inventory_context = serde_json::json!({
            "quantity_available": item.as_ref().map(|i| i.quantity_available),
            "quantity_reserved": item.as_ref().map(|i| i.quantity_reserved),
            "reorder_point": item.as_ref().map(|i| i.reorder_point),
            "selling_price": item.as_ref().and_then(|i| i.selling_price).and_then(|p| p.to_f64()),
            "cost_price": item.as_ref().and_then(|i| i.cost_price).and_then(|p| p.to_f64()),
            "asin": item.as_ref().and_then(|i| i.asin.clone()),
            "marketplace_id": item.as_ref().and_then(|i| i.marketplace_id.clone()),
            "recent_syncs": recent_syncs.iter().map(|log| serde_json::json!({
                "provider": log.provider,
                "completed_at": log.completed_at,
                "state": log.state.to_string(),
            })).collect::<Vec<_>>(),
        });
        let historical_data = serde_json::json!(history
            .iter()
            .map(|claim| serde_json::json!({
                "claim_id": claim.claim_id,
                "amount": claim.amount.to_f64(),
                "status": claim.status.to_string(),
                "created_at": claim.created_at,
            }))
            .collect::<Vec<_>>());

        let request = ClaimCalculationRequest {
            discrepancy_data: discrepancy.clone(),
            inventory_context,
            historical_data,
        };

        let valuation: Option<ClaimValuation> = match &self.detector {
            Some(detector) => match detector.calculate(&request).await {
                Ok(valuation) => Some(valuation),
                Err(e) => {
                    tracing::warn!(
                        tenant_id = %tenant_id,
                        sku = %discrepancy.sku,
                        error = %e,
                        "Claim detector unavailable, emitting placeholder claim"
                    );
                    None
                },
            },
            None => None,
        };

        let severity = discrepancy
            .severity_hint()
            .unwrap_or_else(|| quantity_severity(discrepancy.discrepancy_amount));
        let now = Utc::now();

        let (claim_id, amount, currency, confidence, status, valuation_proof) = match &valuation {
            Some(v) => (
                v.claim_id
                    .as_deref()
                    .and_then(|id| Uuid::parse_str(id).ok())
                    .unwrap_or_else(Uuid::new_v4),
                Decimal::from_f64_retain(v.claim_amount.max(0.0)).unwrap_or(Decimal::ZERO),
                v.currency.clone(),
                v.confidence,
                ClaimStatus::Validated,
                v.proof.clone(),
            ),
            None => (
                Uuid::new_v4(),
                Decimal::ZERO,
                discrepancy.currency.clone(),
                0.0,
                ClaimStatus::Pending,
                None,
            ),
        };

        let mut evidence: Vec<ProofItem> = discrepancy
            .metadata
            .get("proof")
            .cloned()
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default();
        if let Some(proof) = valuation_proof {
            evidence.push(ProofItem::new("claim_valuation", proof));
        }

        let mut audit_trail = vec![AuditEntry::new(
            "detected",
            format!("sync job {}", sync_job_id),
        )];
        audit_trail.push(match &valuation {
            Some(v) => AuditEntry::new("valued", format!("{} {}", v.claim_amount, currency)),
            None => AuditEntry::new("valuation_failed", "placeholder claim emitted"),
        });

        // Proof document is optional: a dead MCDE costs the document, not
        // the claim.
        if let (Some(mcde), true) = (&self.mcde, valuation.is_some()) {
            match mcde
                .generate_document(&claim_id.to_string(), amount.to_f64().unwrap_or(0.0))
                .await
            {
                Ok(document_url) => {
                    evidence.push(ProofItem::new(
                        "mcde_document",
                        serde_json::json!({"document_url": document_url}),
                    ));
                    audit_trail.push(AuditEntry::new("document_generated", document_url.clone()));
                    self.notify(
                        NotificationKind::ProofGenerated,
                        tenant_id,
                        serde_json::json!({"claimId": claim_id, "documentUrl": document_url}),
                    )
                    .await;
                },
                Err(e) => {
                    tracing::warn!(
                        claim_id = %claim_id,
                        error = %e,
                        "MCDE unavailable, claim proceeds without cost document"
                    );
                },
            }
        }

        let risk = assess_risk(severity, confidence);
        let (risk_factors, mitigation_steps) = risk_details(severity, confidence);
        let kind = determine_claim_type(
            &discrepancy.kind_hint().to_string(),
            discrepancy.discrepancy_amount,
        );

        let mut claim = ClaimCandidate {
            claim_id,
            tenant_id,
            discrepancy_id: discrepancy.discrepancy_id().unwrap_or_else(Uuid::now_v7),
            sku: discrepancy.sku.clone(),
            kind,
            amount,
            currency,
            confidence,
            status,
            estimated_payout_at: estimated_payout_at(severity, confidence, now),
            risk,
            risk_factors,
            mitigation_steps,
            evidence,
            audit_trail,
            created_at: now,
        };

        self.claims.insert(claim.clone()).await?;
        self.cache_claim(&claim).await;

        self.notify(
            NotificationKind::ClaimDetected,
            tenant_id,
            serde_json::json!({
                "claimId": claim.claim_id,
                "sku": claim.sku,
                "amount": claim.amount.to_f64(),
                "currency": claim.currency,
                "risk": claim.risk.to_string(),
            }),
        )
        .await;

        if self.config.auto_submission && claim.status == ClaimStatus::Validated {
            if let Some(refund_engine) = &self.refund_engine {
                match refund_engine.submit(tenant_id, &claim).await {
                    Ok(()) => {
                        self.claims
                            .update_status(tenant_id, claim.claim_id, ClaimStatus::Submitted)
                            .await?;
                        self.claims
                            .append_audit(
                                tenant_id,
                                claim.claim_id,
                                AuditEntry::new("submitted", "refund engine accepted"),
                            )
                            .await?;
                        claim.status = ClaimStatus::Submitted;
                        self.notify(
                            NotificationKind::ClaimSubmitted,
                            tenant_id,
                            serde_json::json!({"claimId": claim.claim_id, "sku": claim.sku}),
                        )
                        .await;
                    },
                    Err(e) => {
                        tracing::warn!(
                            claim_id = %claim.claim_id,
                            error = %e,
                            "Refund engine submission failed, claim stays validated"
                        );
                        self.claims
                            .append_audit(
                                tenant_id,
                                claim.claim_id,
                                AuditEntry::new("submission_failed", e.to_string()),
                            )
                            .await?;
                    },
                }
            }
        }

        Ok(claim)
    }
}

#[async_trait]
impl ClaimIntegrationService for ClaimPipeline {
    async fn process(
        &self,
        tenant_id: Uuid,
        sync_job_id: Uuid,
        discrepancies: &[StandardizedDiscrepancy],
    ) -> Result<ClaimBatchOutcome, AppError> {
        let mut outcome = ClaimBatchOutcome::default();
        let mut seen: HashSet<String> = HashSet::new();
        let mut eligible = Vec::new();

        for discrepancy in discrepancies {
            let discrepancy = discrepancy.clone().normalise();
            if let Err(e) = discrepancy.validate() {
                outcome.errors.push(format!("invalid discrepancy: {}", e));
                continue;
            }
            // One claim per source discrepancy per sync
            let key = discrepancy
                .discrepancy_id()
                .map(|id| id.to_string())
                .unwrap_or_else(|| {
                    format!("{}:{}", discrepancy.sku, discrepancy.kind_hint())
                });
            if !seen.insert(key) {
                continue;
            }
            if discrepancy.confidence.unwrap_or(1.0) < self.config.confidence_threshold {
                outcome.skipped += 1;
                continue;
            }
            eligible.push(discrepancy);
        }

        let batches: Vec<Vec<StandardizedDiscrepancy>> = eligible
            .chunks(self.config.batch_size)
            .map(|chunk| chunk.to_vec())
            .collect();

        let results: Vec<(Vec<ClaimCandidate>, Vec<String>)> = stream::iter(
            batches
                .into_iter()
                .map(|batch| self.process_batch(tenant_id, sync_job_id, batch)),
        )
        .buffer_unordered(self.config.max_batches_in_flight)
        .collect()
        .await;

        for (claims, errors) in results {
            outcome.claims.extend(claims);
            outcome.errors.extend(errors);
        }

        tracing::info!(
            tenant_id = %tenant_id,
            sync_job_id = %sync_job_id,
            claims = %outcome.claims.len(),
            skipped = %outcome.skipped,
            errors = %outcome.errors.len(),
            "Claim pipeline finished"
        );
        Ok(outcome)
    }
}
