//! Claim pipeline behaviour against fake downstream services

use crate::clients::{
    ClaimDetectorClient, McdeClient, RecordingNotificationPort, RefundEngineClient,
};
use crate::repositories::{
    InMemoryClaimRepository, InMemoryInventoryRepository, InMemorySyncLogRepository,
};
use crate::services::claims::{ClaimPipeline, ClaimPipelineConfig};
use chrono::Utc;
use recon_service_core::domains::claim::{ClaimKind, ClaimStatus, RiskLevel};
use recon_service_core::domains::inventory::{InventoryItem, SourceItem};
use recon_service_core::dto::standardized::StandardizedDiscrepancy;
use recon_service_core::repositories::claims::ClaimRepository;
use recon_service_core::repositories::inventory::InventoryRepository;
use recon_service_core::services::claims::ClaimIntegrationService;
use shared_events::NotificationKind;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

struct Harness {
    pipeline: ClaimPipeline,
    claims: Arc<InMemoryClaimRepository>,
    notifications: Arc<RecordingNotificationPort>,
    inventory: Arc<InMemoryInventoryRepository>,
}

struct HarnessOptions {
    detector: Option<String>,
    mcde: Option<String>,
    refund_engine: Option<String>,
    auto_submission: bool,
}

impl Default for HarnessOptions {
    fn default() -> Self {
        Self {
            detector: None,
            mcde: None,
            refund_engine: None,
            auto_submission: false,
        }
    }
}

fn harness(options: HarnessOptions) -> Harness {
    let inventory = Arc::new(InMemoryInventoryRepository::new());
    let claims = Arc::new(InMemoryClaimRepository::new());
    let sync_logs = Arc::new(InMemorySyncLogRepository::new());
    let notifications = Arc::new(RecordingNotificationPort::new());

    let timeout = Duration::from_secs(5);
    let pipeline = ClaimPipeline::new(
        ClaimPipelineConfig {
            auto_submission: options.auto_submission,
            ..ClaimPipelineConfig::default()
        },
        options
            .detector
            .map(|url| Arc::new(ClaimDetectorClient::new(url, None, timeout).unwrap())),
        options
            .mcde
            .map(|url| Arc::new(McdeClient::new(url, None, timeout).unwrap())),
        options
            .refund_engine
            .map(|url| Arc::new(RefundEngineClient::new(url, None, timeout).unwrap())),
        notifications.clone(),
        inventory.clone(),
        claims.clone(),
        sync_logs,
    );

    Harness {
        pipeline,
        claims,
        notifications,
        inventory,
    }
}

fn discrepancy(sku: &str, synced: i64, actual: i64, confidence: f64) -> StandardizedDiscrepancy {
    let mut d = StandardizedDiscrepancy::new(
        sku.to_string(),
        synced,
        actual,
        "ATVPDKIKX0DER".to_string(),
    );
    d.confidence = Some(confidence);
    d.metadata.insert(
        "discrepancy_id".to_string(),
        serde_json::json!(Uuid::now_v7().to_string()),
    );
    d.metadata
        .insert("kind".to_string(), serde_json::json!("quantity"));
    d
}

async fn seed_item(h: &Harness, tenant: Uuid, sku: &str, quantity: i64) {
    let source = SourceItem {
        sku: sku.to_string(),
        quantity,
        quantity_reserved: 0,
        unit_price: None,
        source_system: "marketplace".to_string(),
        asin: Some("B00000001".to_string()),
        marketplace_id: Some("ATVPDKIKX0DER".to_string()),
    };
    h.inventory
        .upsert(InventoryItem::from_source(tenant, &source, Utc::now()))
        .await
        .unwrap();
}

fn detector_response(amount: f64, confidence: f64) -> serde_json::Value {
    serde_json::json!({
        "claim_id": Uuid::new_v4().to_string(),
        "claim_amount": amount,
        "currency": "USD",
        "confidence": confidence,
        "net_gain": amount * 0.2,
        "proof": {"basis": "fba_ledger"}
    })
}

#[tokio::test]
async fn test_low_confidence_discrepancies_are_skipped() {
    let h = harness(HarnessOptions::default());
    let tenant = Uuid::now_v7();

    let outcome = h
        .pipeline
        .process(
            tenant,
            Uuid::now_v7(),
            &[discrepancy("SKU-1", 12, 10, 0.5)],
        )
        .await
        .unwrap();

    assert!(outcome.claims.is_empty());
    assert_eq!(outcome.skipped, 1);
}

#[tokio::test]
async fn test_valued_claim_is_classified_and_validated() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/evidence/claims/calculate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(detector_response(487.5, 0.95)))
        .expect(1)
        .mount(&server)
        .await;

    let h = harness(HarnessOptions {
        detector: Some(server.uri()),
        ..HarnessOptions::default()
    });
    let tenant = Uuid::now_v7();
    seed_item(&h, tenant, "SKU-1", 5).await;

    let mut d = discrepancy("SKU-1", 200, 5, 0.855);
    d.metadata
        .insert("severity".to_string(), serde_json::json!("critical"));

    let outcome = h.pipeline.process(tenant, Uuid::now_v7(), &[d]).await.unwrap();

    assert_eq!(outcome.claims.len(), 1);
    let claim = &outcome.claims[0];
    // marketplace over internal means an overcharge claim
    assert_eq!(claim.kind, ClaimKind::Overcharge);
    assert_eq!(claim.status, ClaimStatus::Validated);
    assert!((claim.confidence - 0.95).abs() < f64::EPSILON);
    // critical severity grades high risk regardless of confidence
    assert_eq!(claim.risk, RiskLevel::High);
    // 30 base days * 0.8 confident multiplier
    let days = (claim.estimated_payout_at - claim.created_at).num_days();
    assert!((23..=24).contains(&days));

    // claim_detected notification carried the claim id
    let events = h.notifications.events().await;
    assert!(events
        .iter()
        .any(|e| e.kind == NotificationKind::ClaimDetected));
}

#[tokio::test]
async fn test_missing_units_direction() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/evidence/claims/calculate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(detector_response(100.0, 0.9)))
        .mount(&server)
        .await;

    let h = harness(HarnessOptions {
        detector: Some(server.uri()),
        ..HarnessOptions::default()
    });
    let tenant = Uuid::now_v7();

    let outcome = h
        .pipeline
        .process(tenant, Uuid::now_v7(), &[discrepancy("SKU-1", 5, 9, 0.9)])
        .await
        .unwrap();
    assert_eq!(outcome.claims[0].kind, ClaimKind::MissingUnits);
}

#[tokio::test]
async fn test_detector_down_emits_placeholder() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/evidence/claims/calculate"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let h = harness(HarnessOptions {
        detector: Some(server.uri()),
        ..HarnessOptions::default()
    });
    let tenant = Uuid::now_v7();

    let outcome = h
        .pipeline
        .process(tenant, Uuid::now_v7(), &[discrepancy("SKU-1", 12, 10, 0.9)])
        .await
        .unwrap();

    // nothing silently dropped: the claim exists, worthless until reviewed
    assert_eq!(outcome.claims.len(), 1);
    let claim = &outcome.claims[0];
    assert_eq!(claim.status, ClaimStatus::Pending);
    assert_eq!(claim.confidence, 0.0);
    assert_eq!(claim.risk, RiskLevel::High);
    assert_eq!(claim.amount, rust_decimal::Decimal::ZERO);
    assert!(h.claims.get(tenant, claim.claim_id).await.unwrap().is_some());
}

#[tokio::test]
async fn test_mcde_document_attached_when_up() {
    let detector = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/evidence/claims/calculate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(detector_response(250.0, 0.92)))
        .mount(&detector)
        .await;

    let mcde = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate-document"))
        .respond_with(ResponseTemplate::new(200).set_body_json(
            serde_json::json!({"document_url": "https://docs.example.com/claim.pdf"}),
        ))
        .expect(1)
        .mount(&mcde)
        .await;

    let h = harness(HarnessOptions {
        detector: Some(detector.uri()),
        mcde: Some(mcde.uri()),
        ..HarnessOptions::default()
    });
    let tenant = Uuid::now_v7();

    let outcome = h
        .pipeline
        .process(tenant, Uuid::now_v7(), &[discrepancy("SKU-1", 30, 5, 0.9)])
        .await
        .unwrap();

    let claim = &outcome.claims[0];
    assert!(claim.evidence.iter().any(|p| p.kind == "mcde_document"));

    let events = h.notifications.events().await;
    assert!(events
        .iter()
        .any(|e| e.kind == NotificationKind::ProofGenerated));
}

#[tokio::test]
async fn test_mcde_down_degrades_without_document() {
    let detector = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/evidence/claims/calculate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(detector_response(250.0, 0.92)))
        .mount(&detector)
        .await;

    let mcde = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate-document"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&mcde)
        .await;

    let h = harness(HarnessOptions {
        detector: Some(detector.uri()),
        mcde: Some(mcde.uri()),
        ..HarnessOptions::default()
    });
    let tenant = Uuid::now_v7();

    let outcome = h
        .pipeline
        .process(tenant, Uuid::now_v7(), &[discrepancy("SKU-1", 30, 5, 0.9)])
        .await
        .unwrap();

    // claim persisted, proof bundle just misses the document
    let claim = &outcome.claims[0];
    assert_eq!(claim.status, ClaimStatus::Validated);
    assert!(!claim.evidence.iter().any(|p| p.kind == "mcde_document"));

    let events = h.notifications.events().await;
    assert!(events
        .iter()
        .any(|e| e.kind == NotificationKind::ClaimDetected));
    assert!(!events
        .iter()
        .any(|e| e.kind == NotificationKind::ProofGenerated));
}

#[tokio::test]
async fn test_auto_submission_marks_claim_submitted() {
    let detector = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/evidence/claims/calculate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(detector_response(250.0, 0.92)))
        .mount(&detector)
        .await;

    let refund = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/claims"))
        .respond_with(ResponseTemplate::new(202))
        .expect(1)
        .mount(&refund)
        .await;

    let h = harness(HarnessOptions {
        detector: Some(detector.uri()),
        refund_engine: Some(refund.uri()),
        auto_submission: true,
        ..HarnessOptions::default()
    });
    let tenant = Uuid::now_v7();

    let outcome = h
        .pipeline
        .process(tenant, Uuid::now_v7(), &[discrepancy("SKU-1", 30, 5, 0.9)])
        .await
        .unwrap();

    let claim = &outcome.claims[0];
    assert_eq!(claim.status, ClaimStatus::Submitted);
    let stored = h.claims.get(tenant, claim.claim_id).await.unwrap().unwrap();
    assert_eq!(stored.status, ClaimStatus::Submitted);

    let events = h.notifications.events().await;
    assert!(events
        .iter()
        .any(|e| e.kind == NotificationKind::ClaimSubmitted));
}

#[tokio::test]
async fn test_placeholder_claims_are_never_submitted() {
    let refund = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/claims"))
        .respond_with(ResponseTemplate::new(202))
        .expect(0)
        .mount(&refund)
        .await;

    // no detector configured: every claim is a placeholder
    let h = harness(HarnessOptions {
        refund_engine: Some(refund.uri()),
        auto_submission: true,
        ..HarnessOptions::default()
    });

    let outcome = h
        .pipeline
        .process(
            Uuid::now_v7(),
            Uuid::now_v7(),
            &[discrepancy("SKU-1", 30, 5, 0.9)],
        )
        .await
        .unwrap();
    assert_eq!(outcome.claims[0].status, ClaimStatus::Pending);
}

#[tokio::test]
async fn test_duplicate_discrepancies_yield_one_claim() {
    let h = harness(HarnessOptions::default());
    let tenant = Uuid::now_v7();

    let d = discrepancy("SKU-1", 30, 5, 0.9);
    let outcome = h
        .pipeline
        .process(tenant, Uuid::now_v7(), &[d.clone(), d])
        .await
        .unwrap();
    assert_eq!(outcome.claims.len(), 1);
}

#[tokio::test]
async fn test_cached_claim_lookup() {
    let h = harness(HarnessOptions::default());
    let tenant = Uuid::now_v7();

    let outcome = h
        .pipeline
        .process(tenant, Uuid::now_v7(), &[discrepancy("SKU-1", 30, 5, 0.9)])
        .await
        .unwrap();
    let claim_id = outcome.claims[0].claim_id;

    assert!(h.pipeline.cached_claim(claim_id).await.is_some());
    assert!(h.pipeline.cached_claim(Uuid::new_v4()).await.is_none());
}

#[tokio::test]
async fn test_invalid_records_are_counted_not_fatal() {
    let h = harness(HarnessOptions::default());

    let bad = StandardizedDiscrepancy::new(String::new(), 5, 1, "M".to_string());
    let outcome = h
        .pipeline
        .process(
            Uuid::now_v7(),
            Uuid::now_v7(),
            &[bad, discrepancy("SKU-1", 30, 5, 0.9)],
        )
        .await
        .unwrap();

    assert_eq!(outcome.claims.len(), 1);
    assert_eq!(outcome.errors.len(), 1);
}
