//! End-to-end sync scenarios against fake upstream and downstream services

use chrono::Utc;
use recon_service_api::{default_tenant_id, AppState};
use recon_service_core::domains::claim::ClaimKind;
use recon_service_core::domains::discrepancy::Severity;
use recon_service_core::domains::inventory::{InventoryItem, SourceItem};
use recon_service_core::domains::rules::{ReconciliationRule, RuleKind, RuleScope};
use recon_service_core::domains::sync::{JobState, SyncJobKind};
use recon_service_core::repositories::claims::ClaimRepository;
use recon_service_core::repositories::inventory::InventoryRepository;
use recon_service_core::repositories::rules::RuleRepository;
use recon_service_core::repositories::sync_log::SyncLogRepository;
use recon_service_core::services::orchestrator::SyncService;
use recon_service_infra::clients::RecordingNotificationPort;
use shared_config::Config;
use shared_events::NotificationKind;
use shared_spapi_client::archive::MemoryArchiver;
use shared_spapi_client::InMemoryCredentialStore;
use std::sync::Arc;
use std::time::{Duration, Instant};
use uuid::Uuid;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const MARKETPLACE: &str = "ATVPDKIKX0DER";

struct Scenario {
    state: AppState,
    archiver: Arc<MemoryArchiver>,
    notifications: Arc<RecordingNotificationPort>,
    tenant: Uuid,
}

async fn scenario(
    spapi: &MockServer,
    detector: Option<&MockServer>,
    mcde: Option<&MockServer>,
) -> Scenario {
    // token endpoint: the seeded credential rotates on first use
    Mock::given(method("POST"))
        .and(path("/auth/o2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "access-token",
            "expires_in": 3600,
            "token_type": "bearer"
        })))
        .mount(spapi)
        .await;

    let config = Config {
        marketplace_client_id: Some("client-id".to_string()),
        marketplace_client_secret: Some("client-secret".to_string()),
        marketplace_refresh_token: Some("refresh-token".to_string()),
        marketplace_id: Some(MARKETPLACE.to_string()),
        marketplace_endpoint: Some(spapi.uri()),
        marketplace_token_url: Some(format!("{}/auth/o2/token", spapi.uri())),
        marketplace_rate_per_sec: 100.0,
        marketplace_burst: 10,
        claim_detector_url: detector.map(|s| s.uri()),
        mcde_base_url: mcde.map(|s| s.uri()),
        job_retry_base_secs: 0,
        ..Config::default()
    };

    let archiver = Arc::new(MemoryArchiver::new());
    let notifications = Arc::new(RecordingNotificationPort::new());
    let state = AppState::build_with(
        config,
        archiver.clone(),
        Arc::new(InMemoryCredentialStore::new()),
        notifications.clone(),
    )
    .await
    .unwrap();

    Scenario {
        state,
        archiver,
        notifications,
        tenant: default_tenant_id(),
    }
}

async fn seed_item(s: &Scenario, sku: &str, quantity: i64) {
    let source = SourceItem {
        sku: sku.to_string(),
        quantity,
        quantity_reserved: 0,
        unit_price: None,
        source_system: "marketplace".to_string(),
        asin: Some("B000000001".to_string()),
        marketplace_id: Some(MARKETPLACE.to_string()),
    };
    s.state
        .inventory
        .upsert(InventoryItem::from_source(s.tenant, &source, Utc::now()))
        .await
        .unwrap();
}

fn inventory_page(skus: &[(&str, i64)]) -> serde_json::Value {
    let summaries: Vec<_> = skus
        .iter()
        .map(|(sku, qty)| {
            serde_json::json!({
                "sellerSku": sku,
                "inventoryDetails": {"fulfillableQuantity": qty}
            })
        })
        .collect();
    serde_json::json!({"payload": {"inventorySummaries": summaries}})
}

async fn run_full_sync(s: &Scenario) -> recon_service_core::domains::sync::SyncJob {
    let job_id = s
        .state
        .orchestrator
        .start_sync_job(s.tenant, SyncJobKind::Full, vec!["marketplace".to_string()])
        .await
        .unwrap();
    s.state
        .orchestrator
        .wait_until_terminal(job_id, Duration::from_secs(10))
        .await
        .expect("sync job should reach a terminal state")
}

#[tokio::test]
async fn test_clean_run_finds_nothing() {
    let spapi = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fba/inventory/v1/summaries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(inventory_page(&[("SKU-A", 10)])))
        .mount(&spapi)
        .await;

    let s = scenario(&spapi, None, None).await;
    seed_item(&s, "SKU-A", 10).await;

    let job = run_full_sync(&s).await;
    assert_eq!(job.state, JobState::Completed);
    assert!(job.errors.is_empty());
    assert_eq!(job.progress.percentage, 100);

    let log = s
        .state
        .sync_logs
        .latest_completed(s.tenant, "marketplace")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(log.items_processed, 1);
    assert_eq!(log.created, 0);
    assert_eq!(log.updated, 0);
    assert_eq!(log.discrepancies_found, 0);
    assert_eq!(log.claims_triggered, 0);

    // exactly one archive object, content-addressed
    let receipts = s.archiver.receipts().await;
    assert_eq!(receipts.len(), 1);
    assert!(receipts[0].key.contains(&receipts[0].sha256[..12]));

    assert!(s.notifications.events().await.is_empty());
}

#[tokio::test]
async fn test_low_severity_auto_resolves_without_claims() {
    let spapi = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fba/inventory/v1/summaries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(inventory_page(&[("SKU-A", 12)])))
        .mount(&spapi)
        .await;

    let s = scenario(&spapi, None, None).await;
    seed_item(&s, "SKU-A", 10).await;
    s.state
        .rules
        .upsert(ReconciliationRule {
            rule_id: Uuid::now_v7(),
            scope: RuleScope::Global,
            kind: RuleKind::QuantityThreshold,
            threshold: 1.0,
            severity: Severity::Low,
            auto_resolve: true,
            enabled: true,
            conditions: vec![],
        })
        .await
        .unwrap();

    let job = run_full_sync(&s).await;
    assert_eq!(job.state, JobState::Completed);

    let log = s
        .state
        .sync_logs
        .latest_completed(s.tenant, "marketplace")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(log.discrepancies_found, 1);
    assert_eq!(log.discrepancies_resolved, 1);
    assert_eq!(log.claims_triggered, 0);

    // internal quantity converged on the marketplace value
    let item = s
        .state
        .inventory
        .find_by_sku(s.tenant, "SKU-A")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(item.quantity_available, 12);

    // the auto-resolved path never reaches the claim pipeline
    assert!(s
        .state
        .claims
        .recent_for_sku(s.tenant, "SKU-A", 10)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn test_critical_discrepancy_produces_claim() {
    let spapi = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fba/inventory/v1/summaries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(inventory_page(&[("SKU-B", 200)])))
        .mount(&spapi)
        .await;

    let detector = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/evidence/claims/calculate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "claim_id": Uuid::new_v4().to_string(),
            "claim_amount": 487.5,
            "currency": "USD",
            "confidence": 0.95,
            "net_gain": 97.5,
            "proof": {"basis": "fba_ledger"}
        })))
        .expect(1)
        .mount(&detector)
        .await;

    let s = scenario(&spapi, Some(&detector), None).await;
    seed_item(&s, "SKU-B", 5).await;

    let job = run_full_sync(&s).await;
    assert_eq!(job.state, JobState::Completed);

    let log = s
        .state
        .sync_logs
        .latest_completed(s.tenant, "marketplace")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(log.discrepancies_found, 1);
    assert_eq!(log.claims_triggered, 1);

    let claims = s
        .state
        .claims
        .recent_for_sku(s.tenant, "SKU-B", 10)
        .await
        .unwrap();
    assert_eq!(claims.len(), 1);
    let claim = &claims[0];
    // marketplace above internal: overcharge
    assert_eq!(claim.kind, ClaimKind::Overcharge);
    assert!((claim.confidence - 0.95).abs() < f64::EPSILON);
    // critical severity, confident detection: 30 days * 0.8
    let days = (claim.estimated_payout_at - claim.created_at).num_days();
    assert!((23..=24).contains(&days));

    let events = s.notifications.events().await;
    assert!(events
        .iter()
        .any(|e| e.kind == NotificationKind::ClaimDetected));
}

#[tokio::test]
async fn test_upstream_429_then_success_completes_clean() {
    let spapi = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fba/inventory/v1/summaries"))
        .respond_with(ResponseTemplate::new(429).insert_header("Retry-After", "1"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&spapi)
        .await;
    Mock::given(method("GET"))
        .and(path("/fba/inventory/v1/summaries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(inventory_page(&[("SKU-A", 10)])))
        .expect(1)
        .mount(&spapi)
        .await;

    let s = scenario(&spapi, None, None).await;
    seed_item(&s, "SKU-A", 10).await;

    let start = Instant::now();
    let job = run_full_sync(&s).await;

    assert_eq!(job.state, JobState::Completed);
    assert!(job.errors.is_empty());
    // the single retry waited out the advertised pause
    assert!(start.elapsed() >= Duration::from_secs(1));
}

#[tokio::test]
async fn test_mcde_down_claim_survives_without_document() {
    let spapi = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fba/inventory/v1/summaries"))
        .respond_with(ResponseTemplate::new(200).set_body_json(inventory_page(&[("SKU-B", 200)])))
        .mount(&spapi)
        .await;

    let detector = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/evidence/claims/calculate"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "claim_id": Uuid::new_v4().to_string(),
            "claim_amount": 487.5,
            "currency": "USD",
            "confidence": 0.95
        })))
        .mount(&detector)
        .await;

    let mcde = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/generate-document"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&mcde)
        .await;

    let s = scenario(&spapi, Some(&detector), Some(&mcde)).await;
    seed_item(&s, "SKU-B", 5).await;

    let job = run_full_sync(&s).await;
    assert_eq!(job.state, JobState::Completed);

    let claims = s
        .state
        .claims
        .recent_for_sku(s.tenant, "SKU-B", 10)
        .await
        .unwrap();
    assert_eq!(claims.len(), 1);
    // proof bundle misses only the document
    assert!(!claims[0].evidence.iter().any(|p| p.kind == "mcde_document"));
    assert!(claims[0]
        .evidence
        .iter()
        .any(|p| p.kind == "inventory_snapshot"));

    let events = s.notifications.events().await;
    assert!(events
        .iter()
        .any(|e| e.kind == NotificationKind::ClaimDetected));
    assert!(!events
        .iter()
        .any(|e| e.kind == NotificationKind::ProofGenerated));
}

#[tokio::test]
async fn test_connector_failure_surfaces_in_health() {
    let spapi = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/fba/inventory/v1/summaries"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "errors": [{"code": "InvalidInput", "message": "bad request"}]
        })))
        .mount(&spapi)
        .await;

    let s = scenario(&spapi, None, None).await;
    let job = run_full_sync(&s).await;

    // the only source failed, so after retries the job fails
    assert_eq!(job.state, JobState::Failed);
    assert!(!job.errors.is_empty());

    let report = s.state.registry.health_report().await;
    let marketplace = report.iter().find(|r| r.name == "marketplace").unwrap();
    assert!(!marketplace.healthy);
    assert!(marketplace.last_error.is_some());
}
