//! Reconciliation engine behaviour

use crate::repositories::{
    InMemoryDiscrepancyRepository, InMemoryInventoryRepository, InMemoryRuleRepository,
};
use crate::services::reconciliation::ReconEngine;
use chrono::Utc;
use recon_service_core::domains::discrepancy::{DiscrepancyStatus, Severity, SuggestedAction};
use recon_service_core::domains::inventory::{InventoryItem, SourceItem};
use recon_service_core::domains::rules::{ReconciliationRule, RuleKind, RuleScope};
use recon_service_core::repositories::inventory::InventoryRepository;
use recon_service_core::repositories::rules::RuleRepository;
use recon_service_core::services::reconciliation::ReconciliationService;
use std::sync::Arc;
use uuid::Uuid;

struct Harness {
    engine: ReconEngine,
    inventory: Arc<InMemoryInventoryRepository>,
    rules: Arc<InMemoryRuleRepository>,
}

fn harness() -> Harness {
    let inventory = Arc::new(InMemoryInventoryRepository::new());
    let discrepancies = Arc::new(InMemoryDiscrepancyRepository::new());
    let rules = Arc::new(InMemoryRuleRepository::new());
    let engine = ReconEngine::new(inventory.clone(), discrepancies.clone(), rules.clone());
    Harness {
        engine,
        inventory,
        rules,
    }
}

fn source(sku: &str, quantity: i64) -> SourceItem {
    SourceItem {
        sku: sku.to_string(),
        quantity,
        quantity_reserved: 0,
        unit_price: None,
        source_system: "marketplace".to_string(),
        asin: None,
        marketplace_id: Some("ATVPDKIKX0DER".to_string()),
    }
}

async fn seed_item(h: &Harness, tenant_id: Uuid, sku: &str, quantity: i64) {
    h.inventory
        .upsert(InventoryItem::from_source(
            tenant_id,
            &source(sku, quantity),
            Utc::now(),
        ))
        .await
        .unwrap();
}

fn auto_resolve_rule(threshold: f64) -> ReconciliationRule {
    ReconciliationRule {
        rule_id: Uuid::now_v7(),
        scope: RuleScope::Global,
        kind: RuleKind::QuantityThreshold,
        threshold,
        severity: Severity::Low,
        auto_resolve: true,
        enabled: true,
        conditions: vec![],
    }
}

#[tokio::test]
async fn test_clean_run_touches_nothing() {
    let h = harness();
    let tenant = Uuid::now_v7();
    seed_item(&h, tenant, "SKU-A", 10).await;

    let outcome = h
        .engine
        .reconcile(tenant, vec![source("SKU-A", 10)])
        .await
        .unwrap();

    assert_eq!(outcome.items_processed(), 1);
    assert_eq!(outcome.created, 0);
    assert_eq!(outcome.updated, 0);
    assert_eq!(outcome.no_change, 1);
    assert_eq!(outcome.discrepancies_found(), 0);
    assert_eq!(outcome.resolved, 0);

    let item = h.inventory.find_by_sku(tenant, "SKU-A").await.unwrap().unwrap();
    assert_eq!(item.quantity_available, 10);
    assert!(item.last_synced_at.is_some());
}

#[tokio::test]
async fn test_unknown_sku_creates_item() {
    let h = harness();
    let tenant = Uuid::now_v7();

    let outcome = h
        .engine
        .reconcile(tenant, vec![source("SKU-NEW", 7)])
        .await
        .unwrap();

    assert_eq!(outcome.created, 1);
    let item = h
        .inventory
        .find_by_sku(tenant, "SKU-NEW")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(item.quantity_available, 7);
    assert!(item.is_active);
}

#[tokio::test]
async fn test_low_severity_auto_resolves_and_accepts_source() {
    let h = harness();
    let tenant = Uuid::now_v7();
    seed_item(&h, tenant, "SKU-A", 10).await;
    h.rules.upsert(auto_resolve_rule(1.0)).await.unwrap();

    let outcome = h
        .engine
        .reconcile(tenant, vec![source("SKU-A", 12)])
        .await
        .unwrap();

    assert_eq!(outcome.discrepancies_found(), 1);
    assert_eq!(outcome.resolved, 1);
    let discrepancy = &outcome.discrepancies[0];
    assert_eq!(discrepancy.severity, Severity::Low);
    assert_eq!(discrepancy.suggested_action, SuggestedAction::AutoResolve);
    assert_eq!(discrepancy.status, DiscrepancyStatus::Resolved);

    let item = h.inventory.find_by_sku(tenant, "SKU-A").await.unwrap().unwrap();
    assert_eq!(item.quantity_available, 12);
}

#[tokio::test]
async fn test_low_severity_without_rule_stays_open_and_unapplied() {
    let h = harness();
    let tenant = Uuid::now_v7();
    seed_item(&h, tenant, "SKU-A", 10).await;

    let outcome = h
        .engine
        .reconcile(tenant, vec![source("SKU-A", 12)])
        .await
        .unwrap();

    assert_eq!(outcome.discrepancies_found(), 1);
    assert_eq!(outcome.resolved, 0);
    assert_eq!(outcome.discrepancies[0].status, DiscrepancyStatus::Open);
    assert_eq!(
        outcome.discrepancies[0].suggested_action,
        SuggestedAction::Investigate
    );

    // low severity without auto-resolve leaves the quantity alone
    let item = h.inventory.find_by_sku(tenant, "SKU-A").await.unwrap().unwrap();
    assert_eq!(item.quantity_available, 10);
    assert_eq!(outcome.no_change, 1);
}

#[tokio::test]
async fn test_critical_discrepancy_escalates_and_updates() {
    let h = harness();
    let tenant = Uuid::now_v7();
    seed_item(&h, tenant, "SKU-B", 5).await;

    let outcome = h
        .engine
        .reconcile(tenant, vec![source("SKU-B", 200)])
        .await
        .unwrap();

    assert_eq!(outcome.discrepancies_found(), 1);
    let discrepancy = &outcome.discrepancies[0];
    assert_eq!(discrepancy.severity, Severity::Critical);
    assert_eq!(discrepancy.suggested_action, SuggestedAction::Escalate);
    // marketplace reliability 0.95 damped by 0.9 for the 195-unit diff
    assert!((discrepancy.confidence - 0.855).abs() < 1e-9);
    assert_eq!(discrepancy.status, DiscrepancyStatus::Open);
    assert!(discrepancy.confidence >= 0.1 && discrepancy.confidence <= 1.0);
    assert!(discrepancy.impact_score >= 0.0 && discrepancy.impact_score <= 10.0);

    let item = h.inventory.find_by_sku(tenant, "SKU-B").await.unwrap().unwrap();
    assert_eq!(item.quantity_available, 200);
    assert_eq!(outcome.updated, 1);
}

#[tokio::test]
async fn test_absent_skus_deactivate_once() {
    let h = harness();
    let tenant = Uuid::now_v7();
    seed_item(&h, tenant, "SKU-A", 10).await;
    seed_item(&h, tenant, "SKU-B", 4).await;

    let outcome = h
        .engine
        .reconcile(tenant, vec![source("SKU-A", 10)])
        .await
        .unwrap();
    assert_eq!(outcome.deactivated, 1);
    let b = h.inventory.find_by_sku(tenant, "SKU-B").await.unwrap().unwrap();
    assert!(!b.is_active);

    // a second pass must not count or reactivate it
    let outcome = h
        .engine
        .reconcile(tenant, vec![source("SKU-A", 10)])
        .await
        .unwrap();
    assert_eq!(outcome.deactivated, 0);
    let b = h.inventory.find_by_sku(tenant, "SKU-B").await.unwrap().unwrap();
    assert!(!b.is_active);
}

#[tokio::test]
async fn test_rerun_on_unchanged_source_is_idempotent() {
    let h = harness();
    let tenant = Uuid::now_v7();
    seed_item(&h, tenant, "SKU-B", 5).await;

    let first = h
        .engine
        .reconcile(tenant, vec![source("SKU-B", 200)])
        .await
        .unwrap();
    assert_eq!(first.discrepancies_found(), 1);

    let second = h
        .engine
        .reconcile(tenant, vec![source("SKU-B", 200)])
        .await
        .unwrap();
    assert_eq!(second.discrepancies_found(), 0);
    assert_eq!(second.updated, 0);
    assert_eq!(second.no_change, 1);
}

#[tokio::test]
async fn test_duplicate_and_invalid_records_are_counted() {
    let h = harness();
    let tenant = Uuid::now_v7();

    let outcome = h
        .engine
        .reconcile(
            tenant,
            vec![source("SKU-A", 5), source("SKU-A", 6), source("", 1)],
        )
        .await
        .unwrap();

    assert_eq!(outcome.created, 1);
    assert_eq!(outcome.skipped_invalid, 2);
}

#[tokio::test]
async fn test_counters_identity_holds() {
    let h = harness();
    let tenant = Uuid::now_v7();
    seed_item(&h, tenant, "SKU-A", 10).await;
    seed_item(&h, tenant, "SKU-B", 5).await;

    let outcome = h
        .engine
        .reconcile(
            tenant,
            vec![source("SKU-A", 10), source("SKU-B", 200), source("SKU-C", 1)],
        )
        .await
        .unwrap();

    assert_eq!(
        outcome.items_processed(),
        outcome.created + outcome.updated + outcome.no_change
    );
    assert!(outcome.discrepancies_found() >= outcome.resolved);
}
