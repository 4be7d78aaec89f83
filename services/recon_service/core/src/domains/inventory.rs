//! Internal inventory entities
//!
//! `InventoryItem` is the tenant's locally-held ground truth;
//! `SourceItem` is the engine's normalised view of one upstream record.
//! Connectors translate marketplace payloads into `SourceItem`s at the
//! wire boundary so the engine never sees provider-specific shapes.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// A tenant's internal inventory record, keyed by sku within the tenant
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryItem {
    /// Tenant isolation
    pub tenant_id: Uuid,
    /// Unique within tenant
    pub sku: String,
    /// On-hand quantity, never negative
    pub quantity_available: i64,
    /// Reserved quantity, never negative
    pub quantity_reserved: i64,
    /// Reorder trigger level
    pub reorder_point: i64,
    /// Selling price in major units
    pub selling_price: Option<Decimal>,
    /// Unit cost in major units
    pub cost_price: Option<Decimal>,
    /// Marketplace ASIN, when known
    pub asin: Option<String>,
    /// Marketplace this item is listed in
    pub marketplace_id: Option<String>,
    /// Soft-delete flag; absent-from-source items are deactivated
    pub is_active: bool,
    /// Last time a sync touched this item
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Bounded free-form attributes
    pub metadata: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl InventoryItem {
    /// Build a new item from an upstream record first seen in a sync
    pub fn from_source(tenant_id: Uuid, source: &SourceItem, now: DateTime<Utc>) -> Self {
        Self {
            tenant_id,
            sku: source.sku.clone(),
            quantity_available: source.quantity.max(0),
            quantity_reserved: source.quantity_reserved.max(0),
            reorder_point: 0,
            selling_price: source.unit_price,
            cost_price: None,
            asin: source.asin.clone(),
            marketplace_id: source.marketplace_id.clone(),
            is_active: true,
            last_synced_at: Some(now),
            metadata: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// One upstream record, normalised for the engine
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceItem {
    pub sku: String,
    /// Available quantity reported by the source
    pub quantity: i64,
    /// Reserved quantity reported by the source
    pub quantity_reserved: i64,
    /// Unit price when the source carries one
    pub unit_price: Option<Decimal>,
    /// Reporting system (e.g. `marketplace`, `manual`)
    pub source_system: String,
    pub asin: Option<String>,
    pub marketplace_id: Option<String>,
}
