//! Standardized discrepancy wire form
//!
//! The canonical hand-off shape from any connector to the engine and the
//! claim pipeline. Upstream producers spell fields in both `snake_case`
//! and `camelCase`; deserialisation accepts either and the struct is
//! normalised to one internal form at this boundary.

use crate::domains::discrepancy::{DiscrepancyKind, Severity};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::str::FromStr;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct StandardizedDiscrepancy {
    /// Producer-side product identifier, when one exists
    #[serde(alias = "productId", default)]
    pub product_id: Option<String>,

    #[validate(length(min = 1, message = "sku must not be empty"))]
    pub sku: String,

    /// Quantity the marketplace reports
    #[serde(alias = "quantitySynced")]
    pub quantity_synced: i64,

    /// Quantity held internally
    #[serde(alias = "quantityActual")]
    pub quantity_actual: i64,

    /// Always `quantity_synced - quantity_actual`
    #[serde(alias = "discrepancyAmount", default)]
    pub discrepancy_amount: i64,

    pub marketplace: String,

    pub timestamp: DateTime<Utc>,

    #[serde(default = "default_currency")]
    pub currency: String,

    #[serde(default)]
    pub confidence: Option<f64>,

    /// Bounded free-form context (severity, kind, source system, proof)
    #[serde(default)]
    pub metadata: BTreeMap<String, Value>,
}

fn default_currency() -> String {
    "USD".to_string()
}

impl StandardizedDiscrepancy {
    pub fn new(
        sku: String,
        quantity_synced: i64,
        quantity_actual: i64,
        marketplace: String,
    ) -> Self {
        Self {
            product_id: None,
            sku,
            quantity_synced,
            quantity_actual,
            discrepancy_amount: quantity_synced - quantity_actual,
            marketplace,
            timestamp: Utc::now(),
            currency: default_currency(),
            confidence: None,
            metadata: BTreeMap::new(),
        }
    }

    /// Re-derive the amount invariant after deserialisation; producers
    /// that omitted or mangled `discrepancy_amount` are corrected here.
    pub fn normalise(mut self) -> Self {
        self.discrepancy_amount = self.quantity_synced - self.quantity_actual;
        self
    }

    /// Severity the producer attached, when present and well-formed
    pub fn severity_hint(&self) -> Option<Severity> {
        self.metadata
            .get("severity")
            .and_then(Value::as_str)
            .and_then(|s| Severity::from_str(s).ok())
    }

    /// Discrepancy kind the producer attached; quantity when absent
    pub fn kind_hint(&self) -> DiscrepancyKind {
        self.metadata
            .get("kind")
            .and_then(Value::as_str)
            .and_then(|s| DiscrepancyKind::from_str(s).ok())
            .unwrap_or(DiscrepancyKind::Quantity)
    }

    /// The producer's discrepancy id, when it recorded one
    pub fn discrepancy_id(&self) -> Option<uuid::Uuid> {
        self.metadata
            .get("discrepancy_id")
            .and_then(Value::as_str)
            .and_then(|s| uuid::Uuid::parse_str(s).ok())
    }
}
