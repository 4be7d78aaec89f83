//! Wire and record types for the marketplace API
//!
//! Wire structs mirror the upstream JSON casing; the record types handed to
//! callers are normalised at this boundary and never mutated downstream.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Token endpoint success response
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: Option<String>,
}

/// Token endpoint error body
#[derive(Debug, Clone, Deserialize)]
pub struct OAuthErrorBody {
    pub error: String,
    #[serde(default)]
    pub error_description: Option<String>,
}

/// A tenant's marketplace credential. Only the vault mutates these;
/// `expires_at` is strictly increasing across rotations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credential {
    pub tenant_id: Uuid,
    pub provider: String,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
    pub valid: bool,
}

impl Credential {
    /// Bootstrap a credential from a refresh token alone; the first `load`
    /// rotates it into a usable access token.
    pub fn seed(tenant_id: Uuid, provider: &str, refresh_token: String) -> Self {
        Self {
            tenant_id,
            provider: provider.to_string(),
            access_token: String::new(),
            refresh_token,
            expires_at: DateTime::<Utc>::UNIX_EPOCH,
            valid: true,
        }
    }
}

/// Normalised FBA inventory summary record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InventorySummary {
    pub sku: String,
    pub asin: Option<String>,
    pub fn_sku: Option<String>,
    pub available_quantity: i64,
    pub reserved_quantity: i64,
    pub damaged_quantity: i64,
    pub condition: Option<String>,
    pub marketplace_id: String,
    pub last_updated_time: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct InventorySummariesPage {
    #[serde(default)]
    pub payload: Option<InventorySummariesPayload>,
    #[serde(default)]
    pub pagination: Option<Pagination>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct InventorySummariesPayload {
    #[serde(rename = "inventorySummaries", default)]
    pub inventory_summaries: Vec<InventorySummaryWire>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct Pagination {
    #[serde(rename = "nextToken", default)]
    pub next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct InventorySummaryWire {
    #[serde(rename = "sellerSku", default)]
    pub seller_sku: Option<String>,
    #[serde(default)]
    pub asin: Option<String>,
    #[serde(rename = "fnSku", default)]
    pub fn_sku: Option<String>,
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(rename = "totalQuantity", default)]
    pub total_quantity: Option<i64>,
    #[serde(rename = "lastUpdatedTime", default)]
    pub last_updated_time: Option<DateTime<Utc>>,
    #[serde(rename = "inventoryDetails", default)]
    pub inventory_details: Option<InventoryDetailsWire>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct InventoryDetailsWire {
    #[serde(rename = "fulfillableQuantity", default)]
    pub fulfillable_quantity: Option<i64>,
    #[serde(rename = "unfulfillableQuantity", default)]
    pub unfulfillable_quantity: Option<UnfulfillableQuantityWire>,
    #[serde(rename = "reservedQuantity", default)]
    pub reserved_quantity: Option<ReservedQuantityWire>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReservedQuantityWire {
    #[serde(rename = "totalReservedQuantity", default)]
    pub total_reserved_quantity: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UnfulfillableQuantityWire {
    #[serde(rename = "totalUnfulfillableQuantity", default)]
    pub total_unfulfillable_quantity: Option<i64>,
}

impl InventorySummaryWire {
    pub(crate) fn normalise(self, marketplace_id: &str) -> Option<InventorySummary> {
        let sku = self.seller_sku?;
        let details = self.inventory_details;
        let available = details
            .as_ref()
            .and_then(|d| d.fulfillable_quantity)
            .or(self.total_quantity)
            .unwrap_or(0);
        let reserved = details
            .as_ref()
            .and_then(|d| d.reserved_quantity.as_ref())
            .and_then(|r| r.total_reserved_quantity)
            .unwrap_or(0);
        let damaged = details
            .as_ref()
            .and_then(|d| d.unfulfillable_quantity.as_ref())
            .and_then(|u| u.total_unfulfillable_quantity)
            .unwrap_or(0);

        Some(InventorySummary {
            sku,
            asin: self.asin,
            fn_sku: self.fn_sku,
            available_quantity: available,
            reserved_quantity: reserved,
            damaged_quantity: damaged,
            condition: self.condition,
            marketplace_id: marketplace_id.to_string(),
            last_updated_time: self.last_updated_time,
        })
    }
}

/// Normalised order record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub amazon_order_id: String,
    pub order_status: Option<String>,
    pub purchase_date: Option<DateTime<Utc>>,
    pub last_update_date: Option<DateTime<Utc>>,
    pub marketplace_id: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OrdersPage {
    #[serde(default)]
    pub payload: Option<OrdersPayload>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OrdersPayload {
    #[serde(rename = "Orders", default)]
    pub orders: Vec<OrderWire>,
    #[serde(rename = "NextToken", default)]
    pub next_token: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct OrderWire {
    #[serde(rename = "AmazonOrderId")]
    pub amazon_order_id: String,
    #[serde(rename = "OrderStatus", default)]
    pub order_status: Option<String>,
    #[serde(rename = "PurchaseDate", default)]
    pub purchase_date: Option<DateTime<Utc>>,
    #[serde(rename = "LastUpdateDate", default)]
    pub last_update_date: Option<DateTime<Utc>>,
    #[serde(rename = "MarketplaceId", default)]
    pub marketplace_id: Option<String>,
}

impl From<OrderWire> for Order {
    fn from(wire: OrderWire) -> Self {
        Order {
            amazon_order_id: wire.amazon_order_id,
            order_status: wire.order_status,
            purchase_date: wire.purchase_date,
            last_update_date: wire.last_update_date,
            marketplace_id: wire.marketplace_id,
        }
    }
}

/// A financial event, tagged by the upstream group it arrived in
/// (ShipmentEventList, RefundEventList, ...). The payload stays opaque
/// until a consumer parses the fields it needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinancialEvent {
    pub group: String,
    pub payload: serde_json::Value,
}

/// A record from one of the secondary datasets (returns, shipments,
/// settlements, removals), kept opaque at this boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketplaceRecord {
    pub dataset: String,
    pub payload: serde_json::Value,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateReportResponse {
    #[serde(rename = "reportId")]
    pub report_id: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReportStatusWire {
    #[serde(rename = "processingStatus")]
    pub processing_status: String,
    #[serde(rename = "reportDocumentId", default)]
    pub report_document_id: Option<String>,
}

/// Reference to a finished report document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportDocumentRef {
    #[serde(rename = "reportDocumentId")]
    pub report_document_id: String,
    pub url: String,
    #[serde(rename = "compressionAlgorithm", default)]
    pub compression_algorithm: Option<String>,
}
