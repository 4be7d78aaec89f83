//! Proof bundle assembly
//!
//! Builds the ordered evidence list attached to a discrepancy before it
//! reaches the claim pipeline: a snapshot of both sides and a value
//! comparison priced from the internal item.

use recon_service_core::domains::claim::ProofItem;
use recon_service_core::domains::inventory::InventoryItem;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::json;

pub fn build_proof_bundle(
    item: Option<&InventoryItem>,
    upstream_quantity: i64,
    internal_quantity: i64,
) -> Vec<ProofItem> {
    let unit_price = item
        .and_then(|i| i.selling_price)
        .unwrap_or(Decimal::ZERO);
    let delta = upstream_quantity - internal_quantity;
    let estimated_value = (unit_price * Decimal::from(delta.abs()))
        .to_f64()
        .unwrap_or(0.0);

    vec![
        ProofItem::new(
            "inventory_snapshot",
            json!({
                "internal_quantity": internal_quantity,
                "upstream_quantity": upstream_quantity,
                "quantity_reserved": item.map(|i| i.quantity_reserved),
                "reorder_point": item.map(|i| i.reorder_point),
                "asin": item.and_then(|i| i.asin.clone()),
                "marketplace_id": item.and_then(|i| i.marketplace_id.clone()),
            }),
        ),
        ProofItem::new(
            "value_comparison",
            json!({
                "expected": internal_quantity,
                "actual": upstream_quantity,
                "delta": delta,
                "unit_price": unit_price.to_f64().unwrap_or(0.0),
                "estimated_value": estimated_value,
            }),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use recon_service_core::domains::inventory::SourceItem;
    use uuid::Uuid;

    #[test]
    fn test_bundle_has_snapshot_then_comparison() {
        let source = SourceItem {
            sku: "SKU-1".to_string(),
            quantity: 5,
            quantity_reserved: 0,
            unit_price: Some(Decimal::new(250, 1)),
            source_system: "marketplace".to_string(),
            asin: Some("B00000001".to_string()),
            marketplace_id: None,
        };
        let item = InventoryItem::from_source(Uuid::now_v7(), &source, Utc::now());

        let bundle = build_proof_bundle(Some(&item), 200, 5);
        assert_eq!(bundle.len(), 2);
        assert_eq!(bundle[0].kind, "inventory_snapshot");
        assert_eq!(bundle[1].kind, "value_comparison");
        assert_eq!(bundle[1].payload["delta"], 195);
        // 25.0 * 195
        assert_eq!(bundle[1].payload["estimated_value"], 4875.0);
    }

    #[test]
    fn test_bundle_without_internal_item() {
        let bundle = build_proof_bundle(None, 10, 0);
        assert_eq!(bundle[1].payload["unit_price"], 0.0);
        assert!(bundle[0].payload["asin"].is_null());
    }
}
