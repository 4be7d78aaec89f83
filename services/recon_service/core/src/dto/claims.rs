//! Downstream wire shapes for the claim pipeline
//!
//! Request and response structures for the Claim Detector, the MCDE
//! document service, and the Refund Engine. All three speak `snake_case`
//! JSON; monetary amounts travel as plain numbers and are converted to
//! decimals at the boundary.

use crate::dto::standardized::StandardizedDiscrepancy;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Body for `POST {claim_detector}/evidence/claims/calculate`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimCalculationRequest {
    pub discrepancy_data: StandardizedDiscrepancy,
    pub inventory_context: Value,
    pub historical_data: Value,
}

/// Claim Detector valuation response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimValuation {
    #[serde(default)]
    pub claim_id: Option<String>,
    pub claim_amount: f64,
    #[serde(default = "default_currency")]
    pub currency: String,
    pub confidence: f64,
    #[serde(default)]
    pub amazon_default_value: Option<f64>,
    #[serde(default)]
    pub opside_true_value: Option<f64>,
    #[serde(default)]
    pub net_gain: Option<f64>,
    #[serde(default)]
    pub proof: Option<Value>,
}

fn default_currency() -> String {
    "USD".to_string()
}

/// Body for `POST {mcde}/generate-document`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McdeDocumentRequest {
    pub claim_id: String,
    pub cost_estimate: f64,
    pub document_type: String,
}

impl McdeDocumentRequest {
    pub fn cost_document(claim_id: String, cost_estimate: f64) -> Self {
        Self {
            claim_id,
            cost_estimate,
            document_type: "cost_document".to_string(),
        }
    }
}

/// MCDE response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McdeDocumentResponse {
    pub document_url: String,
}

/// Body for `POST {refund_engine}/api/v1/claims`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundEngineClaim {
    pub case_number: String,
    pub claim_amount: f64,
    pub customer_history_score: f64,
    pub product_category: String,
    pub days_since_purchase: i64,
    pub claim_description: String,
}
