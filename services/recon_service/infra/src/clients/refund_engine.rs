//! Refund Engine submission client

use metrics::counter;
use recon_service_core::domains::claim::ClaimCandidate;
use recon_service_core::dto::claims::RefundEngineClaim;
use rust_decimal::prelude::ToPrimitive;
use shared_error::AppError;
use std::time::Duration;
use uuid::Uuid;

pub struct RefundEngineClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl RefundEngineClient {
    pub fn new(
        base_url: String,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, AppError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        })
    }

    /// Submit a validated claim. The claim id doubles as the idempotency
    /// key, so replays of the same claim are safe.
    pub async fn submit(&self, tenant_id: Uuid, claim: &ClaimCandidate) -> Result<(), AppError> {
        let url = format!("{}/api/v1/claims", self.base_url);
        let body = RefundEngineClaim {
            case_number: claim.claim_id.to_string(),
            claim_amount: claim.amount.to_f64().unwrap_or(0.0),
            customer_history_score: claim.confidence,
            product_category: claim.kind.to_string(),
            days_since_purchase: 0,
            claim_description: format!(
                "{} claim for sku {} ({} risk)",
                claim.kind, claim.sku, claim.risk
            ),
        };

        let mut builder = self
            .http
            .post(&url)
            .header("X-User-Id", tenant_id.to_string())
            .header("Idempotency-Key", claim.claim_id.to_string())
            .json(&body);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await.map_err(|e| {
            counter!("refund_engine_requests_total", "status" => "unreachable").increment(1);
            AppError::DependencyUnavailable(format!("refund engine: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            counter!("refund_engine_requests_total", "status" => "error").increment(1);
            return Err(AppError::DependencyUnavailable(format!(
                "refund engine returned {}: {}",
                status, body
            )));
        }

        counter!("refund_engine_requests_total", "status" => "success").increment(1);
        Ok(())
    }
}
