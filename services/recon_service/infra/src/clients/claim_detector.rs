//! Claim Detector client

use metrics::{counter, histogram};
use recon_service_core::dto::claims::{ClaimCalculationRequest, ClaimValuation};
use shared_error::AppError;
use std::time::{Duration, Instant};

pub struct ClaimDetectorClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl ClaimDetectorClient {
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

    /// Value one discrepancy. Unreachable or non-2xx responses surface as
    /// `DependencyUnavailable`; the pipeline falls back to a placeholder
    /// claim so nothing is silently dropped.
    pub async fn calculate(
        &self,
        request: &ClaimCalculationRequest,
    ) -> Result<ClaimValuation, AppError> {
        let url = format!("{}/evidence/claims/calculate", self.base_url);
        let start = Instant::now();

        let mut builder = self.http.post(&url).json(request);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await.map_err(|e| {
            counter!("claim_detector_requests_total", "status" => "unreachable").increment(1);
            AppError::DependencyUnavailable(format!("claim detector: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            counter!("claim_detector_requests_total", "status" => "error").increment(1);
            return Err(AppError::DependencyUnavailable(format!(
                "claim detector returned {}: {}",
                status, body
            )));
        }

        let valuation = response
            .json::<ClaimValuation>()
            .await
            .map_err(|e| AppError::Validation(format!("claim detector response: {}", e)))?;

        counter!("claim_detector_requests_total", "status" => "success").increment(1);
        histogram!("claim_detector_duration_seconds").record(start.elapsed().as_secs_f64());
        Ok(valuation)
    }
}
