//! MCDE proof document client

use metrics::counter;
use recon_service_core::dto::claims::{McdeDocumentRequest, McdeDocumentResponse};
use shared_error::AppError;
use std::time::Duration;

pub struct McdeClient {
    http: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl McdeClient {
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

    /// Generate a cost document for a claim; returns its URL.
    pub async fn generate_document(
        &self,
        claim_id: &str,
        cost_estimate: f64,
    ) -> Result<String, AppError> {
        let url = format!("{}/generate-document", self.base_url);
        let request = McdeDocumentRequest::cost_document(claim_id.to_string(), cost_estimate);

        let mut builder = self.http.post(&url).json(&request);
        if let Some(api_key) = &self.api_key {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await.map_err(|e| {
            counter!("mcde_requests_total", "status" => "unreachable").increment(1);
            AppError::DependencyUnavailable(format!("mcde: {}", e))
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            counter!("mcde_requests_total", "status" => "error").increment(1);
            return Err(AppError::DependencyUnavailable(format!(
                "mcde returned {}: {}",
                status, body
            )));
        }

        let document = response
            .json::<McdeDocumentResponse>()
            .await
            .map_err(|e| AppError::Validation(format!("mcde response: {}", e)))?;

        counter!("mcde_requests_total", "status" => "success").increment(1);
        Ok(document.document_url)
    }
}
