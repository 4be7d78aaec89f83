use crate::error::{Result, SpApiError};
use std::time::Duration;

/// Provider key used for credentials and throttle buckets
pub const PROVIDER_SPAPI: &str = "spapi";

/// Login-with-Amazon token endpoint
pub const DEFAULT_TOKEN_URL: &str = "https://api.amazon.com/auth/o2/token";

/// Resolve a region code to its API host. Unknown regions fall back to `na`.
pub fn region_host(region: &str) -> &'static str {
    match region {
        "na" => "https://sellingpartnerapi-na.amazon.com",
        "eu" => "https://sellingpartnerapi-eu.amazon.com",
        "fe" => "https://sellingpartnerapi-fe.amazon.com",
        _ => "https://sellingpartnerapi-na.amazon.com",
    }
}

/// Marketplace client configuration
#[derive(Debug, Clone)]
pub struct SpApiConfig {
    /// OAuth client id
    pub client_id: String,
    /// OAuth client secret
    pub client_secret: String,
    /// Region code (na / eu / fe)
    pub region: String,
    /// Marketplace identifier used for report creation
    pub marketplace_id: Option<String>,
    /// Token endpoint (overridable for tests)
    pub token_url: String,
    /// API host override (for tests); region resolution applies when unset
    pub endpoint_override: Option<String>,
    /// Outbound HTTP timeout
    pub http_timeout: Duration,
}

impl SpApiConfig {
    pub fn new(client_id: String, client_secret: String, region: String) -> Self {
        Self {
            client_id,
            client_secret,
            region,
            marketplace_id: None,
            token_url: DEFAULT_TOKEN_URL.to_string(),
            endpoint_override: None,
            http_timeout: Duration::from_secs(30),
        }
    }

    /// Base URL for API calls
    pub fn endpoint(&self) -> String {
        match &self.endpoint_override {
            Some(endpoint) => endpoint.clone(),
            None => region_host(&self.region).to_string(),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.client_id.is_empty() {
            return Err(SpApiError::Config("client_id must not be empty".to_string()));
        }
        if self.client_secret.is_empty() {
            return Err(SpApiError::Config(
                "client_secret must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}
