use serde::Deserialize;

/// Interpret an environment toggle value.
///
/// The string `"false"` (any casing, surrounding whitespace ignored)
/// disables; every other value enables.
pub fn flag_enabled(value: &str) -> bool {
    !value.trim().eq_ignore_ascii_case("false")
}

/// Application configuration loaded from environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Marketplace OAuth client id (LWA)
    pub marketplace_client_id: Option<String>,

    /// Marketplace OAuth client secret
    pub marketplace_client_secret: Option<String>,

    /// Default-tenant refresh token; per-tenant credentials win when present
    pub marketplace_refresh_token: Option<String>,

    /// Marketplace identifier (e.g. ATVPDKIKX0DER)
    pub marketplace_id: Option<String>,

    /// Marketplace seller id for the default tenant
    pub marketplace_seller_id: Option<String>,

    /// Marketplace region; unknown values fall back to `na`
    #[serde(default = "default_region")]
    pub marketplace_region: String,

    /// Marketplace API endpoint override; region resolution applies when
    /// unset
    pub marketplace_endpoint: Option<String>,

    /// OAuth token endpoint override
    pub marketplace_token_url: Option<String>,

    /// Marketplace requests per second per tenant
    #[serde(default = "default_spapi_rate")]
    pub marketplace_rate_per_sec: f64,

    /// Marketplace burst allowance per tenant
    #[serde(default = "default_spapi_burst")]
    pub marketplace_burst: u32,

    /// Claim Detector base URL (optional; claims are valued as placeholders
    /// when absent)
    pub claim_detector_url: Option<String>,

    /// Claim Detector bearer token
    pub claim_detector_api_key: Option<String>,

    /// Claim Detector request timeout in milliseconds
    #[serde(default = "default_claim_detector_timeout_ms")]
    pub claim_detector_timeout_ms: u64,

    /// Discrepancies per claim batch
    #[serde(default = "default_batch_size")]
    pub claim_detector_batch_size: usize,

    /// Minimum discrepancy confidence considered for claims
    #[serde(default = "default_confidence_threshold")]
    pub claim_detector_confidence_threshold: f64,

    /// Auto-submission toggle ("false" disables)
    #[serde(default = "default_on")]
    pub claim_detector_auto_submission: String,

    /// MCDE document service base URL (optional)
    pub mcde_base_url: Option<String>,

    /// MCDE API key
    pub mcde_api_key: Option<String>,

    /// Refund Engine base URL (optional)
    pub refund_engine_url: Option<String>,

    /// Refund Engine API key
    pub refund_engine_api_key: Option<String>,

    /// Raw payload archive bucket
    #[serde(default = "default_archive_bucket")]
    pub archive_bucket: String,

    /// Archive bucket region
    #[serde(default = "default_archive_region")]
    pub archive_region: String,

    /// Key prefix for archived payloads
    #[serde(default = "default_archive_prefix")]
    pub archive_prefix: String,

    /// S3-compatible endpoint override (path-style access)
    pub archive_endpoint: Option<String>,

    /// Archive access key
    pub archive_access_key: Option<String>,

    /// Archive secret key
    pub archive_secret_key: Option<String>,

    /// Marketplace connector toggle ("false" disables)
    #[serde(default = "default_on")]
    pub enable_marketplace: String,

    /// Maximum concurrent sync jobs across tenants
    #[serde(default = "default_max_jobs_global")]
    pub max_jobs_global: usize,

    /// Maximum concurrent sources within one job
    #[serde(default = "default_max_sources_in_flight")]
    pub max_sources_in_flight: usize,

    /// Maximum concurrent claim batches
    #[serde(default = "default_max_batches_in_flight")]
    pub max_batches_in_flight: usize,

    /// Whole-job timeout in seconds
    #[serde(default = "default_job_timeout_secs")]
    pub job_timeout_secs: u64,

    /// Age after which terminal jobs are evicted from memory, in seconds
    #[serde(default = "default_job_max_age_secs")]
    pub job_max_age_secs: u64,

    /// Base delay for whole-job retries, in seconds
    #[serde(default = "default_job_retry_base_secs")]
    pub job_retry_base_secs: u64,

    /// Whole-job retry attempts on unexpected errors
    #[serde(default = "default_job_max_attempts")]
    pub job_max_attempts: u32,

    /// Report polling budget in seconds
    #[serde(default = "default_report_poll_timeout_secs")]
    pub report_poll_timeout_secs: u64,

    /// Outbound HTTP timeout in seconds
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
}

fn default_region() -> String {
    "na".to_string()
}

fn default_spapi_rate() -> f64 {
    1.0
}

fn default_spapi_burst() -> u32 {
    1
}

fn default_claim_detector_timeout_ms() -> u64 {
    30_000
}

fn default_batch_size() -> usize {
    10
}

fn default_confidence_threshold() -> f64 {
    0.7
}

fn default_on() -> String {
    "true".to_string()
}

fn default_archive_bucket() -> String {
    "recon-raw-archive".to_string()
}

fn default_archive_region() -> String {
    "us-east-1".to_string()
}

fn default_archive_prefix() -> String {
    "raw".to_string()
}

fn default_max_jobs_global() -> usize {
    16
}

fn default_max_sources_in_flight() -> usize {
    1
}

fn default_max_batches_in_flight() -> usize {
    4
}

fn default_job_timeout_secs() -> u64 {
    3600
}

fn default_job_max_age_secs() -> u64 {
    86_400
}

fn default_job_retry_base_secs() -> u64 {
    5
}

fn default_job_max_attempts() -> u32 {
    3
}

fn default_report_poll_timeout_secs() -> u64 {
    300
}

fn default_http_timeout_secs() -> u64 {
    30
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, config::ConfigError> {
        // Load .env file if exists
        let _ = dotenvy::dotenv();

        let builder =
            config::Config::builder().add_source(config::Environment::default());

        builder.build()?.try_deserialize::<Config>()
    }

    /// Whether validated claims are auto-submitted to the Refund Engine
    pub fn auto_submission_enabled(&self) -> bool {
        flag_enabled(&self.claim_detector_auto_submission)
    }

    /// Whether the marketplace connector is enabled
    pub fn marketplace_enabled(&self) -> bool {
        flag_enabled(&self.enable_marketplace)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            marketplace_client_id: None,
            marketplace_client_secret: None,
            marketplace_refresh_token: None,
            marketplace_id: None,
            marketplace_seller_id: None,
            marketplace_region: default_region(),
            marketplace_endpoint: None,
            marketplace_token_url: None,
            marketplace_rate_per_sec: default_spapi_rate(),
            marketplace_burst: default_spapi_burst(),
            claim_detector_url: None,
            claim_detector_api_key: None,
            claim_detector_timeout_ms: default_claim_detector_timeout_ms(),
            claim_detector_batch_size: default_batch_size(),
            claim_detector_confidence_threshold: default_confidence_threshold(),
            claim_detector_auto_submission: default_on(),
            mcde_base_url: None,
            mcde_api_key: None,
            refund_engine_url: None,
            refund_engine_api_key: None,
            archive_bucket: default_archive_bucket(),
            archive_region: default_archive_region(),
            archive_prefix: default_archive_prefix(),
            archive_endpoint: None,
            archive_access_key: None,
            archive_secret_key: None,
            enable_marketplace: default_on(),
            max_jobs_global: default_max_jobs_global(),
            max_sources_in_flight: default_max_sources_in_flight(),
            max_batches_in_flight: default_max_batches_in_flight(),
            job_timeout_secs: default_job_timeout_secs(),
            job_max_age_secs: default_job_max_age_secs(),
            job_retry_base_secs: default_job_retry_base_secs(),
            job_max_attempts: default_job_max_attempts(),
            report_poll_timeout_secs: default_report_poll_timeout_secs(),
            http_timeout_secs: default_http_timeout_secs(),
        }
    }
}
