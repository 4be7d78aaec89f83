use shared_error::AppError;
use shared_rate_limit::RateLimitError;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SpApiError {
    #[error("OAuth error: {message}")]
    OAuth {
        code: Option<String>,
        message: String,
    },

    #[error("refresh token rejected (invalid_grant)")]
    InvalidGrant,

    #[error("no credential for tenant {0}")]
    CredentialMissing(String),

    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited { retry_after: Duration },

    #[error("marketplace API error {status}: {body}")]
    Api {
        status: u16,
        code: Option<String>,
        body: String,
    },

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("archive failed: {0}")]
    Archive(String),

    #[error("report {report_id} ended {status}")]
    ReportFailed { report_id: String, status: String },

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("cancelled")]
    Cancelled,

    #[error("configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, SpApiError>;

impl From<RateLimitError> for SpApiError {
    fn from(err: RateLimitError) -> Self {
        match err {
            RateLimitError::Cancelled => SpApiError::Cancelled,
        }
    }
}

impl From<SpApiError> for AppError {
    fn from(err: SpApiError) -> Self {
        match err {
            SpApiError::OAuth { code, message } => AppError::Auth { code, message },
            SpApiError::InvalidGrant => AppError::Auth {
                code: Some(shared_error::INVALID_GRANT.to_string()),
                message: "refresh token rejected".to_string(),
            },
            SpApiError::CredentialMissing(tenant) => AppError::Auth {
                code: None,
                message: format!("no credential for tenant {}", tenant),
            },
            SpApiError::RateLimited { retry_after } => AppError::RateLimited { retry_after },
            SpApiError::Api { status, code, body } if status >= 500 => {
                AppError::TransientUpstream(format!(
                    "marketplace {} ({}): {}",
                    status,
                    code.unwrap_or_default(),
                    body
                ))
            },
            SpApiError::Api { status, code, body } => AppError::Client { status, code, body },
            SpApiError::Request(e) => AppError::TransientUpstream(e.to_string()),
            SpApiError::Json(e) => AppError::Validation(format!("JSON error: {}", e)),
            SpApiError::Archive(msg) => AppError::Internal(format!("archive failed: {}", msg)),
            SpApiError::ReportFailed { report_id, status } => {
                AppError::Internal(format!("report {} ended {}", report_id, status))
            },
            SpApiError::Timeout(msg) => AppError::TransientUpstream(format!("timeout: {}", msg)),
            SpApiError::Cancelled => AppError::Cancelled,
            SpApiError::Config(msg) => AppError::Config(msg),
        }
    }
}
