use std::fmt;
use std::time::Duration;

/// OAuth error code that permanently invalidates a credential.
pub const INVALID_GRANT: &str = "invalid_grant";

#[derive(Debug)]
pub enum AppError {
    // Upstream authentication errors
    Auth {
        code: Option<String>,
        message: String,
    },

    // Upstream 429; carries the pause the limiter must honour
    RateLimited {
        retry_after: Duration,
    },

    // 5xx, network failure, timeout - retried with backoff
    TransientUpstream(String),

    // Upstream 4xx other than 401/429 - terminal for that call
    Client {
        status: u16,
        code: Option<String>,
        body: String,
    },

    // Validation errors
    Validation(String),

    // Missing or inconsistent configuration
    Config(String),

    // Optional downstream service unreachable; callers degrade
    DependencyUnavailable(String),

    // Cooperative cancellation; not a failure of the job
    Cancelled,

    // Lookup misses
    NotFound(String),

    // Internal errors
    Internal(String),
}

impl AppError {
    /// Whether the operation that produced this error may be retried.
    ///
    /// Auth errors are retriable unless the upstream reported
    /// `invalid_grant`, which permanently invalidates the credential.
    pub fn is_retriable(&self) -> bool {
        match self {
            AppError::Auth { code, .. } => code.as_deref() != Some(INVALID_GRANT),
            AppError::RateLimited { .. } => true,
            AppError::TransientUpstream(_) => true,
            _ => false,
        }
    }

    /// Whether this is a terminal credential failure.
    pub fn is_terminal_auth(&self) -> bool {
        matches!(self, AppError::Auth { code, .. } if code.as_deref() == Some(INVALID_GRANT))
    }

    /// The pause requested by an upstream 429, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            AppError::RateLimited { retry_after } => Some(*retry_after),
            _ => None,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Auth { code, message } => match code {
                Some(code) => write!(f, "Auth error ({}): {}", code, message),
                None => write!(f, "Auth error: {}", message),
            },
            AppError::RateLimited { retry_after } => {
                write!(f, "Rate limited, retry after {:?}", retry_after)
            },
            AppError::TransientUpstream(msg) => write!(f, "Transient upstream error: {}", msg),
            AppError::Client { status, code, body } => match code {
                Some(code) => write!(f, "Client error {} ({}): {}", status, code, body),
                None => write!(f, "Client error {}: {}", status, body),
            },
            AppError::Validation(msg) => write!(f, "Validation error: {}", msg),
            AppError::Config(msg) => write!(f, "Configuration error: {}", msg),
            AppError::DependencyUnavailable(msg) => {
                write!(f, "Dependency unavailable: {}", msg)
            },
            AppError::Cancelled => write!(f, "Cancelled"),
            AppError::NotFound(msg) => write!(f, "Not found: {}", msg),
            AppError::Internal(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

// From implementations for common error types
impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Validation(format!("JSON error: {}", err))
    }
}

impl From<std::env::VarError> for AppError {
    fn from(err: std::env::VarError) -> Self {
        AppError::Config(err.to_string())
    }
}
