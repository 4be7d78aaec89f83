//! Throttle configuration and error types

/// Error types for throttle operations
#[derive(Debug, thiserror::Error)]
pub enum RateLimitError {
    #[error("acquire cancelled")]
    Cancelled,
}

/// Per-provider bucket parameters
#[derive(Debug, Clone, Copy)]
pub struct ThrottleConfig {
    /// Steady-state refill rate in tokens per second
    pub rate_per_sec: f64,
    /// Bucket capacity
    pub burst: u32,
}

impl Default for ThrottleConfig {
    fn default() -> Self {
        // SP-API default: 1 req/s, burst 1
        Self {
            rate_per_sec: 1.0,
            burst: 1,
        }
    }
}

impl ThrottleConfig {
    pub fn new(rate_per_sec: f64, burst: u32) -> Self {
        Self {
            rate_per_sec,
            burst,
        }
    }
}

/// Bucket key for a `(provider, tenant)` pair
pub fn throttle_key(provider: &str, tenant_id: &str) -> String {
    format!("{}:{}", provider, tenant_id)
}
