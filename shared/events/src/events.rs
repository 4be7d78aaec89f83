//! Event definitions for the reconciliation platform

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Job progress event
/// Published on every state transition and per-source completion
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    /// Sync job identifier
    pub job_id: Uuid,
    /// Tenant the job belongs to
    pub user_id: Uuid,
    /// Completion percentage, non-decreasing within a job
    pub percentage: u8,
    /// Sources completed so far
    pub current: usize,
    /// Total sources in the job
    pub total: usize,
    /// Job state in wire form (pending, running, completed, failed, cancelled)
    pub status: String,
    /// Per-source errors collected so far
    pub errors: Vec<String>,
    /// Non-fatal warnings collected so far
    pub warnings: Vec<String>,
    /// Event timestamp
    pub timestamp: DateTime<Utc>,
}

/// Outbound notification event kinds
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    ClaimDetected,
    ClaimSubmitted,
    ClaimPaid,
    ProofGenerated,
}

/// Event handed to the notification port
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationEvent {
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    pub user_id: Uuid,
    pub data: serde_json::Value,
    pub channels: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
}

impl NotificationEvent {
    pub fn new(kind: NotificationKind, user_id: Uuid, data: serde_json::Value) -> Self {
        Self {
            kind,
            user_id,
            data,
            channels: vec!["email".to_string(), "in_app".to_string()],
            priority: None,
        }
    }
}

/// Wrapper stamped onto every event leaving the pipeline. Downstream
/// consumers route on `event_type` and gate parsing on `schema_version`,
/// so the payload itself stays opaque to the transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope<T> {
    /// Routing key, e.g. `claim_detected`
    pub event_type: String,
    /// When the event left the pipeline
    pub emitted_at: DateTime<Utc>,
    /// Payload schema revision; bumped on breaking payload changes
    pub schema_version: u32,
    pub data: T,
}

impl<T> EventEnvelope<T> {
    pub fn new(event_type: &str, data: T) -> Self {
        Self {
            event_type: event_type.to_string(),
            emitted_at: Utc::now(),
            schema_version: 1,
            data,
        }
    }
}

/// Render a progress event as an SSE frame for the transport adapter
pub fn sse_frame(event: &ProgressEvent) -> Result<String, serde_json::Error> {
    Ok(format!("data: {}\n\n", serde_json::to_string(event)?))
}
