//! Notification port implementations
//!
//! Notification delivery is owned by an external service; in-process we
//! log and count. A recording double backs the pipeline tests.

use async_trait::async_trait;
use metrics::counter;
use recon_service_core::services::ports::NotificationPort;
use shared_error::AppError;
use shared_events::{EventEnvelope, NotificationEvent};
use tokio::sync::Mutex;

/// Default port: structured log plus a metric per event kind
#[derive(Debug, Default)]
pub struct LoggingNotificationPort;

impl LoggingNotificationPort {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl NotificationPort for LoggingNotificationPort {
    async fn process_event(&self, event: NotificationEvent) -> Result<(), AppError> {
        let kind = serde_json::to_value(event.kind)
            .ok()
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_default();
        counter!("notification_events_total", "kind" => kind.clone()).increment(1);
        tracing::info!(
            kind = %kind,
            user_id = %event.user_id,
            channels = ?event.channels,
            "Notification event emitted"
        );

        let envelope = EventEnvelope::new(&kind, event);
        tracing::debug!(
            payload = %serde_json::to_string(&envelope).unwrap_or_default(),
            "Notification envelope"
        );
        Ok(())
    }
}

/// Test double that records every event it receives
#[derive(Debug, Default)]
pub struct RecordingNotificationPort {
    events: Mutex<Vec<NotificationEvent>>,
}

impl RecordingNotificationPort {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl NotificationPort for RecordingNotificationPort {
    async fn process_event(&self, event: NotificationEvent) -> Result<(), AppError> {
        self.events.lock().await.push(event);
        Ok(())
    }
}
