//! S3-compatible raw payload archiver
//!
//! Content-addressed snapshots of upstream payloads: the object key embeds
//! a truncated sha256 of the canonical JSON, so identical payloads land on
//! identical suffixes. Uploads retry with jittered exponential backoff and
//! record metrics.

use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use chrono::Utc;
use metrics::{counter, histogram};
use serde_json::Value;
use shared_spapi_client::archive::{
    archive_key, canonical_json, content_hash, ArchiveError, ArchiveReceipt, Archiver,
};
use std::time::{Duration, Instant};
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use uuid::Uuid;

/// Put attempts per payload before the archive error surfaces
const PUT_ATTEMPTS: usize = 4;
/// Delay before the first put retry
const PUT_RETRY_DELAY_MS: u64 = 250;
/// Ceiling on the delay between put retries
const PUT_RETRY_CAP_SECS: u64 = 8;

/// Archive storage configuration
#[derive(Clone, Debug)]
pub struct ArchiveConfig {
    pub bucket: String,
    pub region: String,
    pub prefix: String,
    pub endpoint: Option<String>,
    pub access_key: Option<String>,
    pub secret_key: Option<String>,
}

impl ArchiveConfig {
    pub fn from_config(config: &shared_config::Config) -> Self {
        Self {
            bucket: config.archive_bucket.clone(),
            region: config.archive_region.clone(),
            prefix: config.archive_prefix.clone(),
            endpoint: config.archive_endpoint.clone(),
            access_key: config.archive_access_key.clone(),
            secret_key: config.archive_secret_key.clone(),
        }
    }
}

/// S3 archiver behind the [`Archiver`] port
pub struct S3Archiver {
    client: Client,
    config: ArchiveConfig,
}

impl S3Archiver {
    pub fn new(config: ArchiveConfig) -> Self {
        let credentials = match (&config.access_key, &config.secret_key) {
            (Some(access_key), Some(secret_key)) => aws_sdk_s3::config::Credentials::new(
                access_key.clone(),
                secret_key.clone(),
                None,
                None,
                "archive-config",
            ),
            _ => {
                // Placeholder keys only work against unauthenticated
                // local object stores; a real bucket rejects them.
                tracing::warn!(
                    bucket = %config.bucket,
                    "No archive key pair configured, falling back to placeholder credentials"
                );
                aws_sdk_s3::config::Credentials::new(
                    "local-archive",
                    "local-archive",
                    None,
                    None,
                    "archive-fallback",
                )
            },
        };

        let mut builder = aws_sdk_s3::Config::builder()
            .behavior_version_latest()
            .credentials_provider(credentials)
            .region(aws_sdk_s3::config::Region::new(config.region.clone()))
            .force_path_style(true);
        if let Some(endpoint) = &config.endpoint {
            builder = builder.endpoint_url(endpoint);
        }

        Self {
            client: Client::from_conf(builder.build()),
            config,
        }
    }

    fn put_retry_delays() -> impl Iterator<Item = Duration> {
        ExponentialBackoff::from_millis(PUT_RETRY_DELAY_MS)
            .max_delay(Duration::from_secs(PUT_RETRY_CAP_SECS))
            .map(jitter)
            .take(PUT_ATTEMPTS - 1)
    }
}

#[async_trait]
impl Archiver for S3Archiver {
    async fn archive(
        &self,
        tenant_id: Uuid,
        dataset: &str,
        payload: &Value,
    ) -> Result<ArchiveReceipt, ArchiveError> {
        let start = Instant::now();
        let body = canonical_json(payload);
        let sha256 = content_hash(payload);
        let key = archive_key(&self.config.prefix, tenant_id, dataset, Utc::now(), &sha256);
        let bytes = body.len();

        let client = self.client.clone();
        let bucket = self.config.bucket.clone();
        let key_owned = key.clone();
        let body_owned = body.into_bytes();

        let result = Retry::spawn(Self::put_retry_delays(), || {
            let client = client.clone();
            let bucket = bucket.clone();
            let key = key_owned.clone();
            let body = body_owned.clone();

            async move {
                client
                    .put_object()
                    .bucket(&bucket)
                    .key(&key)
                    .body(ByteStream::from(body))
                    .content_type("application/json")
                    .send()
                    .await
                    .map_err(|e| {
                        tracing::warn!(key = %key, error = ?e, "Archive put rejected, will retry");
                        e
                    })
            }
        })
        .await;

        let duration = start.elapsed();

        match result {
            Ok(_) => {
                counter!("archive_upload_total", "status" => "success").increment(1);
                histogram!("archive_upload_duration_seconds").record(duration.as_secs_f64());
                histogram!("archive_upload_bytes").record(bytes as f64);

                tracing::info!(
                    key = %key,
                    dataset = %dataset,
                    size_bytes = %bytes,
                    duration_ms = %duration.as_millis(),
                    "Raw payload archived"
                );

                Ok(ArchiveReceipt { key, sha256, bytes })
            },
            Err(e) => {
                counter!("archive_upload_total", "status" => "failure").increment(1);

                tracing::error!(
                    key = %key,
                    dataset = %dataset,
                    error = %e,
                    duration_ms = %duration.as_millis(),
                    "Archive put gave up, raw payload not persisted"
                );

                Err(ArchiveError::Storage(format!(
                    "archive put for {} gave up after {} attempts: {}",
                    dataset, PUT_ATTEMPTS, e
                )))
            },
        }
    }
}
