//! Raw payload archive port
//!
//! Every successful upstream fetch is snapshotted through this port as a
//! content-addressed JSON object. The storage backend lives behind the
//! trait; this module owns canonicalisation, hashing and key layout so all
//! implementations address content identically.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("storage error: {0}")]
    Storage(String),
}

/// Receipt for one archived payload
#[derive(Debug, Clone, PartialEq)]
pub struct ArchiveReceipt {
    pub key: String,
    pub sha256: String,
    pub bytes: usize,
}

/// Content-addressed snapshot store for raw upstream payloads
#[async_trait]
pub trait Archiver: Send + Sync {
    async fn archive(
        &self,
        tenant_id: Uuid,
        dataset: &str,
        payload: &Value,
    ) -> Result<ArchiveReceipt, ArchiveError>;
}

/// Serialise with recursively sorted object keys so equal payloads hash
/// equally regardless of upstream field ordering.
pub fn canonical_json(value: &Value) -> String {
    fn sort(value: &Value) -> Value {
        match value {
            Value::Object(map) => {
                let mut sorted = serde_json::Map::new();
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                for key in keys {
                    sorted.insert(key.clone(), sort(&map[key]));
                }
                Value::Object(sorted)
            },
            Value::Array(items) => Value::Array(items.iter().map(sort).collect()),
            other => other.clone(),
        }
    }
    sort(value).to_string()
}

/// Hex sha256 of the canonical serialisation
pub fn content_hash(value: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(canonical_json(value).as_bytes());
    hex::encode(hasher.finalize())
}

/// Object key: `prefix/tenant/dataset/<timestamp>_<sha256[..12]>.json`
pub fn archive_key(
    prefix: &str,
    tenant_id: Uuid,
    dataset: &str,
    at: DateTime<Utc>,
    sha256: &str,
) -> String {
    format!(
        "{}/{}/{}/{}_{}.json",
        prefix.trim_end_matches('/'),
        tenant_id,
        dataset,
        at.format("%Y-%m-%dT%H-%M-%S-%3fZ"),
        &sha256[..12]
    )
}

/// In-memory archiver for tests and local runs; records every receipt.
#[derive(Debug, Default)]
pub struct MemoryArchiver {
    receipts: Mutex<Vec<ArchiveReceipt>>,
}

impl MemoryArchiver {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn receipts(&self) -> Vec<ArchiveReceipt> {
        self.receipts.lock().await.clone()
    }
}

#[async_trait]
impl Archiver for MemoryArchiver {
    async fn archive(
        &self,
        tenant_id: Uuid,
        dataset: &str,
        payload: &Value,
    ) -> Result<ArchiveReceipt, ArchiveError> {
        let body = canonical_json(payload);
        let sha256 = content_hash(payload);
        let receipt = ArchiveReceipt {
            key: archive_key("raw", tenant_id, dataset, Utc::now(), &sha256),
            sha256,
            bytes: body.len(),
        };
        self.receipts.lock().await.push(receipt.clone());
        Ok(receipt)
    }
}
