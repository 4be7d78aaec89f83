//! Per-tenant credential vault
//!
//! Owns every mutation of marketplace credentials: loading with
//! expiry-skew rotation, serialized refresh against the OAuth endpoint,
//! and a background sweeper that pre-rotates credentials about to expire.
//! Rotations for one `(tenant, provider)` pair are serialized through a
//! per-key mutex so concurrent loads produce a single upstream request.

use crate::config::SpApiConfig;
use crate::error::{Result, SpApiError};
use crate::types::{Credential, OAuthErrorBody, TokenResponse};
use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Rotate this long before the recorded expiry, in seconds
const ROTATE_SKEW_SECS: i64 = 300;
/// Sweeper cadence
const SWEEP_INTERVAL: Duration = Duration::from_secs(300);
/// Sweeper pre-rotates credentials expiring within this window, in seconds
const SWEEP_WINDOW_SECS: i64 = 600;

fn rotate_skew() -> ChronoDuration {
    ChronoDuration::seconds(ROTATE_SKEW_SECS)
}

/// Persistence port for credentials. The backing store is responsible for
/// encryption at rest; credentials cross this boundary decrypted.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn get(&self, tenant_id: Uuid, provider: &str) -> Result<Option<Credential>>;
    async fn upsert(&self, credential: Credential) -> Result<()>;
    async fn mark_invalid(&self, tenant_id: Uuid, provider: &str) -> Result<()>;
    async fn expiring_before(&self, deadline: DateTime<Utc>) -> Result<Vec<Credential>>;
}

/// In-memory credential store for tests and single-process deployments
#[derive(Debug, Default)]
pub struct InMemoryCredentialStore {
    credentials: RwLock<HashMap<(Uuid, String), Credential>>,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for InMemoryCredentialStore {
    async fn get(&self, tenant_id: Uuid, provider: &str) -> Result<Option<Credential>> {
        let credentials = self.credentials.read().await;
        Ok(credentials.get(&(tenant_id, provider.to_string())).cloned())
    }

    async fn upsert(&self, credential: Credential) -> Result<()> {
        let mut credentials = self.credentials.write().await;
        credentials.insert(
            (credential.tenant_id, credential.provider.clone()),
            credential,
        );
        Ok(())
    }

    async fn mark_invalid(&self, tenant_id: Uuid, provider: &str) -> Result<()> {
        let mut credentials = self.credentials.write().await;
        if let Some(credential) = credentials.get_mut(&(tenant_id, provider.to_string())) {
            credential.valid = false;
        }
        Ok(())
    }

    async fn expiring_before(&self, deadline: DateTime<Utc>) -> Result<Vec<Credential>> {
        let credentials = self.credentials.read().await;
        Ok(credentials
            .values()
            .filter(|c| c.valid && c.expires_at < deadline)
            .cloned()
            .collect())
    }
}

/// Credential vault with serialized rotation
pub struct TokenVault {
    store: Arc<dyn CredentialStore>,
    http: reqwest::Client,
    config: SpApiConfig,
    rotation_locks: Mutex<HashMap<(Uuid, String), Arc<Mutex<()>>>>,
}

impl TokenVault {
    pub fn new(config: SpApiConfig, store: Arc<dyn CredentialStore>) -> Result<Self> {
        config.validate()?;
        let http = reqwest::Client::builder()
            .timeout(config.http_timeout)
            .build()
            .map_err(|e| SpApiError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            store,
            http,
            config,
            rotation_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Return a credential usable right now, rotating first when it is
    /// inside the expiry skew.
    pub async fn load(&self, tenant_id: Uuid, provider: &str) -> Result<Credential> {
        let credential = self
            .store
            .get(tenant_id, provider)
            .await?
            .ok_or_else(|| SpApiError::CredentialMissing(tenant_id.to_string()))?;

        if !credential.valid {
            return Err(SpApiError::InvalidGrant);
        }

        if Utc::now() >= credential.expires_at - rotate_skew() {
            return self.rotate(tenant_id, provider).await;
        }

        Ok(credential)
    }

    /// Exchange the refresh token for a fresh access token.
    ///
    /// Serialized per `(tenant, provider)`; a caller that lost the race
    /// returns the credential its peer just refreshed without touching the
    /// token endpoint again.
    pub async fn rotate(&self, tenant_id: Uuid, provider: &str) -> Result<Credential> {
        self.rotate_inner(tenant_id, provider, false).await
    }

    /// Rotation that ignores recorded freshness. Used after an upstream
    /// 401, where the stored expiry can no longer be trusted.
    pub async fn force_rotate(&self, tenant_id: Uuid, provider: &str) -> Result<Credential> {
        self.rotate_inner(tenant_id, provider, true).await
    }

    async fn rotate_inner(
        &self,
        tenant_id: Uuid,
        provider: &str,
        force: bool,
    ) -> Result<Credential> {
        let lock = {
            let mut locks = self.rotation_locks.lock().await;
            locks
                .entry((tenant_id, provider.to_string()))
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };
        let _guard = lock.lock().await;

        let credential = self
            .store
            .get(tenant_id, provider)
            .await?
            .ok_or_else(|| SpApiError::CredentialMissing(tenant_id.to_string()))?;

        if !credential.valid {
            return Err(SpApiError::InvalidGrant);
        }

        // A peer may have rotated while this caller waited on the lock.
        if !force && Utc::now() < credential.expires_at - rotate_skew() {
            return Ok(credential);
        }

        let token = match self.exchange(&credential.refresh_token).await {
            Ok(token) => token,
            Err(SpApiError::InvalidGrant) => {
                tracing::error!(
                    tenant_id = %tenant_id,
                    provider = %provider,
                    "Refresh token rejected, marking credential invalid"
                );
                self.store.mark_invalid(tenant_id, provider).await?;
                return Err(SpApiError::InvalidGrant);
            },
            Err(e) => return Err(e),
        };

        let now = Utc::now();
        let mut expires_at = now + ChronoDuration::seconds(token.expires_in);
        // Expiry is strictly increasing across rotations
        if expires_at <= credential.expires_at {
            expires_at = credential.expires_at + ChronoDuration::seconds(1);
        }

        let rotated = Credential {
            access_token: token.access_token,
            expires_at,
            ..credential
        };
        self.store.upsert(rotated.clone()).await?;

        tracing::info!(
            tenant_id = %tenant_id,
            provider = %provider,
            expires_at = %rotated.expires_at,
            "Rotated credential"
        );
        Ok(rotated)
    }

    async fn exchange(&self, refresh_token: &str) -> Result<TokenResponse> {
        let params = [
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
            ("client_id", &self.config.client_id),
            ("client_secret", &self.config.client_secret),
        ];

        let response = self
            .http
            .post(&self.config.token_url)
            .form(&params)
            .send()
            .await?;

        if response.status().is_success() {
            return Ok(response.json::<TokenResponse>().await?);
        }

        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<OAuthErrorBody>(&body) {
            Ok(oauth) if oauth.error == "invalid_grant" => Err(SpApiError::InvalidGrant),
            Ok(oauth) => Err(SpApiError::OAuth {
                code: Some(oauth.error),
                message: oauth.error_description.unwrap_or(body),
            }),
            Err(_) => Err(SpApiError::OAuth {
                code: None,
                message: format!("token endpoint returned {}: {}", status, body),
            }),
        }
    }

    /// Background sweeper: every 5 minutes, pre-rotate credentials
    /// expiring within the next 10 minutes.
    pub async fn run_sweeper(self: Arc<Self>, cancel: CancellationToken) {
        let mut interval = tokio::time::interval(SWEEP_INTERVAL);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("Credential sweeper stopping");
                    return;
                },
                _ = interval.tick() => {},
            }

            let deadline = Utc::now() + ChronoDuration::seconds(SWEEP_WINDOW_SECS);
            let expiring = match self.store.expiring_before(deadline).await {
                Ok(expiring) => expiring,
                Err(e) => {
                    tracing::error!(error = %e, "Credential sweep scan failed");
                    continue;
                },
            };

            for credential in expiring {
                if let Err(e) = self
                    .rotate(credential.tenant_id, &credential.provider)
                    .await
                {
                    tracing::warn!(
                        tenant_id = %credential.tenant_id,
                        provider = %credential.provider,
                        error = %e,
                        "Pre-rotation failed"
                    );
                }
            }
        }
    }
}
