//! Application state and dependency wiring
//!
//! Every collaborator is an explicit constructor argument somewhere in
//! this graph; nothing reads the environment after `Config::from_env`.

use recon_service_core::services::connector::Connector;
use recon_service_core::services::ports::NotificationPort;
use recon_service_infra::archive::{ArchiveConfig, S3Archiver};
use recon_service_infra::clients::{
    ClaimDetectorClient, CommissionBillingService, LoggingNotificationPort, McdeClient,
    RefundEngineClient,
};
use recon_service_infra::connectors::{ConnectorRegistry, MarketplaceConnector};
use recon_service_infra::repositories::{
    InMemoryClaimRepository, InMemoryDiscrepancyRepository, InMemoryInventoryRepository,
    InMemoryRuleRepository, InMemorySyncLogRepository,
};
use recon_service_infra::services::{
    ClaimPipeline, ClaimPipelineConfig, OrchestratorConfig, ReconEngine, SyncOrchestrator,
};
use shared_config::Config;
use shared_error::AppError;
use shared_events::ProgressBus;
use shared_rate_limit::{ThrottleConfig, TokenBucketThrottle};
use shared_spapi_client::archive::Archiver;
use shared_spapi_client::types::Credential;
use shared_spapi_client::{
    CredentialStore, InMemoryCredentialStore, SpApiClient, SpApiConfig, TokenVault, PROVIDER_SPAPI,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Tenant the process-level marketplace credentials belong to.
/// Per-tenant credentials in the store always win; the environment only
/// ever seeds this one.
pub fn default_tenant_id() -> Uuid {
    Uuid::nil()
}

pub struct AppState {
    pub config: Config,
    pub root_cancel: CancellationToken,
    pub bus: ProgressBus,
    pub vault: Option<Arc<TokenVault>>,
    pub inventory: Arc<InMemoryInventoryRepository>,
    pub discrepancies: Arc<InMemoryDiscrepancyRepository>,
    pub rules: Arc<InMemoryRuleRepository>,
    pub claims: Arc<InMemoryClaimRepository>,
    pub sync_logs: Arc<InMemorySyncLogRepository>,
    pub engine: Arc<ReconEngine>,
    pub claim_pipeline: Arc<ClaimPipeline>,
    pub registry: Arc<ConnectorRegistry>,
    pub orchestrator: SyncOrchestrator,
    pub billing: Arc<CommissionBillingService>,
    pub notifications: Arc<dyn NotificationPort>,
}

impl AppState {
    /// Production wiring: S3 archive, in-memory stores, logging
    /// notification port.
    pub async fn build(config: Config) -> Result<Self, AppError> {
        let archiver: Arc<dyn Archiver> =
            Arc::new(S3Archiver::new(ArchiveConfig::from_config(&config)));
        let credential_store: Arc<dyn CredentialStore> = Arc::new(InMemoryCredentialStore::new());
        let notifications: Arc<dyn NotificationPort> = Arc::new(LoggingNotificationPort::new());
        Self::build_with(config, archiver, credential_store, notifications).await
    }

    /// Wiring with injectable boundary implementations, shared by the
    /// binary and the integration tests.
    pub async fn build_with(
        config: Config,
        archiver: Arc<dyn Archiver>,
        credential_store: Arc<dyn CredentialStore>,
        notifications: Arc<dyn NotificationPort>,
    ) -> Result<Self, AppError> {
        let root_cancel = CancellationToken::new();
        let bus = ProgressBus::new();

        let inventory = Arc::new(InMemoryInventoryRepository::new());
        let discrepancies = Arc::new(InMemoryDiscrepancyRepository::new());
        let rules = Arc::new(InMemoryRuleRepository::new());
        let claims = Arc::new(InMemoryClaimRepository::new());
        let sync_logs = Arc::new(InMemorySyncLogRepository::new());

        let engine = Arc::new(ReconEngine::new(
            inventory.clone(),
            discrepancies.clone(),
            rules.clone(),
        ));

        let detector_timeout = Duration::from_millis(config.claim_detector_timeout_ms);
        let detector = match &config.claim_detector_url {
            Some(url) => Some(Arc::new(ClaimDetectorClient::new(
                url.clone(),
                config.claim_detector_api_key.clone(),
                detector_timeout,
            )?)),
            None => None,
        };
        let mcde = match &config.mcde_base_url {
            Some(url) => Some(Arc::new(McdeClient::new(
                url.clone(),
                config.mcde_api_key.clone(),
                detector_timeout,
            )?)),
            None => None,
        };
        let refund_engine = match &config.refund_engine_url {
            Some(url) => Some(Arc::new(RefundEngineClient::new(
                url.clone(),
                config.refund_engine_api_key.clone(),
                detector_timeout,
            )?)),
            None => None,
        };

        let claim_pipeline = Arc::new(ClaimPipeline::new(
            ClaimPipelineConfig::from_config(&config),
            detector,
            mcde,
            refund_engine,
            notifications.clone(),
            inventory.clone(),
            claims.clone(),
            sync_logs.clone(),
        ));

        // Marketplace stack: a missing credential pair disables this
        // connector only, the service stays up.
        let mut connectors: Vec<Arc<dyn Connector>> = Vec::new();
        let mut vault = None;
        match (
            config.marketplace_client_id.clone(),
            config.marketplace_client_secret.clone(),
        ) {
            (Some(client_id), Some(client_secret)) => {
                let mut spapi = SpApiConfig::new(
                    client_id,
                    client_secret,
                    config.marketplace_region.clone(),
                );
                spapi.marketplace_id = config.marketplace_id.clone();
                spapi.endpoint_override = config.marketplace_endpoint.clone();
                spapi.http_timeout = Duration::from_secs(config.http_timeout_secs);
                if let Some(token_url) = &config.marketplace_token_url {
                    spapi.token_url = token_url.clone();
                }

                let token_vault =
                    Arc::new(TokenVault::new(spapi.clone(), credential_store.clone())?);

                if let Some(refresh_token) = &config.marketplace_refresh_token {
                    let existing = credential_store
                        .get(default_tenant_id(), PROVIDER_SPAPI)
                        .await
                        .map_err(AppError::from)?;
                    if existing.is_none() {
                        credential_store
                            .upsert(Credential::seed(
                                default_tenant_id(),
                                PROVIDER_SPAPI,
                                refresh_token.clone(),
                            ))
                            .await
                            .map_err(AppError::from)?;
                    }
                }

                let throttle = Arc::new(TokenBucketThrottle::new(ThrottleConfig::new(
                    config.marketplace_rate_per_sec,
                    config.marketplace_burst,
                )));
                let client = Arc::new(SpApiClient::new(
                    spapi,
                    token_vault.clone(),
                    throttle,
                    archiver.clone(),
                )?);

                let marketplace_ids: Vec<String> =
                    config.marketplace_id.iter().cloned().collect();
                connectors.push(Arc::new(MarketplaceConnector::new(
                    client,
                    engine.clone(),
                    inventory.clone(),
                    marketplace_ids,
                    config.marketplace_enabled(),
                )));
                vault = Some(token_vault);
            },
            _ => {
                tracing::warn!(
                    "Marketplace credentials not configured; marketplace connector disabled"
                );
            },
        }

        let registry = Arc::new(ConnectorRegistry::new(connectors));
        let orchestrator = SyncOrchestrator::new(
            OrchestratorConfig::from_config(&config),
            registry.clone(),
            engine.clone(),
            claim_pipeline.clone(),
            sync_logs.clone(),
            bus.clone(),
            root_cancel.clone(),
        );

        Ok(Self {
            config,
            root_cancel,
            bus,
            vault,
            inventory,
            discrepancies,
            rules,
            claims,
            sync_logs,
            engine,
            claim_pipeline,
            registry,
            orchestrator,
            billing: Arc::new(CommissionBillingService::new()),
            notifications,
        })
    }
}
