//! Sync orchestrator
//!
//! Owns the job state machine and the progress bus. `start_sync_job`
//! returns immediately; execution runs on a spawned task gated by a
//! global semaphore. Per-source failures stay per-source: the job
//! completes when at least one source succeeds, retries the whole run on
//! total failure, and honours cooperative cancellation everywhere it
//! suspends. All bus publishes for a job happen on its task, so events
//! are totally ordered per job.

use crate::connectors::ConnectorRegistry;
use chrono::Utc;
use recon_service_core::domains::sync::{JobState, SyncJob, SyncJobKind, SyncLog};
use recon_service_core::repositories::sync_log::SyncLogRepository;
use recon_service_core::services::claims::ClaimIntegrationService;
use recon_service_core::services::orchestrator::SyncService;
use recon_service_core::services::reconciliation::ReconciliationService;
use shared_error::AppError;
use shared_events::{ProgressBus, ProgressEvent};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{RwLock, Semaphore};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub max_jobs_global: usize,
    pub job_timeout: Duration,
    pub job_max_age: Duration,
    pub retry_base: Duration,
    pub max_attempts: u32,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_jobs_global: 16,
            job_timeout: Duration::from_secs(3600),
            job_max_age: Duration::from_secs(86_400),
            retry_base: Duration::from_secs(5),
            max_attempts: 3,
        }
    }
}

impl OrchestratorConfig {
    pub fn from_config(config: &shared_config::Config) -> Self {
        Self {
            max_jobs_global: config.max_jobs_global.max(1),
            job_timeout: Duration::from_secs(config.job_timeout_secs),
            job_max_age: Duration::from_secs(config.job_max_age_secs),
            retry_base: Duration::from_secs(config.job_retry_base_secs),
            max_attempts: config.job_max_attempts.max(1),
        }
    }
}

#[derive(Clone)]
pub struct SyncOrchestrator {
    config: OrchestratorConfig,
    registry: Arc<ConnectorRegistry>,
    engine: Arc<dyn ReconciliationService>,
    claims: Arc<dyn ClaimIntegrationService>,
    sync_logs: Arc<dyn SyncLogRepository>,
    bus: ProgressBus,
    jobs: Arc<RwLock<HashMap<Uuid, SyncJob>>>,
    cancels: Arc<RwLock<HashMap<Uuid, CancellationToken>>>,
    slots: Arc<Semaphore>,
    root_cancel: CancellationToken,
}

impl SyncOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        registry: Arc<ConnectorRegistry>,
        engine: Arc<dyn ReconciliationService>,
        claims: Arc<dyn ClaimIntegrationService>,
        sync_logs: Arc<dyn SyncLogRepository>,
        bus: ProgressBus,
        root_cancel: CancellationToken,
    ) -> Self {
        let slots = Arc::new(Semaphore::new(config.max_jobs_global));
        Self {
            config,
            registry,
            engine,
            claims,
            sync_logs,
            bus,
            jobs: Arc::new(RwLock::new(HashMap::new())),
            cancels: Arc::new(RwLock::new(HashMap::new())),
            slots,
            root_cancel,
        }
    }

    pub fn bus(&self) -> &ProgressBus {
        &self.bus
    }

    /// Drop terminal jobs older than the configured age from the
    /// in-memory map. The sync log store remains authoritative.
    pub async fn evict_stale_jobs(&self) -> usize {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(self.config.job_max_age)
                .unwrap_or_else(|_| chrono::Duration::hours(24));
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, job| {
            !(job.state.is_terminal()
                && job.completed_at.map(|at| at <= cutoff).unwrap_or(false))
        });
        before - jobs.len()
    }

    /// Block until the job reaches a terminal state, or give up.
    pub async fn wait_until_terminal(
        &self,
        job_id: Uuid,
        timeout: Duration,
    ) -> Option<SyncJob> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if let Some(job) = self.snapshot(job_id).await {
                if job.state.is_terminal() {
                    return Some(job);
                }
            }
            if tokio::time::Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    async fn snapshot(&self, job_id: Uuid) -> Option<SyncJob> {
        self.jobs.read().await.get(&job_id).cloned()
    }

    async fn mutate<F: FnOnce(&mut SyncJob)>(&self, job_id: Uuid, f: F) -> Option<SyncJob> {
        let mut jobs = self.jobs.write().await;
        let job = jobs.get_mut(&job_id)?;
        f(job);
        Some(job.clone())
    }

    fn publish(&self, job: &SyncJob) {
        self.bus.publish(ProgressEvent {
            job_id: job.job_id,
            user_id: job.tenant_id,
            percentage: job.progress.percentage,
            current: job.progress.current,
            total: job.progress.total,
            status: job.state.to_string(),
            errors: job.errors.clone(),
            warnings: job.warnings.clone(),
            timestamp: Utc::now(),
        });
    }

    async fn transition_and_publish(&self, job_id: Uuid, next: JobState) {
        if let Some(job) = self
            .mutate(job_id, |job| {
                job.transition(next);
            })
            .await
        {
            self.publish(&job);
        }
    }

    async fn run_job(&self, job_id: Uuid, cancel: CancellationToken) {
        let _permit = match self.slots.clone().acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => return,
        };

        if cancel.is_cancelled() {
            self.transition_and_publish(job_id, JobState::Cancelled).await;
            self.cancels.write().await.remove(&job_id);
            return;
        }

        self.transition_and_publish(job_id, JobState::Running).await;

        let mut attempt: u32 = 0;
        loop {
            let result =
                match tokio::time::timeout(self.config.job_timeout, self.execute(job_id, &cancel))
                    .await
                {
                    Ok(result) => result,
                    Err(_) => Err(AppError::TransientUpstream("job timed out".to_string())),
                };

            match result {
                Ok(()) => {
                    self.transition_and_publish(job_id, JobState::Completed).await;
                    break;
                },
                Err(AppError::Cancelled) => {
                    self.transition_and_publish(job_id, JobState::Cancelled).await;
                    break;
                },
                Err(e) => {
                    if cancel.is_cancelled() {
                        self.transition_and_publish(job_id, JobState::Cancelled).await;
                        break;
                    }
                    attempt += 1;
                    if attempt >= self.config.max_attempts {
                        if let Some(job) = self
                            .mutate(job_id, |job| {
                                job.errors.push(e.to_string());
                                job.transition(JobState::Failed);
                            })
                            .await
                        {
                            self.publish(&job);
                        }
                        break;
                    }

                    let delay = self.config.retry_base * 2u32.pow(attempt - 1);
                    tracing::warn!(
                        job_id = %job_id,
                        attempt = %attempt,
                        delay_ms = %delay.as_millis(),
                        error = %e,
                        "Sync attempt failed, retrying"
                    );
                    if let Some(job) = self
                        .mutate(job_id, |job| {
                            job.attempt = attempt;
                            job.warnings.push(format!("attempt {} failed: {}", attempt, e));
                            // Percentage stays monotonic; only the source
                            // cursor rewinds for the retry.
                            job.progress.current = 0;
                            job.transition(JobState::Running);
                        })
                        .await
                    {
                        self.publish(&job);
                    }

                    tokio::select! {
                        _ = cancel.cancelled() => {
                            self.transition_and_publish(job_id, JobState::Cancelled).await;
                            break;
                        },
                        _ = tokio::time::sleep(delay) => {},
                    }
                },
            }
        }

        self.cancels.write().await.remove(&job_id);
    }

    async fn execute(&self, job_id: Uuid, cancel: &CancellationToken) -> Result<(), AppError> {
        let job = self
            .snapshot(job_id)
            .await
            .ok_or_else(|| AppError::Internal("job evicted mid-run".to_string()))?;
        let tenant_id = job.tenant_id;

        if job.kind == SyncJobKind::DiscrepancyOnly {
            let summary = self.engine.summary(tenant_id).await?;
            self.mutate(job_id, |job| {
                job.metadata.insert(
                    "discrepancy_summary".to_string(),
                    serde_json::to_value(&summary).unwrap_or_default(),
                );
            })
            .await;
            return Ok(());
        }

        let mut successes = 0usize;
        let mut failures = 0usize;

        for source in &job.sources {
            if cancel.is_cancelled() {
                return Err(AppError::Cancelled);
            }

            let Some(connector) = self.registry.get(source) else {
                failures += 1;
                self.record_source_error(job_id, source, "unknown connector").await;
                continue;
            };
            if !connector.is_enabled() {
                if let Some(job) = self
                    .mutate(job_id, |job| {
                        job.warnings.push(format!("{}: disabled, skipped", source));
                    })
                    .await
                {
                    self.publish(&job);
                }
                continue;
            }

            // Incremental resumes from the last completed run; with no
            // history the source degrades to a full pass.
            let since = match job.kind {
                SyncJobKind::Incremental => self
                    .sync_logs
                    .latest_completed(tenant_id, source)
                    .await?
                    .map(|log| log.completed_at),
                _ => None,
            };

            let started_at = Utc::now();
            match connector.collect_discrepancies(tenant_id, since, cancel).await {
                Ok(collected) => {
                    let claims_triggered = match self
                        .claims
                        .process(tenant_id, job_id, &collected.discrepancies)
                        .await
                    {
                        Ok(batch) => {
                            if !batch.errors.is_empty() {
                                self.mutate(job_id, |job| {
                                    job.warnings.extend(batch.errors.iter().cloned());
                                })
                                .await;
                            }
                            batch.claims.len()
                        },
                        Err(e) => {
                            tracing::warn!(
                                job_id = %job_id,
                                source = %source,
                                error = %e,
                                "Claim pipeline failed; sync continues"
                            );
                            self.mutate(job_id, |job| {
                                job.warnings.push(format!("{}: claim pipeline: {}", source, e));
                            })
                            .await;
                            0
                        },
                    };

                    self.sync_logs
                        .append(SyncLog {
                            tenant_id,
                            provider: source.clone(),
                            kind: job.kind,
                            started_at,
                            completed_at: Utc::now(),
                            state: JobState::Completed,
                            items_processed: collected.stats.items_processed,
                            created: collected.stats.created,
                            updated: collected.stats.updated,
                            deactivated: collected.stats.deactivated,
                            discrepancies_found: collected.stats.discrepancies_found,
                            discrepancies_resolved: collected.stats.discrepancies_resolved,
                            claims_triggered,
                            errors: vec![],
                        })
                        .await?;

                    successes += 1;
                    if let Some(job) = self
                        .mutate(job_id, |job| {
                            job.progress.advance();
                        })
                        .await
                    {
                        self.publish(&job);
                    }
                },
                Err(AppError::Cancelled) => return Err(AppError::Cancelled),
                Err(e) => {
                    failures += 1;
                    self.sync_logs
                        .append(SyncLog {
                            tenant_id,
                            provider: source.clone(),
                            kind: job.kind,
                            started_at,
                            completed_at: Utc::now(),
                            state: JobState::Failed,
                            items_processed: 0,
                            created: 0,
                            updated: 0,
                            deactivated: 0,
                            discrepancies_found: 0,
                            discrepancies_resolved: 0,
                            claims_triggered: 0,
                            errors: vec![e.to_string()],
                        })
                        .await?;
                    self.record_source_error(job_id, source, &e.to_string()).await;
                },
            }
        }

        // Partial success completes the job; total failure retries it.
        if successes == 0 && failures > 0 {
            return Err(AppError::Internal(format!(
                "all {} sources failed",
                failures
            )));
        }
        Ok(())
    }

    async fn record_source_error(&self, job_id: Uuid, source: &str, message: &str) {
        let full = format!("{}: {}", source, message);
        if let Some(job) = self
            .mutate(job_id, |job| {
                job.errors.push(full.clone());
                let errors = job
                    .metadata
                    .entry("errors".to_string())
                    .or_insert_with(|| serde_json::Value::Array(Vec::new()));
                if let serde_json::Value::Array(list) = errors {
                    list.push(serde_json::Value::String(full.clone()));
                }
            })
            .await
        {
            self.publish(&job);
        }
    }
}

#[async_trait::async_trait]
impl SyncService for SyncOrchestrator {
    async fn start_sync_job(
        &self,
        tenant_id: Uuid,
        kind: SyncJobKind,
        sources: Vec<String>,
    ) -> Result<Uuid, AppError> {
        let sources = match kind {
            SyncJobKind::DiscrepancyOnly => Vec::new(),
            _ if sources.is_empty() => self.registry.enabled_names(),
            _ => sources,
        };
        if kind != SyncJobKind::DiscrepancyOnly && sources.is_empty() {
            return Err(AppError::Validation(
                "no enabled sources to sync".to_string(),
            ));
        }

        let job = SyncJob::new(tenant_id, kind, sources);
        let job_id = job.job_id;

        let cancel = self.root_cancel.child_token();
        self.jobs.write().await.insert(job_id, job);
        self.cancels.write().await.insert(job_id, cancel.clone());

        let this = self.clone();
        tokio::spawn(async move {
            this.run_job(job_id, cancel).await;
        });

        tracing::info!(job_id = %job_id, tenant_id = %tenant_id, kind = %kind, "Sync job enqueued");
        Ok(job_id)
    }

    async fn cancel(&self, job_id: Uuid) -> Result<(), AppError> {
        {
            let jobs = self.jobs.read().await;
            let job = jobs
                .get(&job_id)
                .ok_or_else(|| AppError::NotFound(format!("job {}", job_id)))?;
            if job.state != JobState::Running {
                return Err(AppError::Validation(format!(
                    "job {} is {}, only running jobs can be cancelled",
                    job_id, job.state
                )));
            }
        }

        let cancels = self.cancels.read().await;
        if let Some(token) = cancels.get(&job_id) {
            token.cancel();
        }
        tracing::info!(job_id = %job_id, "Cancellation requested");
        Ok(())
    }

    async fn get_job(&self, job_id: Uuid) -> Result<Option<SyncJob>, AppError> {
        Ok(self.snapshot(job_id).await)
    }

    async fn list_jobs(&self, tenant_id: Uuid) -> Result<Vec<SyncJob>, AppError> {
        let jobs = self.jobs.read().await;
        let mut list: Vec<SyncJob> = jobs
            .values()
            .filter(|job| job.tenant_id == tenant_id)
            .cloned()
            .collect();
        list.sort_by_key(|job| job.job_id);
        Ok(list)
    }
}
