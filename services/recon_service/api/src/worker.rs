//! Background maintenance workers
//!
//! The credential sweeper lives in the vault; this module adds the job
//! eviction loop that keeps the in-memory job map bounded.

use recon_service_infra::services::SyncOrchestrator;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

const EVICTION_INTERVAL: Duration = Duration::from_secs(3600);

/// Periodically evict stale terminal jobs until cancelled.
pub async fn run_job_eviction(orchestrator: SyncOrchestrator, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(EVICTION_INTERVAL);
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Job eviction worker stopping");
                return;
            },
            _ = interval.tick() => {},
        }

        let evicted = orchestrator.evict_stale_jobs().await;
        if evicted > 0 {
            tracing::info!(evicted = %evicted, "Evicted stale sync jobs");
        }
    }
}
