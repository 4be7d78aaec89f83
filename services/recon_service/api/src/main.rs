use recon_service_api::{state::AppState, worker};
use shared_config::Config;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    let state = AppState::build(config).await?;

    if let Some(vault) = state.vault.clone() {
        tokio::spawn(vault.run_sweeper(state.root_cancel.child_token()));
    }
    tokio::spawn(worker::run_job_eviction(
        state.orchestrator.clone(),
        state.root_cancel.child_token(),
    ));

    tracing::info!("Reconciliation service up");

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down, cancelling in-flight work");
    state.root_cancel.cancel();

    // Give running jobs a moment to observe cancellation and publish
    // their terminal state.
    tokio::time::sleep(std::time::Duration::from_secs(2)).await;
    Ok(())
}
