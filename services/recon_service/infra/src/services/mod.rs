pub mod claims;
pub mod orchestrator;
pub mod reconciliation;

#[cfg(test)]
mod claims_tests;
#[cfg(test)]
mod reconciliation_tests;

pub use claims::{ClaimPipeline, ClaimPipelineConfig};
pub use orchestrator::{OrchestratorConfig, SyncOrchestrator};
pub use reconciliation::ReconEngine;
