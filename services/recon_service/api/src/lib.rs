//! Reconciliation service wiring
//!
//! Builds the dependency graph out of configuration and runs the
//! background workers. Exposed as a library so integration tests can
//! assemble the same graph against fake upstreams.

pub mod state;
pub mod worker;

pub use state::{default_tenant_id, AppState};
