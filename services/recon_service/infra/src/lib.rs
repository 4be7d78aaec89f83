//! Reconciliation Service Infrastructure
//!
//! Implementations behind the core's trait seams: in-memory stores, the
//! S3 payload archiver, the marketplace connector, downstream HTTP
//! clients, the reconciliation engine, the claim pipeline and the sync
//! orchestrator.

pub mod archive;
pub mod clients;
pub mod connectors;
pub mod repositories;
pub mod services;
