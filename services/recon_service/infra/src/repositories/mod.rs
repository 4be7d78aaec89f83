//! In-memory repository implementations
//!
//! Tenant-partitioned maps behind `tokio::sync::RwLock`. These are the
//! single-process stores the pipeline runs against; a relational backend
//! can replace any of them behind the same trait.

pub mod claims;
pub mod discrepancy;
pub mod inventory;
pub mod rules;
pub mod sync_log;

pub use claims::InMemoryClaimRepository;
pub use discrepancy::InMemoryDiscrepancyRepository;
pub use inventory::InMemoryInventoryRepository;
pub use rules::InMemoryRuleRepository;
pub use sync_log::InMemorySyncLogRepository;
