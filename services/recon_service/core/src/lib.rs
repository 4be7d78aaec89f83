//! Reconciliation Service Core
//!
//! This crate contains the business logic, domain models, and trait
//! definitions for the reconciliation and claim-detection engine. It has
//! zero infrastructure dependencies.
//!
//! ## Architecture
//!
//! - `domains/`: Domain entities and business logic
//! - `dto/`: Data Transfer Objects for wire boundaries
//! - `scoring/`: Discrepancy analysis and grading
//! - `repositories/`: Repository trait definitions (no implementations)
//! - `services/`: Service trait definitions (no implementations)

pub mod domains;
pub mod dto;
pub mod repositories;
pub mod scoring;
pub mod services;

// Re-export commonly used types
pub use domains::discrepancy::{
    Discrepancy, DiscrepancyKind, DiscrepancyStatus, Severity, SuggestedAction,
};
pub use domains::sync::{JobState, SyncJob, SyncJobKind};
pub use dto::standardized::StandardizedDiscrepancy;

// Re-export shared error types
pub use shared_error::AppError;

// Result type alias for convenience
pub type Result<T> = std::result::Result<T, AppError>;
