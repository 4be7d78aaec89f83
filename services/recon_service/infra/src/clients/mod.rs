//! Downstream HTTP clients and port implementations
//!
//! Claim Detector, MCDE and Refund Engine are required-to-degrade
//! collaborators: an unreachable service surfaces as
//! `DependencyUnavailable` and the caller omits the feature rather than
//! failing the sync.

pub mod billing;
pub mod claim_detector;
pub mod mcde;
pub mod notification;
pub mod refund_engine;

pub use billing::CommissionBillingService;
pub use claim_detector::ClaimDetectorClient;
pub use mcde::McdeClient;
pub use notification::{LoggingNotificationPort, RecordingNotificationPort};
pub use refund_engine::RefundEngineClient;
