//! Event types and the in-process progress bus
//!
//! Sync jobs publish their state transitions here; transport adapters
//! subscribe and fan events out to callers (SSE). The bus is deliberately
//! lossy - callers that fall behind re-poll job state for catch-up.

pub mod bus;
pub mod events;

pub use bus::{JobSubscription, ProgressBus};
pub use events::{sse_frame, EventEnvelope, NotificationEvent, NotificationKind, ProgressEvent};
