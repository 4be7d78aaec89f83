//! Selling Partner API client
//!
//! Typed wrapper around the marketplace endpoints used by the
//! reconciliation pipeline: token lifecycle (vault + rotation + sweeper),
//! rate-limited paginated fetches surfaced as lazy record streams, report
//! creation and polling, and content-addressed archival of every raw
//! payload through the [`archive::Archiver`] port.

pub mod archive;
pub mod client;
pub mod config;
pub mod error;
pub mod types;
pub mod vault;

pub use client::SpApiClient;
pub use config::{region_host, SpApiConfig, PROVIDER_SPAPI};
pub use error::{Result, SpApiError};
pub use vault::{CredentialStore, InMemoryCredentialStore, TokenVault};
