//! Outbound ports
//!
//! Notification and billing live outside the core; these traits are the
//! narrow seams the pipeline emits through. Failures behind either port
//! degrade the feature, never the sync.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use shared_error::AppError;
use shared_events::NotificationEvent;
use std::collections::BTreeMap;
use uuid::Uuid;

#[async_trait]
pub trait NotificationPort: Send + Sync {
    async fn process_event(&self, event: NotificationEvent) -> Result<(), AppError>;
}

/// A commission charge against a recovered amount
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionCharge {
    pub dispute_id: String,
    pub user_id: Uuid,
    pub amount_recovered_cents: i64,
    pub currency: String,
    pub idempotency_key: String,
    pub metadata: BTreeMap<String, String>,
}

/// Outcome of a commission charge
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommissionReceipt {
    pub stripe_transaction_id: String,
    pub platform_fee_cents: i64,
    pub seller_payout_cents: i64,
}

#[async_trait]
pub trait BillingPort: Send + Sync {
    async fn get_or_create_stripe_customer_id(
        &self,
        tenant_id: Uuid,
        email: &str,
    ) -> Result<String, AppError>;

    /// Charge the platform commission for a recovered claim. Charges are
    /// idempotent on `idempotency_key`: replays return the original
    /// receipt.
    async fn charge_commission(
        &self,
        charge: CommissionCharge,
    ) -> Result<CommissionReceipt, AppError>;
}
