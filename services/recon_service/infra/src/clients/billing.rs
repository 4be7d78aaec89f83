//! Billing port implementation
//!
//! Commission math runs here; the Stripe interaction itself lives in the
//! external billing service. Charges are idempotent on their key, so a
//! replayed charge returns the original transaction id.

use async_trait::async_trait;
use hex::encode as hex_encode;
use recon_service_core::domains::billing::commission_split;
use recon_service_core::services::ports::{BillingPort, CommissionCharge, CommissionReceipt};
use sha2::{Digest, Sha256};
use shared_error::AppError;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Default)]
pub struct CommissionBillingService {
    customers: Mutex<HashMap<Uuid, String>>,
    charges: Mutex<HashMap<String, CommissionReceipt>>,
}

impl CommissionBillingService {
    pub fn new() -> Self {
        Self::default()
    }

    fn transaction_id(idempotency_key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(idempotency_key.as_bytes());
        let digest = hex_encode(hasher.finalize());
        format!("txn_{}", &digest[..16])
    }
}

#[async_trait]
impl BillingPort for CommissionBillingService {
    async fn get_or_create_stripe_customer_id(
        &self,
        tenant_id: Uuid,
        email: &str,
    ) -> Result<String, AppError> {
        let mut customers = self.customers.lock().await;
        if let Some(existing) = customers.get(&tenant_id) {
            return Ok(existing.clone());
        }
        let mut hasher = Sha256::new();
        hasher.update(tenant_id.as_bytes());
        hasher.update(email.to_lowercase().as_bytes());
        let customer_id = format!("cus_{}", &hex_encode(hasher.finalize())[..14]);
        customers.insert(tenant_id, customer_id.clone());
        Ok(customer_id)
    }

    async fn charge_commission(
        &self,
        charge: CommissionCharge,
    ) -> Result<CommissionReceipt, AppError> {
        if charge.amount_recovered_cents < 0 {
            return Err(AppError::Validation(
                "recovered amount must not be negative".to_string(),
            ));
        }

        let mut charges = self.charges.lock().await;
        if let Some(existing) = charges.get(&charge.idempotency_key) {
            tracing::debug!(
                idempotency_key = %charge.idempotency_key,
                "Replayed commission charge, returning original receipt"
            );
            return Ok(existing.clone());
        }

        let split = commission_split(charge.amount_recovered_cents);
        let receipt = CommissionReceipt {
            stripe_transaction_id: Self::transaction_id(&charge.idempotency_key),
            platform_fee_cents: split.platform_fee_cents,
            seller_payout_cents: split.seller_payout_cents,
        };

        tracing::info!(
            dispute_id = %charge.dispute_id,
            user_id = %charge.user_id,
            amount_recovered_cents = %charge.amount_recovered_cents,
            platform_fee_cents = %receipt.platform_fee_cents,
            "Commission charged"
        );

        charges.insert(charge.idempotency_key.clone(), receipt.clone());
        Ok(receipt)
    }
}
