//! Commission math
//!
//! Fee split over recovered amounts, in currency minor units. The
//! identity `platform_fee + seller_payout = amount_recovered` holds for
//! every non-negative input.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Platform share of recovered amounts
const COMMISSION_RATE: Decimal = Decimal::from_parts(20, 0, 0, false, 2); // 0.20
/// Minimum platform fee in minor units
const MINIMUM_FEE_MINOR: i64 = 50;

/// Split of one recovered amount
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FeeSplit {
    pub platform_fee_cents: i64,
    pub seller_payout_cents: i64,
}

/// Compute the platform fee and seller payout for a recovered amount.
///
/// `platform_fee = max(round(amount * 0.20), 50)`, capped at the amount
/// itself so the payout never goes negative.
pub fn commission_split(amount_recovered_cents: i64) -> FeeSplit {
    let amount = amount_recovered_cents.max(0);
    let raw_fee = (Decimal::from(amount) * COMMISSION_RATE)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .unwrap_or(0);
    let platform_fee_cents = raw_fee.max(MINIMUM_FEE_MINOR).min(amount);
    FeeSplit {
        platform_fee_cents,
        seller_payout_cents: amount - platform_fee_cents,
    }
}

/// Idempotency key for a commission charge
pub fn commission_idempotency_key(dispute_id: &str, timestamp_millis: i64) -> String {
    format!("billing-{}-{}", dispute_id, timestamp_millis)
}
