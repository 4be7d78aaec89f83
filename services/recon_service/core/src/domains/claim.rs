//! Claim candidate entities and grading
//!
//! A claim is a monetary reimbursement candidate derived from a
//! discrepancy. Classification, risk grading and payout estimation are
//! pure functions over `(kind, severity, confidence)` so the integration
//! layer stays declarative.

use crate::domains::discrepancy::Severity;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClaimKind {
    MissingUnits,
    Overcharge,
    Damage,
    DelayedShipment,
    Other,
}

impl fmt::Display for ClaimKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClaimKind::MissingUnits => "missing_units",
            ClaimKind::Overcharge => "overcharge",
            ClaimKind::Damage => "damage",
            ClaimKind::DelayedShipment => "delayed_shipment",
            ClaimKind::Other => "other",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ClaimStatus {
    Pending,
    Validated,
    Submitted,
    Approved,
    Rejected,
}

impl fmt::Display for ClaimStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ClaimStatus::Pending => "pending",
            ClaimStatus::Validated => "validated",
            ClaimStatus::Submitted => "submitted",
            ClaimStatus::Approved => "approved",
            ClaimStatus::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        };
        f.write_str(s)
    }
}

/// One piece of supporting evidence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProofItem {
    /// e.g. `inventory_snapshot`, `value_comparison`, `mcde_document`
    #[serde(rename = "type")]
    pub kind: String,
    pub timestamp: DateTime<Utc>,
    pub payload: serde_json::Value,
}

impl ProofItem {
    pub fn new(kind: &str, payload: serde_json::Value) -> Self {
        Self {
            kind: kind.to_string(),
            timestamp: Utc::now(),
            payload,
        }
    }
}

/// Append-only audit record on a claim
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEntry {
    pub at: DateTime<Utc>,
    pub action: String,
    pub detail: String,
}

impl AuditEntry {
    pub fn new(action: &str, detail: impl Into<String>) -> Self {
        Self {
            at: Utc::now(),
            action: action.to_string(),
            detail: detail.into(),
        }
    }
}

/// A monetary reimbursement candidate
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClaimCandidate {
    pub claim_id: Uuid,
    pub tenant_id: Uuid,
    pub discrepancy_id: Uuid,
    pub sku: String,
    pub kind: ClaimKind,
    /// Never negative
    pub amount: Decimal,
    pub currency: String,
    pub confidence: f64,
    pub status: ClaimStatus,
    pub estimated_payout_at: DateTime<Utc>,
    pub risk: RiskLevel,
    pub risk_factors: Vec<String>,
    pub mitigation_steps: Vec<String>,
    pub evidence: Vec<ProofItem>,
    pub audit_trail: Vec<AuditEntry>,
    pub created_at: DateTime<Utc>,
}

/// Classify a discrepancy into a claim kind. Quantity discrepancies split
/// by direction: marketplace short of internal means missing units, the
/// reverse an overcharge.
pub fn determine_claim_type(kind: &str, discrepancy_amount: i64) -> ClaimKind {
    match kind {
        "quantity" => {
            if discrepancy_amount < 0 {
                ClaimKind::MissingUnits
            } else if discrepancy_amount > 0 {
                ClaimKind::Overcharge
            } else {
                ClaimKind::Other
            }
        },
        "status" => ClaimKind::Damage,
        _ => ClaimKind::Other,
    }
}

/// Risk grading table over `(severity, confidence)`
pub fn assess_risk(severity: Severity, confidence: f64) -> RiskLevel {
    if severity == Severity::Critical || confidence < 0.6 {
        RiskLevel::High
    } else if severity == Severity::High || confidence < 0.8 {
        RiskLevel::Medium
    } else {
        RiskLevel::Low
    }
}

/// Static decision table for risk factors and mitigations
pub fn risk_details(severity: Severity, confidence: f64) -> (Vec<String>, Vec<String>) {
    let mut factors = Vec::new();
    let mut mitigations = Vec::new();

    if severity >= Severity::High {
        factors.push(format!("{} severity discrepancy", severity));
        mitigations.push("Attach full inventory snapshot history".to_string());
    }
    if confidence < 0.6 {
        factors.push("Low detection confidence".to_string());
        mitigations.push("Manual review before submission".to_string());
    } else if confidence < 0.8 {
        factors.push("Moderate detection confidence".to_string());
        mitigations.push("Cross-check against recent settlement data".to_string());
    }
    if factors.is_empty() {
        factors.push("Routine discrepancy".to_string());
        mitigations.push("Standard evidence bundle".to_string());
    }
    (factors, mitigations)
}

/// Estimated payout delay in days:
/// `base_days(severity) * multiplier(confidence)`
pub fn estimated_payout_days(severity: Severity, confidence: f64) -> f64 {
    let base_days = match severity {
        Severity::Low => 7.0,
        Severity::Medium => 14.0,
        Severity::High => 21.0,
        Severity::Critical => 30.0,
    };
    let multiplier = if confidence > 0.9 {
        0.8
    } else if confidence > 0.7 {
        1.0
    } else {
        1.2
    };
    base_days * multiplier
}

/// Payout estimate as an absolute instant
pub fn estimated_payout_at(
    severity: Severity,
    confidence: f64,
    now: DateTime<Utc>,
) -> DateTime<Utc> {
    let days = estimated_payout_days(severity, confidence);
    now + Duration::seconds((days * 86_400.0) as i64)
}
