//! Discrepancy domain entities
//!
//! A discrepancy is a detected difference between marketplace state and
//! internal state for one sku and field. Records are ordered by their
//! UUIDv7 id and never reopened once resolved or suppressed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Discrepancy severity, ordered
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        };
        f.write_str(s)
    }
}

impl FromStr for Severity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            _ => Err(format!("Unknown severity: {}", s)),
        }
    }
}

/// What kind of field diverged
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyKind {
    Quantity,
    Price,
    Status,
    Metadata,
}

impl fmt::Display for DiscrepancyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiscrepancyKind::Quantity => "quantity",
            DiscrepancyKind::Price => "price",
            DiscrepancyKind::Status => "status",
            DiscrepancyKind::Metadata => "metadata",
        };
        f.write_str(s)
    }
}

impl FromStr for DiscrepancyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "quantity" => Ok(DiscrepancyKind::Quantity),
            "price" => Ok(DiscrepancyKind::Price),
            "status" => Ok(DiscrepancyKind::Status),
            "metadata" => Ok(DiscrepancyKind::Metadata),
            _ => Err(format!("Unknown discrepancy kind: {}", s)),
        }
    }
}

/// Recommended handling for a discrepancy
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SuggestedAction {
    Investigate,
    AutoResolve,
    Ignore,
    Escalate,
}

impl fmt::Display for SuggestedAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SuggestedAction::Investigate => "investigate",
            SuggestedAction::AutoResolve => "auto_resolve",
            SuggestedAction::Ignore => "ignore",
            SuggestedAction::Escalate => "escalate",
        };
        f.write_str(s)
    }
}

/// Lifecycle status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyStatus {
    Open,
    Resolved,
    Suppressed,
}

impl fmt::Display for DiscrepancyStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DiscrepancyStatus::Open => "open",
            DiscrepancyStatus::Resolved => "resolved",
            DiscrepancyStatus::Suppressed => "suppressed",
        };
        f.write_str(s)
    }
}

/// A detected difference between two systems for one sku
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Discrepancy {
    /// UUIDv7: monotonically ordered within a process
    pub discrepancy_id: Uuid,
    pub tenant_id: Uuid,
    pub sku: String,
    pub kind: DiscrepancyKind,
    pub source_system: String,
    pub source_value: String,
    pub target_system: String,
    pub target_value: String,
    pub severity: Severity,
    /// Confidence in `[0.1, 1.0]`
    pub confidence: f64,
    /// Impact score in `[0, 10]`
    pub impact_score: f64,
    pub suggested_action: SuggestedAction,
    pub status: DiscrepancyStatus,
    pub created_at: DateTime<Utc>,
}

/// Open-discrepancy rollup used by discrepancy-only syncs
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DiscrepancySummary {
    pub open: usize,
    pub resolved: usize,
    pub suppressed: usize,
    pub critical_open: usize,
}

impl DiscrepancySummary {
    pub fn total(&self) -> usize {
        self.open + self.resolved + self.suppressed
    }
}
