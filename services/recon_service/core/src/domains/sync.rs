//! Sync job entities
//!
//! A sync job is one scheduled or manually-triggered execution fetching
//! from one or more sources for a tenant. Terminal states are monotonic:
//! once completed, failed or cancelled, a job never transitions again.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SyncJobKind {
    Full,
    Incremental,
    DiscrepancyOnly,
}

impl fmt::Display for SyncJobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncJobKind::Full => "full",
            SyncJobKind::Incremental => "incremental",
            SyncJobKind::DiscrepancyOnly => "discrepancy_only",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed | JobState::Cancelled)
    }

    /// Legal transitions of the job state machine. Terminal states accept
    /// nothing; retries keep the job in `Running`.
    pub fn can_transition(&self, next: JobState) -> bool {
        match (self, next) {
            (JobState::Pending, JobState::Running) => true,
            (JobState::Pending, JobState::Cancelled) => true,
            (JobState::Running, JobState::Running) => true,
            (JobState::Running, JobState::Completed) => true,
            (JobState::Running, JobState::Failed) => true,
            (JobState::Running, JobState::Cancelled) => true,
            _ => false,
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

impl FromStr for JobState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobState::Pending),
            "running" => Ok(JobState::Running),
            "completed" => Ok(JobState::Completed),
            "failed" => Ok(JobState::Failed),
            "cancelled" => Ok(JobState::Cancelled),
            _ => Err(format!("Unknown job state: {}", s)),
        }
    }
}

/// Progress counters owned exclusively by the job
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncProgress {
    pub current: usize,
    pub total: usize,
    pub percentage: u8,
}

impl SyncProgress {
    pub fn new(total: usize) -> Self {
        Self {
            current: 0,
            total,
            percentage: 0,
        }
    }

    /// Advance by one completed source; percentage is monotonic and only
    /// reaches 100 when every source is done.
    pub fn advance(&mut self) {
        self.current = (self.current + 1).min(self.total);
        let percentage = if self.total == 0 {
            100
        } else {
            ((self.current * 100) / self.total) as u8
        };
        self.percentage = self.percentage.max(percentage);
    }
}

/// One sync execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncJob {
    pub job_id: Uuid,
    pub tenant_id: Uuid,
    pub kind: SyncJobKind,
    pub sources: Vec<String>,
    pub state: JobState,
    pub progress: SyncProgress,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Whole-job retry attempt counter
    pub attempt: u32,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl SyncJob {
    pub fn new(tenant_id: Uuid, kind: SyncJobKind, sources: Vec<String>) -> Self {
        let total = sources.len();
        Self {
            job_id: Uuid::now_v7(),
            tenant_id,
            kind,
            sources,
            state: JobState::Pending,
            progress: SyncProgress::new(total),
            started_at: Utc::now(),
            completed_at: None,
            errors: Vec::new(),
            warnings: Vec::new(),
            attempt: 0,
            metadata: BTreeMap::new(),
        }
    }

    /// Apply a transition, enforcing terminal monotonicity. Returns
    /// whether the transition took effect.
    pub fn transition(&mut self, next: JobState) -> bool {
        if !self.state.can_transition(next) {
            return false;
        }
        self.state = next;
        if next.is_terminal() {
            self.completed_at = Some(Utc::now());
            if next == JobState::Completed {
                self.progress.current = self.progress.total;
                self.progress.percentage = 100;
            }
        }
        true
    }
}

/// Append-only record of a finished sync, keyed by
/// `(tenant_id, provider, started_at)`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncLog {
    pub tenant_id: Uuid,
    pub provider: String,
    pub kind: SyncJobKind,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    pub state: JobState,
    pub items_processed: usize,
    pub created: usize,
    pub updated: usize,
    pub deactivated: usize,
    pub discrepancies_found: usize,
    pub discrepancies_resolved: usize,
    pub claims_triggered: usize,
    pub errors: Vec<String>,
}
