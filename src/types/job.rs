//! Job lifecycle: status enum, transition rules and the cached payload.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{ClusterResult, QueryParams};

/// Job status.
///
/// Allowed transitions:
/// - `New` → `InProgress` | `Done` (zero records) | `Failed`
/// - `InProgress` → `Done` | `Failed`
///
/// `Done` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    New,
    InProgress,
    Done,
    Failed,
}

impl JobStatus {
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::New, Self::InProgress | Self::Done | Self::Failed)
                | (Self::InProgress, Self::Done | Self::Failed)
        )
    }

    pub const fn is_terminal(self) -> bool {
        match self {
            Self::Done | Self::Failed => true,
            Self::New | Self::InProgress => false,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::New => write!(f, "NEW"),
            Self::InProgress => write!(f, "IN_PROGRESS"),
            Self::Done => write!(f, "DONE"),
            Self::Failed => write!(f, "FAILED"),
        }
    }
}

/// Rejected status change.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("illegal job transition {from} -> {to}")]
    Illegal { from: JobStatus, to: JobStatus },
    #[error("results must pass through IN_PROGRESS before DONE")]
    SkippedInProgress,
}

/// The cached job payload returned to pollers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub query: QueryParams,
    pub status: JobStatus,
    #[serde(default)]
    pub clusters: Vec<ClusterResult>,
    /// Failure reason, only for `FAILED`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl Job {
    pub const fn new(query: QueryParams) -> Self {
        Self {
            query,
            status: JobStatus::New,
            clusters: Vec::new(),
            reason: None,
        }
    }

    pub fn transition(&mut self, next: JobStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(next) {
            return Err(TransitionError::Illegal {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }

    /// Finalize with results. Non-empty results are only accepted from
    /// `IN_PROGRESS`; `NEW` may only finish with an empty list.
    pub fn complete(&mut self, clusters: Vec<ClusterResult>) -> Result<(), TransitionError> {
        if self.status == JobStatus::New && !clusters.is_empty() {
            return Err(TransitionError::SkippedInProgress);
        }
        self.transition(JobStatus::Done)?;
        self.clusters = clusters;
        Ok(())
    }

    pub fn fail(&mut self, reason: impl Into<String>) -> Result<(), TransitionError> {
        self.transition(JobStatus::Failed)?;
        self.clusters.clear();
        self.reason = Some(reason.into());
        Ok(())
    }

    pub fn to_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    pub fn from_bytes(bytes: &[u8]) -> serde_json::Result<Self> {
        serde_json::from_slice(bytes)
    }
}
