//! Queued analysis job model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a queued job.
///
/// `waiting` covers both fresh jobs and jobs scheduled for retry
/// (distinguished by `next_retry_at`). `dead` jobs exhausted their retry
/// budget and are parked for manual inspection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Waiting,
    Active,
    Completed,
    Dead,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Waiting => "waiting",
            Self::Active => "active",
            Self::Completed => "completed",
            Self::Dead => "dead",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "waiting" => Some(Self::Waiting),
            "active" => Some(Self::Active),
            "completed" => Some(Self::Completed),
            "dead" => Some(Self::Dead),
            _ => None,
        }
    }
}

/// A queued unit of analysis work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisJob {
    /// Database row id.
    pub id: i64,
    pub document_id: String,
    pub owner_id: String,
    pub force_refresh: bool,
    pub status: JobStatus,
    /// Number of times a worker has claimed this job.
    pub attempts: u32,
    pub last_error: Option<String>,
    /// Earliest time the next attempt may be claimed.
    pub next_retry_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
}
