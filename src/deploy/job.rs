use crate::utils::errors::{CertimateError, ProtocolError, Result};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

/// Per-target progress of a remote deployment job
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct JobCounts {
    pub running: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub total: u64,
}

impl JobCounts {
    /// A job reporting zero targets has not materialized yet.
    pub fn is_terminal(&self) -> bool {
        self.total > 0 && self.succeeded + self.failed >= self.total
    }
}

impl fmt::Display for JobCounts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "running: {}, succeeded: {}, failed: {}, total: {}",
            self.running, self.succeeded, self.failed, self.total
        )
    }
}

/// Raw poll response. Vendors may omit any field; only a missing total
/// is treated as a broken response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct JobStatus {
    pub running: Option<u64>,
    pub succeeded: Option<u64>,
    pub failed: Option<u64>,
    pub total: Option<u64>,
}

impl JobStatus {
    pub fn from_counts(counts: JobCounts) -> Self {
        Self {
            running: Some(counts.running),
            succeeded: Some(counts.succeeded),
            failed: Some(counts.failed),
            total: Some(counts.total),
        }
    }

    pub fn counts(&self) -> Result<JobCounts> {
        let total = self.total.ok_or_else(|| {
            ProtocolError::UnexpectedJobStatus("poll response carries no total count".to_string())
        })?;
        Ok(JobCounts {
            running: self.running.unwrap_or_default(),
            succeeded: self.succeeded.unwrap_or_default(),
            failed: self.failed.unwrap_or_default(),
            total,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum JobState {
    NotSubmitted,
    Submitted,
    Polling,
    Succeeded,
    PartiallyFailed,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Succeeded | JobState::PartiallyFailed | JobState::Failed
        )
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            JobState::NotSubmitted => "not submitted",
            JobState::Submitted => "submitted",
            JobState::Polling => "polling",
            JobState::Succeeded => "succeeded",
            JobState::PartiallyFailed => "partially failed",
            JobState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A submitted job; only [`DeploymentJob::observe`] mutates it.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentJob {
    job_id: String,
    submitted_at: DateTime<Utc>,
    counts: JobCounts,
    state: JobState,
    polls: u32,
}

impl DeploymentJob {
    pub fn submitted(job_id: impl Into<String>) -> Self {
        Self {
            job_id: job_id.into(),
            submitted_at: Utc::now(),
            counts: JobCounts::default(),
            state: JobState::Submitted,
            polls: 0,
        }
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn submitted_at(&self) -> DateTime<Utc> {
        self.submitted_at
    }

    pub fn counts(&self) -> JobCounts {
        self.counts
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn polls(&self) -> u32 {
        self.polls
    }

    /// Apply one poll response and return the new state.
    pub fn observe(&mut self, status: JobStatus) -> Result<JobState> {
        let counts = status.counts()?;
        self.polls += 1;
        self.counts = counts;
        self.state = if !counts.is_terminal() {
            JobState::Polling
        } else if counts.failed == 0 {
            JobState::Succeeded
        } else if counts.succeeded > 0 {
            JobState::PartiallyFailed
        } else {
            JobState::Failed
        };
        Ok(self.state)
    }

    /// `Ok` on success, the failure carrying the last counts otherwise.
    pub fn outcome(&self) -> Result<()> {
        match self.state {
            JobState::Succeeded => Ok(()),
            JobState::PartiallyFailed | JobState::Failed => Err(CertimateError::DeploymentFailed {
                job_id: self.job_id.clone(),
                counts: self.counts,
            }),
            other => Err(ProtocolError::UnexpectedJobStatus(format!(
                "job {} is still {other}",
                self.job_id
            ))
            .into()),
        }
    }
}
