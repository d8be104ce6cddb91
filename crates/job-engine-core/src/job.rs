//! The persistent job record and its lifecycle states.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A job's position in its lifecycle.
///
/// PENDING and RETRYING are the only states a worker will pick up; SUCCESS
/// and FAILED are terminal and must never be left by any component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    Running,
    Success,
    Failed,
    Retrying,
}

impl JobState {
    /// States in which the worker is allowed to start (or resume) an attempt.
    pub const fn is_runnable(self) -> bool {
        matches!(self, JobState::Pending | JobState::Retrying)
    }

    /// SUCCESS and FAILED never transition further.
    pub const fn is_terminal(self) -> bool {
        matches!(self, JobState::Success | JobState::Failed)
    }
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            JobState::Pending => "pending",
            JobState::Running => "running",
            JobState::Success => "success",
            JobState::Failed => "failed",
            JobState::Retrying => "retrying",
        };
        f.write_str(s)
    }
}

/// The persistent record of a single job, as defined by the job store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub job_type: String,
    pub state: JobState,
    pub payload: serde_json::Value,
    pub result: Option<serde_json::Value>,
    pub attempt: i32,
    pub max_retries: i32,
    pub retry_delay_seconds: f64,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<f64>,
}

impl Job {
    /// Build a freshly-submitted job in PENDING, as the HTTP submission layer does.
    pub fn new(
        job_type: impl Into<String>,
        payload: serde_json::Value,
        max_retries: i32,
        retry_delay_seconds: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            job_type: job_type.into(),
            state: JobState::Pending,
            payload,
            result: None,
            attempt: 0,
            max_retries,
            retry_delay_seconds,
            last_error: None,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            duration_seconds: None,
        }
    }

    /// Whether a subsequent attempt is permitted after the current one fails.
    ///
    /// `attempt` already reflects the attempt that just ran; this mirrors the
    /// spec's finalise-time boundary check `attempt <= max_retries`.
    pub const fn has_retries_remaining(&self) -> bool {
        self.attempt <= self.max_retries
    }
}
