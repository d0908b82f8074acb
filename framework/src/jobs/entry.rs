use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use uuid::Uuid;

/// Queue used when a job names none.
pub const DEFAULT_QUEUE: &str = "default";

/// Longest wait between two attempts of a failing job.
const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Lifecycle of a queued job.
///
/// `Pending` and `Running` are live; the other three are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Expired,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Expired)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Running => write!(f, "running"),
            Self::Completed => write!(f, "completed"),
            Self::Failed => write!(f, "failed"),
            Self::Expired => write!(f, "expired"),
        }
    }
}

/// Routing, retry, expiry and scheduling for one push.
#[derive(Debug, Clone)]
pub struct JobOpts {
    /// Named queue the job is pushed onto.
    pub queue: String,
    /// Maximum number of attempts (including the first).
    pub max_attempts: i32,
    /// If set, the job is skipped when claimed after this long since creation.
    pub expires_in: Option<Duration>,
    /// Delay before the job becomes eligible for processing.
    pub delay: Option<Duration>,
}

impl Default for JobOpts {
    fn default() -> Self {
        Self {
            queue: DEFAULT_QUEUE.to_string(),
            max_attempts: 3,
            expires_in: None,
            delay: None,
        }
    }
}

/// A job as a queue holds it: the serialized payload plus its bookkeeping.
///
/// Queued mail is one of these with a `job_type` naming the mailable and a
/// payload holding its compressed snapshot. Workers move an entry through
/// its [`JobStatus`] with the transition methods below and write it back
/// with [`QueueProvider::update`](super::QueueProvider::update).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobEntry {
    pub id: Uuid,
    pub queue: String,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub status: JobStatus,
    pub attempts: i32,
    pub max_attempts: i32,
    pub run_at: OffsetDateTime,
    pub expires_at: Option<OffsetDateTime>,
    pub locked_at: Option<OffsetDateTime>,
    pub locked_by: Option<String>,
    pub last_error: Option<String>,
    pub result: Option<serde_json::Value>,
    pub created_at: OffsetDateTime,
    pub completed_at: Option<OffsetDateTime>,
}

impl JobEntry {
    /// A fresh pending entry. `run_at` is now plus `opts.delay`.
    pub fn new(job_type: impl Into<String>, payload: serde_json::Value, opts: &JobOpts) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            id: Uuid::new_v4(),
            queue: opts.queue.clone(),
            job_type: job_type.into(),
            payload,
            status: JobStatus::Pending,
            attempts: 0,
            max_attempts: opts.max_attempts,
            run_at: opts.delay.map_or(now, |d| now + d),
            expires_at: opts.expires_in.map(|d| now + d),
            locked_at: None,
            locked_by: None,
            last_error: None,
            result: None,
            created_at: now,
            completed_at: None,
        }
    }

    /// Pending on `queue` and due at `now`.
    pub fn is_claimable(&self, queue: &str, now: OffsetDateTime) -> bool {
        self.queue == queue && self.status == JobStatus::Pending && self.run_at <= now
    }

    pub fn is_expired(&self, now: OffsetDateTime) -> bool {
        self.expires_at.is_some_and(|at| at < now)
    }

    /// Lock the entry for `worker_id` and count the attempt.
    pub fn claim(&mut self, worker_id: &str, now: OffsetDateTime) {
        self.status = JobStatus::Running;
        self.locked_at = Some(now);
        self.locked_by = Some(worker_id.to_string());
        self.attempts += 1;
    }

    pub fn complete(&mut self, result: Option<serde_json::Value>) {
        self.result = result;
        self.finish(JobStatus::Completed);
    }

    pub fn expire(&mut self) {
        self.finish(JobStatus::Expired);
    }

    /// Record a failed attempt. The entry goes back to pending with an
    /// exponential backoff while attempts remain, otherwise it fails for good.
    /// Returns the backoff when a retry was scheduled.
    pub fn fail(&mut self, error: impl Into<String>) -> Option<Duration> {
        if self.attempts >= self.max_attempts {
            self.abandon(error);
            return None;
        }

        let backoff = self.backoff();
        self.unlock(error);
        self.status = JobStatus::Pending;
        self.run_at = OffsetDateTime::now_utc() + backoff;
        Some(backoff)
    }

    /// Fail without retrying, whatever attempts remain.
    pub fn abandon(&mut self, error: impl Into<String>) {
        self.unlock(error);
        self.finish(JobStatus::Failed);
    }

    /// `2^attempts` seconds, capped at five minutes.
    pub fn backoff(&self) -> Duration {
        let secs = 2_u64.saturating_pow(self.attempts.max(0) as u32);
        Duration::from_secs(secs).min(MAX_BACKOFF)
    }

    fn unlock(&mut self, error: impl Into<String>) {
        self.last_error = Some(error.into());
        self.locked_at = None;
        self.locked_by = None;
    }

    fn finish(&mut self, status: JobStatus) {
        self.status = status;
        self.completed_at = Some(OffsetDateTime::now_utc());
    }
}
