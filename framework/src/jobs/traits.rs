use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use super::entry::{JobEntry, JobOpts};
use super::JobError;

/// A serializable job with typed execution logic.
///
/// The job's fields become the serialized payload, and `perform` defines the
/// execution logic. Queued mailables are wrapped in
/// [`SendQueuedMailable`](crate::mail::SendQueuedMailable), which implements
/// this trait.
#[async_trait]
pub trait Job: Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Unique identifier for this job type.
    const JOB_TYPE: &'static str;

    /// Application state provided at execution time.
    type Context: Send + Sync + 'static;

    /// Default options for this job type. Override to customise.
    fn default_opts() -> JobOpts {
        JobOpts::default()
    }

    /// Execute the job. Return `Ok(Some(value))` to store a result for
    /// observability, or `Ok(None)` when there is nothing to record.
    async fn perform(self, ctx: &Self::Context) -> JobResult;
}

/// Convenience alias for the return type of [`Job::perform`].
pub type JobResult = Result<Option<serde_json::Value>, Box<dyn std::error::Error + Send + Sync>>;

/// Where pushed jobs wait for a worker.
///
/// A provider only stores entries and hands them out. The
/// [`Worker`](super::Worker) drives retry, expiry and completion through
/// [`JobEntry`]'s transition methods and calls `update` with the result.
///
/// The trait is object safe so a [`Mailer`](crate::mail::Mailer) can hold any
/// provider behind an `Arc`.
#[async_trait]
pub trait QueueProvider: Send + Sync + 'static {
    /// Insert a new job entry into the queue.
    async fn insert(&self, entry: &JobEntry) -> Result<(), JobError>;

    /// Claim the oldest entry on `queue` that [`JobEntry::is_claimable`] at
    /// the current time, mark it with [`JobEntry::claim`] and return it.
    /// Two concurrent calls must never hand out the same entry.
    async fn claim_next(&self, worker_id: &str, queue: &str)
        -> Result<Option<JobEntry>, JobError>;

    /// Persist an updated job entry, written back by id.
    async fn update(&self, entry: &JobEntry) -> Result<(), JobError>;
}
