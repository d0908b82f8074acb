//! The queue driver behind `Mailer::queue` and `Mailer::later`.
//!
//! # Architecture
//!
//! - [`Job`]: serializable work with a `perform` step.
//! - [`JobEntry`]: a pushed job plus its attempts, schedule and outcome. It
//!   owns the status transitions (claim, complete, retry, expire).
//! - [`QueueProvider`]: push, claim and write-back over named queues.
//! - [`MemoryQueue`]: in-process provider for development and tests.
//! - [`JobRegistry`]: job type name to handler lookup for workers.
//! - [`Worker`]: polls one named queue and runs what it claims.
//!
//! Queued mail goes through this module: the mailer wraps each mailable in a
//! [`SendQueuedMailable`](crate::mail::SendQueuedMailable) job.
//!
//! # Quick Start
//!
//! ```ignore
//! let queue = Arc::new(MemoryQueue::new());
//! mailer.queue(&OrderShipped::new(order), None).await?;
//!
//! let registry = JobRegistry::new().register::<SendQueuedMailable<OrderShipped>>();
//! Worker::new(queue, registry, mailer).queue("default").start();
//! ```

mod entry;
mod memory;
mod registry;
mod traits;
mod worker;

pub use entry::{JobEntry, JobOpts, JobStatus, DEFAULT_QUEUE};
pub use memory::MemoryQueue;
pub use registry::JobRegistry;
pub use traits::{Job, JobResult, QueueProvider};
pub use worker::Worker;

use uuid::Uuid;

// -------------------------------------------------------------------------
// Errors
// -------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum JobError {
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

// -------------------------------------------------------------------------
// Helpers
// -------------------------------------------------------------------------

/// Serialize a [`Job`] into a [`JobEntry`] using its default options.
pub fn into_entry<J: Job>(job: &J) -> Result<JobEntry, JobError> {
    into_entry_with(job, J::default_opts())
}

/// Serialize a [`Job`] into a [`JobEntry`] with explicit options.
pub fn into_entry_with<J: Job>(job: &J, opts: JobOpts) -> Result<JobEntry, JobError> {
    Ok(JobEntry::new(J::JOB_TYPE, serde_json::to_value(job)?, &opts))
}

/// Convenience: serialize a job and insert it into the queue in one call.
pub async fn enqueue<J: Job>(
    queue: &(impl QueueProvider + ?Sized),
    job: J,
) -> Result<Uuid, JobError> {
    let entry = into_entry(&job)?;
    let id = entry.id;
    queue.insert(&entry).await?;
    Ok(id)
}

/// Convenience: serialize a job with options and insert it into the queue.
pub async fn enqueue_with<J: Job>(
    queue: &(impl QueueProvider + ?Sized),
    job: J,
    opts: JobOpts,
) -> Result<Uuid, JobError> {
    let entry = into_entry_with(&job, opts)?;
    let id = entry.id;
    tracing::debug!(%id, job_type = J::JOB_TYPE, queue = %entry.queue, "enqueuing job");
    queue.insert(&entry).await?;
    Ok(id)
}
