use std::sync::Arc;
use std::time::Duration;

use time::OffsetDateTime;
use tracing::Instrument;

use super::entry::{JobEntry, JobStatus, DEFAULT_QUEUE};
use super::registry::JobRegistry;
use super::traits::QueueProvider;
use super::JobError;

/// Job processor that polls one named queue of a [`QueueProvider`] and
/// dispatches to handlers registered in a [`JobRegistry`].
///
/// The worker owns all state-transition logic: on success it marks the entry
/// completed, on failure it decides whether to retry (with backoff) or mark
/// permanently failed, and it checks expiry before dispatching.
///
/// ```ignore
/// let registry = JobRegistry::new()
///     .register::<SendQueuedMailable<OrderShipped>>()
///     .register::<SendQueuedMailable<Welcome>>();
///
/// Worker::new(queue, registry, mailer)
///     .queue("emails")
///     .concurrency(8)
///     .poll_interval(Duration::from_millis(500))
///     .start();
/// ```
pub struct Worker<S: Send + Sync + 'static> {
    queue: Arc<dyn QueueProvider>,
    queue_name: String,
    registry: Arc<JobRegistry<S>>,
    ctx: Arc<S>,
    concurrency: usize,
    poll_interval: Duration,
    worker_id: String,
}

impl<S: Send + Sync + 'static> Worker<S> {
    pub fn new(queue: Arc<dyn QueueProvider>, registry: JobRegistry<S>, ctx: S) -> Self {
        Self {
            queue,
            queue_name: DEFAULT_QUEUE.to_string(),
            registry: Arc::new(registry),
            ctx: Arc::new(ctx),
            concurrency: 4,
            poll_interval: Duration::from_secs(1),
            worker_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Named queue to consume (default: `"default"`).
    pub fn queue(mut self, name: impl Into<String>) -> Self {
        self.queue_name = name.into();
        self
    }

    /// Maximum number of jobs processed in parallel (default: 4).
    pub fn concurrency(mut self, n: usize) -> Self {
        self.concurrency = n.max(1);
        self
    }

    /// How often to poll when idle (default: 1s). Backs off slightly during
    /// idle streaks.
    pub fn poll_interval(mut self, d: Duration) -> Self {
        self.poll_interval = d;
        self
    }

    /// Claim and process a single job inline.
    ///
    /// Returns the final status of the processed entry, or `None` when the
    /// queue had nothing eligible.
    pub async fn work_once(&self) -> Result<Option<JobStatus>, JobError> {
        let Some(entry) = self.queue.claim_next(&self.worker_id, &self.queue_name).await? else {
            return Ok(None);
        };
        let status = process(
            self.queue.as_ref(),
            self.registry.as_ref(),
            self.ctx.clone(),
            entry,
        )
        .await;
        Ok(Some(status))
    }

    /// Start the worker loop. Spawns a background tokio task and returns
    /// immediately.
    pub fn start(self) {
        let Self {
            queue,
            queue_name,
            registry,
            ctx,
            concurrency,
            poll_interval,
            worker_id,
        } = self;

        tracing::info!(queue = %queue_name, %worker_id, concurrency, "worker running");

        tokio::spawn(async move {
            let semaphore = Arc::new(tokio::sync::Semaphore::new(concurrency));
            let mut idle_streak: u32 = 0;

            loop {
                let Ok(permit) = semaphore.clone().acquire_owned().await else {
                    break;
                };

                let entry = match queue.claim_next(&worker_id, &queue_name).await {
                    Ok(Some(e)) => e,
                    Ok(None) => {
                        drop(permit);
                        idle_streak = idle_streak.saturating_add(1);
                        let backoff = poll_interval
                            .mul_f64((1.5_f64).min(1.0 + idle_streak as f64 * 0.1));
                        tokio::time::sleep(backoff).await;
                        continue;
                    }
                    Err(e) => {
                        drop(permit);
                        tracing::error!(error = %e, queue = %queue_name, "failed to poll queue");
                        tokio::time::sleep(poll_interval).await;
                        continue;
                    }
                };

                idle_streak = 0;

                let queue = queue.clone();
                let registry = registry.clone();
                let ctx = ctx.clone();

                tokio::spawn(async move {
                    let _permit = permit;
                    process(queue.as_ref(), registry.as_ref(), ctx, entry).await;
                });
            }
        });
    }
}

/// Run one claimed entry to a terminal or retry state and persist it.
async fn process<S: Send + Sync + 'static>(
    queue: &dyn QueueProvider,
    registry: &JobRegistry<S>,
    ctx: Arc<S>,
    mut entry: JobEntry,
) -> JobStatus {
    let job_id = entry.id;
    let job_type = entry.job_type.clone();

    if entry.is_expired(OffsetDateTime::now_utc()) {
        tracing::info!(%job_id, %job_type, "job expired, skipping");
        entry.expire();
        persist(queue, &entry).await;
        return entry.status;
    }

    let Some(handler) = registry.get(&job_type).cloned() else {
        tracing::error!(%job_id, %job_type, "no handler registered");
        entry.abandon("unknown job type");
        persist(queue, &entry).await;
        return entry.status;
    };

    let span = tracing::info_span!("job", %job_id, %job_type, queue = %entry.queue);
    let result = handler(entry.payload.clone(), ctx).instrument(span).await;

    match result {
        Ok(job_result) => {
            tracing::info!(%job_id, %job_type, "job completed");
            entry.complete(job_result);
        }
        Err(e) => {
            let error_msg = e.to_string();
            match entry.fail(error_msg.clone()) {
                Some(backoff) => tracing::warn!(
                    %job_id, %job_type,
                    attempt = entry.attempts,
                    %error_msg,
                    backoff_secs = backoff.as_secs(),
                    "job failed, scheduling retry"
                ),
                None => tracing::error!(
                    %job_id, %job_type,
                    attempts = entry.attempts,
                    %error_msg,
                    "job permanently failed"
                ),
            }
        }
    }

    persist(queue, &entry).await;
    entry.status
}

async fn persist(queue: &dyn QueueProvider, entry: &JobEntry) {
    if let Err(e) = queue.update(entry).await {
        tracing::error!(job_id = %entry.id, error = %e, "failed to persist job state");
    }
}
