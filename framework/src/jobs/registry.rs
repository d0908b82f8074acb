use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use super::traits::{Job, JobResult};

type HandlerFn<S> = dyn Fn(serde_json::Value, Arc<S>) -> Pin<Box<dyn Future<Output = JobResult> + Send>>
    + Send
    + Sync;

pub(crate) type BoxedHandler<S> = Arc<HandlerFn<S>>;

/// Handlers a [`Worker`](super::Worker) can run, keyed by [`Job::JOB_TYPE`].
///
/// Queued mail needs one `register::<SendQueuedMailable<M>>()` per mailable
/// type; an entry whose type was never registered fails without a retry.
pub struct JobRegistry<S: Send + Sync + 'static> {
    handlers: HashMap<&'static str, BoxedHandler<S>>,
}

impl<S: Send + Sync + 'static> JobRegistry<S> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Add a handler that rebuilds `J` from the entry payload and performs it.
    pub fn register<J: Job<Context = S>>(mut self) -> Self {
        let handler: BoxedHandler<S> = Arc::new(move |payload, ctx| {
            Box::pin(async move {
                let job: J = serde_json::from_value(payload)?;
                job.perform(&ctx).await
            })
        });
        self.handlers.insert(J::JOB_TYPE, handler);
        self
    }

    pub fn contains(&self, job_type: &str) -> bool {
        self.handlers.contains_key(job_type)
    }

    pub(crate) fn get(&self, job_type: &str) -> Option<&BoxedHandler<S>> {
        self.handlers.get(job_type)
    }
}

impl<S: Send + Sync + 'static> Default for JobRegistry<S> {
    fn default() -> Self {
        Self::new()
    }
}
