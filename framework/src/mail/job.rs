//! Background delivery of queued mailables.

use std::marker::PhantomData;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::mailable::Mailable;
use super::mailer::Mailer;
use crate::jobs::{Job, JobOpts, JobResult};

/// Application state that provides mailer access to queued jobs.
///
/// [`Mailer`] implements it directly; implement it on a larger app state to
/// share one worker context between mail and other jobs:
///
/// ```ignore
/// impl HasMailer for AppState {
///     fn mailer(&self) -> &Mailer {
///         &self.mailer
///     }
/// }
/// ```
pub trait HasMailer: Send + Sync + 'static {
    fn mailer(&self) -> &Mailer;
}

impl HasMailer for Mailer {
    fn mailer(&self) -> &Mailer {
        self
    }
}

/// Job that re-runs the full send pipeline for a queued mailable.
///
/// The payload is the caller's un-built mailable with compressed attachment
/// data. On execution it is decompressed and sent exactly as
/// [`Mailer::send`] would, so `build()` runs again inside the worker.
/// Register one per mailable type:
///
/// ```ignore
/// let registry = JobRegistry::new()
///     .register::<SendQueuedMailable<OrderShipped>>();
/// ```
///
/// Failures are reported to the worker, which retries up to 3 attempts.
#[derive(Serialize, Deserialize)]
pub struct SendQueuedMailable<M, S = Mailer> {
    pub mailable: M,
    #[serde(skip)]
    _context: PhantomData<fn() -> S>,
}

impl<M, S> SendQueuedMailable<M, S> {
    pub fn new(mailable: M) -> Self {
        Self {
            mailable,
            _context: PhantomData,
        }
    }
}

#[async_trait]
impl<M: Mailable, S: HasMailer> Job for SendQueuedMailable<M, S> {
    const JOB_TYPE: &'static str = M::JOB_TYPE;
    type Context = S;

    fn default_opts() -> JobOpts {
        JobOpts {
            max_attempts: 3,
            ..Default::default()
        }
    }

    async fn perform(self, ctx: &Self::Context) -> JobResult {
        let mut mailable = self.mailable;
        mailable.decompress()?;

        let receipt = ctx.mailer().send(&mailable).await?;
        Ok(Some(serde_json::to_value(receipt)?))
    }
}
