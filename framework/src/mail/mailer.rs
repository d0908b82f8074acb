//! The dispatcher behind every terminal verb.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

use super::address::Address;
use super::assembler::Assembler;
use super::builder::{MessageBuilder, ViewData};
use super::job::SendQueuedMailable;
use super::mailable::Mailable;
use super::message::Message;
use super::render::{RenderCoordinator, RenderRequest, Rendered, Renderer, Translator};
use super::storage::{Disks, Storage};
use super::transport::{DeliveryReceipt, Transport};
use super::MailError;
use crate::config::MailConfig;
use crate::jobs::{Job, JobEntry, JobOpts, QueueProvider, DEFAULT_QUEUE};

/// Extra view data injected into every message, merged after the builder's
/// own data and before the mailable's public fields.
pub type ViewDataHook = Arc<dyn Fn(&MessageBuilder) -> ViewData + Send + Sync>;

/// Routes mailables to a transport or onto a queue.
///
/// Cheap to clone; all clones share the same transports and collaborators.
#[derive(Clone)]
pub struct Mailer {
    inner: Arc<Inner>,
}

struct Inner {
    transports: HashMap<String, Arc<dyn Transport>>,
    default_mailer: String,
    coordinator: RenderCoordinator,
    assembler: Assembler,
    queue: Option<Arc<dyn QueueProvider>>,
    default_queue: String,
    view_data_hook: Option<ViewDataHook>,
}

impl fmt::Debug for Mailer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut transports: Vec<_> = self.inner.transports.keys().collect();
        transports.sort();
        f.debug_struct("Mailer")
            .field("transports", &transports)
            .field("default_mailer", &self.inner.default_mailer)
            .field("default_queue", &self.inner.default_queue)
            .finish_non_exhaustive()
    }
}

impl Mailer {
    pub fn builder() -> MailerBuilder {
        MailerBuilder::default()
    }

    pub fn default_mailer(&self) -> &str {
        &self.inner.default_mailer
    }

    pub fn default_queue(&self) -> &str {
        &self.inner.default_queue
    }

    /// Run the pipeline up to rendering and return the primary content
    /// (html when present, else text, else empty).
    pub async fn render<M: Mailable>(&self, mailable: &M) -> Result<String, MailError> {
        tracing::debug!(mailable = M::NAME, "rendering mailable");
        let mailable = built(mailable)?;
        let data = self.view_data(&mailable)?;
        let rendered = self.render_builder(mailable.builder(), data).await?;
        Ok(rendered.primary().unwrap_or_default().to_string())
    }

    /// Run the full pipeline and return the assembled message without
    /// handing it to a transport.
    pub async fn build_message<M: Mailable>(&self, mailable: &M) -> Result<Message, MailError> {
        let mailable = built(mailable)?;
        self.assemble(&mailable).await
    }

    /// Send immediately through the resolved mailer.
    pub async fn send<M: Mailable>(&self, mailable: &M) -> Result<DeliveryReceipt, MailError> {
        self.send_using(mailable, None).await
    }

    /// Send immediately. The mailer name resolves as `mailer`, then the
    /// builder's mailer, then the default.
    pub async fn send_using<M: Mailable>(
        &self,
        mailable: &M,
        mailer: Option<&str>,
    ) -> Result<DeliveryReceipt, MailError> {
        tracing::debug!(mailable = M::NAME, "sending mailable");
        let mailable = built(mailable)?;

        let name = mailer
            .or(mailable.builder().mailer.as_deref())
            .unwrap_or(self.inner.default_mailer.as_str())
            .to_string();
        let transport = self
            .inner
            .transports
            .get(&name)
            .ok_or_else(|| MailError::UnknownMailer(name.clone()))?;

        let message = self.assemble(&mailable).await?;
        let mut receipt = transport.send(&message).await?;
        receipt.mailer = name;

        tracing::info!(
            mailable = M::NAME,
            mailer = %receipt.mailer,
            message_id = %receipt.message_id,
            recipients = message.recipients().count(),
            "mail sent"
        );
        Ok(receipt)
    }

    /// Push the mailable onto a queue for background delivery.
    pub async fn queue<M: Mailable>(
        &self,
        mailable: &M,
        queue: Option<&str>,
    ) -> Result<Uuid, MailError> {
        self.push(mailable, None, queue).await
    }

    /// As [`Mailer::queue`], eligible for processing only after `delay`.
    pub async fn later<M: Mailable>(
        &self,
        mailable: &M,
        delay: Duration,
        queue: Option<&str>,
    ) -> Result<Uuid, MailError> {
        self.push(mailable, Some(delay), queue).await
    }

    async fn push<M: Mailable>(
        &self,
        mailable: &M,
        delay: Option<Duration>,
        queue: Option<&str>,
    ) -> Result<Uuid, MailError> {
        tracing::debug!(mailable = M::NAME, "queuing mailable");
        let provider = self
            .inner
            .queue
            .as_ref()
            .ok_or_else(|| MailError::MissingConfig("no queue provider configured".into()))?;

        if !mailable.builder().callbacks().is_empty() {
            return Err(MailError::Configuration(
                "post-assembly callbacks cannot be queued; register them in build()".into(),
            ));
        }

        let queue = queue
            .or(mailable.builder().queue.as_deref())
            .unwrap_or(self.inner.default_queue.as_str())
            .to_string();

        let mut snapshot = mailable.clone();
        snapshot.compress();
        let job = SendQueuedMailable::<M>::new(snapshot);
        let payload = serde_json::to_value(&job).map_err(MailError::Payload)?;

        let opts = JobOpts {
            queue: queue.clone(),
            delay,
            ..SendQueuedMailable::<M>::default_opts()
        };
        let entry = JobEntry::new(M::JOB_TYPE, payload, &opts);
        provider.insert(&entry).await?;

        tracing::info!(
            mailable = M::NAME,
            job_id = %entry.id,
            %queue,
            delay_secs = delay.map(|d| d.as_secs()),
            "mail queued"
        );
        Ok(entry.id)
    }

    /// Declared data, then the hook's data, then the public fields.
    fn view_data<M: Mailable>(&self, mailable: &M) -> Result<ViewData, MailError> {
        let builder = mailable.builder();
        let mut data = builder.view_data.clone();
        if let Some(hook) = &self.inner.view_data_hook {
            data.extend(hook(builder));
        }
        data.extend(mailable.public_fields().map_err(MailError::ViewData)?);
        Ok(data)
    }

    async fn render_builder(
        &self,
        builder: &MessageBuilder,
        data: ViewData,
    ) -> Result<Rendered, MailError> {
        self.inner
            .coordinator
            .render(RenderRequest {
                locale: builder.locale.clone(),
                html: builder.html.clone(),
                text: builder.text.clone(),
                data,
            })
            .await
    }

    async fn assemble<M: Mailable>(&self, mailable: &M) -> Result<Message, MailError> {
        let data = self.view_data(mailable)?;
        let rendered = self.render_builder(mailable.builder(), data.clone()).await?;
        self.inner
            .assembler
            .assemble(mailable.builder(), M::TITLE, rendered, data)
            .await
    }
}

/// Clone the caller's mailable and run its `build` hook on the copy.
fn built<M: Mailable>(mailable: &M) -> Result<M, MailError> {
    let mut mailable = mailable.clone();
    mailable.build()?;
    Ok(mailable)
}

/// Set-once configuration for a [`Mailer`].
pub struct MailerBuilder {
    transports: HashMap<String, Arc<dyn Transport>>,
    default_mailer: Option<String>,
    renderer: Option<Arc<dyn Renderer>>,
    translator: Option<Arc<dyn Translator>>,
    disks: Disks,
    always_from: Option<Address>,
    queue: Option<Arc<dyn QueueProvider>>,
    default_queue: String,
    view_data_hook: Option<ViewDataHook>,
}

impl Default for MailerBuilder {
    fn default() -> Self {
        Self {
            transports: HashMap::new(),
            default_mailer: None,
            renderer: None,
            translator: None,
            disks: Disks::default(),
            always_from: None,
            queue: None,
            default_queue: DEFAULT_QUEUE.to_string(),
            view_data_hook: None,
        }
    }
}

impl MailerBuilder {
    /// Seed defaults from [`MailConfig`].
    pub fn from_config(config: &MailConfig) -> Self {
        Self {
            default_mailer: Some(config.default_mailer.clone()),
            disks: Disks::new(config.default_disk.clone()),
            always_from: config.always_from(),
            default_queue: config.default_queue.clone(),
            ..Self::default()
        }
    }

    /// Register a named transport. The first one registered becomes the
    /// default unless [`MailerBuilder::default_mailer`] says otherwise.
    pub fn transport(mut self, name: impl Into<String>, transport: impl Transport) -> Self {
        let name = name.into();
        if self.default_mailer.is_none() {
            self.default_mailer = Some(name.clone());
        }
        self.transports.insert(name, Arc::new(transport));
        self
    }

    pub fn default_mailer(mut self, name: impl Into<String>) -> Self {
        self.default_mailer = Some(name.into());
        self
    }

    pub fn renderer(mut self, renderer: impl Renderer) -> Self {
        self.renderer = Some(Arc::new(renderer));
        self
    }

    pub fn translator(mut self, translator: Arc<dyn Translator>) -> Self {
        self.translator = Some(translator);
        self
    }

    /// Replace the disk registry.
    pub fn disks(mut self, disks: Disks) -> Self {
        self.disks = disks;
        self
    }

    pub fn disk(mut self, name: impl Into<String>, storage: impl Storage) -> Self {
        self.disks = self.disks.disk(name, storage);
        self
    }

    pub fn always_from(mut self, address: impl Into<Address>) -> Self {
        self.always_from = Some(address.into());
        self
    }

    pub fn queue(mut self, queue: Arc<dyn QueueProvider>) -> Self {
        self.queue = Some(queue);
        self
    }

    pub fn default_queue(mut self, name: impl Into<String>) -> Self {
        self.default_queue = name.into();
        self
    }

    pub fn view_data<F>(mut self, hook: F) -> Self
    where
        F: Fn(&MessageBuilder) -> ViewData + Send + Sync + 'static,
    {
        self.view_data_hook = Some(Arc::new(hook));
        self
    }

    pub fn build(self) -> Mailer {
        let default_mailer = self
            .default_mailer
            .unwrap_or_else(|| MailConfig::default().default_mailer);

        Mailer {
            inner: Arc::new(Inner {
                transports: self.transports,
                default_mailer,
                coordinator: RenderCoordinator::new(self.renderer, self.translator),
                assembler: Assembler::new(self.disks).always_from(self.always_from),
                queue: self.queue,
                default_queue: self.default_queue,
                view_data_hook: self.view_data_hook,
            }),
        }
    }
}
