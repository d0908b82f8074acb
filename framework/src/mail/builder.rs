//! The mutable accumulation surface shared by every mailable.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::address::{Address, AddressBook, IntoRecipients, Role};
use super::attachment::{AttachmentOptions, AttachmentSet, Compressible, Decompressible};
use super::message::Message;
use super::MailError;

/// Ordered template data. Later inserts override earlier keys.
pub type ViewData = serde_json::Map<String, Value>;

/// Hook run against the assembled message before attachments and body.
pub type Callback = Arc<dyn Fn(&mut Message) + Send + Sync>;

/// Priority of a builder that never set one.
pub const DEFAULT_PRIORITY: u8 = 3;

/// Valid priorities, 1 (highest) to 5 (lowest).
pub const PRIORITY_RANGE: std::ops::RangeInclusive<u8> = 1..=5;

/// Where a body channel (html or text) comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Content {
    /// Template name handed to the renderer.
    View(String),
    /// Literal markup used verbatim.
    Literal(String),
}

/// Builder state for one email.
///
/// Setters take `&mut self` and return it, so they chain both on a local
/// builder and inside [`Mailable::build`](super::Mailable::build):
///
/// ```ignore
/// let mut mail = MessageBuilder::new();
/// mail.to(("jane@example.com", "Jane"))
///     .subject("Your order shipped")
///     .html_view("orders.shipped")
///     .with("tracking", "1Z999");
/// ```
///
/// A builder is never mutated by delivery; every terminal verb works on a
/// clone.
///
/// Priority is kept within [`PRIORITY_RANGE`]: [`MessageBuilder::priority`]
/// clamps 0 to 1 and anything above 5 to 5 rather than rejecting it, and
/// assembly clamps a value written straight to the field the same way.
#[derive(Clone, Serialize, Deserialize)]
pub struct MessageBuilder {
    #[serde(default)]
    pub locale: Option<String>,
    /// 1 (highest) to 5 (lowest), see [`PRIORITY_RANGE`].
    #[serde(default = "default_priority")]
    pub priority: u8,
    #[serde(default)]
    pub addresses: AddressBook,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub html: Option<Content>,
    #[serde(default)]
    pub text: Option<Content>,
    #[serde(default)]
    pub view_data: ViewData,
    #[serde(default)]
    pub attachments: AttachmentSet,
    /// Named transport to deliver through.
    #[serde(default)]
    pub mailer: Option<String>,
    /// Queue used by `queue`/`later` when none is given explicitly.
    #[serde(default)]
    pub queue: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(skip)]
    callbacks: Vec<Callback>,
}

fn default_priority() -> u8 {
    DEFAULT_PRIORITY
}

impl Default for MessageBuilder {
    fn default() -> Self {
        Self {
            locale: None,
            priority: DEFAULT_PRIORITY,
            addresses: AddressBook::default(),
            subject: None,
            html: None,
            text: None,
            view_data: ViewData::new(),
            attachments: AttachmentSet::default(),
            mailer: None,
            queue: None,
            tags: Vec::new(),
            metadata: BTreeMap::new(),
            callbacks: Vec::new(),
        }
    }
}

impl fmt::Debug for MessageBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageBuilder")
            .field("locale", &self.locale)
            .field("priority", &self.priority)
            .field("addresses", &self.addresses)
            .field("subject", &self.subject)
            .field("html", &self.html)
            .field("text", &self.text)
            .field("view_data", &self.view_data)
            .field("attachments", &self.attachments)
            .field("mailer", &self.mailer)
            .field("queue", &self.queue)
            .field("tags", &self.tags)
            .field("metadata", &self.metadata)
            .field("callbacks", &self.callbacks.len())
            .finish()
    }
}

impl MessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn locale(&mut self, locale: impl Into<String>) -> &mut Self {
        self.locale = Some(locale.into());
        self
    }

    /// 1 is highest, 5 is lowest. Out-of-range values are clamped to the
    /// nearest bound, never rejected.
    pub fn priority(&mut self, level: u8) -> &mut Self {
        self.priority = level.clamp(*PRIORITY_RANGE.start(), *PRIORITY_RANGE.end());
        self
    }

    pub fn from(&mut self, address: impl Into<Address>) -> &mut Self {
        self.addresses.set_single(Role::From, address.into());
        self
    }

    pub fn reply_to(&mut self, address: impl Into<Address>) -> &mut Self {
        self.addresses.set_single(Role::ReplyTo, address.into());
        self
    }

    pub fn to(&mut self, recipients: impl IntoRecipients) -> &mut Self {
        self.addresses.add(Role::To, recipients);
        self
    }

    pub fn cc(&mut self, recipients: impl IntoRecipients) -> &mut Self {
        self.addresses.add(Role::Cc, recipients);
        self
    }

    pub fn bcc(&mut self, recipients: impl IntoRecipients) -> &mut Self {
        self.addresses.add(Role::Bcc, recipients);
        self
    }

    pub fn subject(&mut self, subject: impl Into<String>) -> &mut Self {
        self.subject = Some(subject.into());
        self
    }

    pub fn mailer(&mut self, name: impl Into<String>) -> &mut Self {
        self.mailer = Some(name.into());
        self
    }

    pub fn on_queue(&mut self, name: impl Into<String>) -> &mut Self {
        self.queue = Some(name.into());
        self
    }

    pub fn html_view(&mut self, template: impl Into<String>) -> &mut Self {
        self.html = Some(Content::View(template.into()));
        self
    }

    pub fn text_view(&mut self, template: impl Into<String>) -> &mut Self {
        self.text = Some(Content::View(template.into()));
        self
    }

    pub fn html_body(&mut self, html: impl Into<String>) -> &mut Self {
        self.html = Some(Content::Literal(html.into()));
        self
    }

    pub fn text_body(&mut self, text: impl Into<String>) -> &mut Self {
        self.text = Some(Content::Literal(text.into()));
        self
    }

    pub fn with(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.view_data.insert(key.into(), value.into());
        self
    }

    pub fn with_data(&mut self, data: ViewData) -> &mut Self {
        self.view_data.extend(data);
        self
    }

    pub fn attach(&mut self, path: impl Into<String>, options: AttachmentOptions) -> &mut Self {
        self.attachments.attach_file(path, options);
        self
    }

    pub fn attach_data(
        &mut self,
        data: impl Into<Vec<u8>>,
        name: impl Into<String>,
        options: AttachmentOptions,
    ) -> &mut Self {
        self.attachments.attach_raw(data, name, options);
        self
    }

    /// Attach a file from the default storage disk.
    pub fn attach_from_storage(&mut self, path: impl Into<String>) -> &mut Self {
        self.attachments
            .attach_from_storage(None, path, None, AttachmentOptions::default());
        self
    }

    pub fn attach_from_storage_disk(
        &mut self,
        disk: Option<&str>,
        path: impl Into<String>,
        name: Option<&str>,
        options: AttachmentOptions,
    ) -> &mut Self {
        self.attachments.attach_from_storage(disk, path, name, options);
        self
    }

    pub fn tag(&mut self, tag: impl Into<String>) -> &mut Self {
        let tag = tag.into();
        if !self.tags.contains(&tag) {
            self.tags.push(tag);
        }
        self
    }

    pub fn metadata(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    /// Register a hook that customizes the assembled message.
    ///
    /// Hooks cannot be serialized. Register them inside `build()` when the
    /// mailable is queued, because `build()` runs again in the job.
    pub fn with_email<F>(&mut self, callback: F) -> &mut Self
    where
        F: Fn(&mut Message) + Send + Sync + 'static,
    {
        self.callbacks.push(Arc::new(callback));
        self
    }

    pub fn callbacks(&self) -> &[Callback] {
        &self.callbacks
    }

    pub fn has_from(&self, address: &str, name: Option<&str>) -> bool {
        self.addresses.has(Role::From, address, name)
    }

    pub fn has_reply_to(&self, address: &str, name: Option<&str>) -> bool {
        self.addresses.has(Role::ReplyTo, address, name)
    }

    pub fn has_to(&self, address: &str, name: Option<&str>) -> bool {
        self.addresses.has(Role::To, address, name)
    }

    pub fn has_cc(&self, address: &str, name: Option<&str>) -> bool {
        self.addresses.has(Role::Cc, address, name)
    }

    pub fn has_bcc(&self, address: &str, name: Option<&str>) -> bool {
        self.addresses.has(Role::Bcc, address, name)
    }

    pub fn has_subject(&self, subject: &str) -> bool {
        self.subject.as_deref() == Some(subject)
    }

    pub fn has_attachment(&self, path: &str) -> bool {
        self.attachments.has_file(path)
    }

    pub fn has_attachment_data(&self, data: &[u8], name: &str) -> bool {
        self.attachments.has_raw(data, name)
    }

    pub fn has_attachment_from_storage(&self, path: &str) -> bool {
        self.attachments.has_storage(None, path, None)
    }

    pub fn has_attachment_from_storage_disk(
        &self,
        disk: Option<&str>,
        path: &str,
        name: Option<&str>,
    ) -> bool {
        self.attachments.has_storage(disk, path, name)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    pub fn has_metadata(&self, key: &str, value: &str) -> bool {
        self.metadata.get(key).is_some_and(|v| v == value)
    }

    pub fn has_locale(&self, locale: &str) -> bool {
        self.locale.as_deref() == Some(locale)
    }
}

impl Compressible for MessageBuilder {
    fn compress(&mut self) {
        self.attachments.compress();
    }
}

impl Decompressible for MessageBuilder {
    fn decompress(&mut self) -> Result<(), MailError> {
        self.attachments.decompress()
    }
}
