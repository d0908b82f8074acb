//! Mail composition and delivery.
//!
//! A [`Mailable`] type embeds a [`MessageBuilder`] and configures it in
//! [`Mailable::build`]. The [`Mailer`] runs every terminal verb on a clone of
//! the caller's value: build, view data, render, assemble, then either hand
//! the [`Message`] to a [`Transport`] or push a [`SendQueuedMailable`] job
//! onto a queue.
//!
//! # Quick Start
//!
//! ```ignore
//! #[derive(Clone, Serialize, Deserialize, MailableFields)]
//! pub struct Welcome {
//!     pub name: String,
//!     mail: MessageBuilder,
//! }
//!
//! impl Mailable for Welcome {
//!     fn build(&mut self) -> Result<(), MailError> {
//!         self.mail.html_view("welcome.html").text_body("Welcome aboard");
//!         Ok(())
//!     }
//! }
//!
//! let mailer = Mailer::builder()
//!     .transport("smtp", SmtpTransport::from_env()?)
//!     .renderer(TeraRenderer::from_glob("templates/**/*")?)
//!     .build();
//!
//! let mut welcome = Welcome::new("Jane");
//! welcome.mail.to(("jane@example.com", "Jane"));
//! mailer.send(&welcome).await?;
//! mailer.queue(&welcome, Some("emails")).await?;
//! ```
//!
//! # Environment Variables
//!
//! [`SmtpTransport::from_env`] reads:
//!
//! | Variable | Required | Description |
//! |----------|----------|-------------|
//! | `SMTP_HOST` | Yes | SMTP server hostname |
//! | `SMTP_PORT` | No | Port (default: 587) |
//! | `SMTP_USERNAME` | No | Username for authentication |
//! | `SMTP_PASSWORD` | No | Password for authentication |
//! | `SMTP_FROM` | Yes | Sender used when a message has none |
//! | `SMTP_TLS` | No | `starttls` (default), `tls`, or `none` |
//! | `SMTP_TIMEOUT` | No | Seconds (default: 10) |
//!
//! [`MailConfig`](crate::config::MailConfig) covers the `MAIL_*` defaults.

mod address;
mod assembler;
mod attachment;
mod builder;
mod job;
mod mailable;
mod mailer;
mod message;
mod render;
mod smtp;
mod storage;
mod templates;
mod transport;

pub use address::{Address, AddressBook, Addressable, IntoRecipients, Role};
pub use assembler::Assembler;
pub use attachment::{
    AttachmentData, AttachmentOptions, AttachmentSet, Compressible, Decompressible,
    FileAttachment, RawAttachment, StorageAttachment,
};
pub use builder::{Callback, Content, MessageBuilder, ViewData, DEFAULT_PRIORITY, PRIORITY_RANGE};
pub use job::{HasMailer, SendQueuedMailable};
pub use courier_macros::MailableFields;
pub use mailable::{Mailable, MailableFields};
pub use mailer::{Mailer, MailerBuilder, ViewDataHook};
pub use message::{Attachment, AttachmentBody, Message, Part, PartKind};
pub use render::{RenderCoordinator, RenderRequest, Rendered, Renderer, Translator};
pub use smtp::{SmtpConfig, SmtpTransport};
pub use storage::{Disks, LocalDisk, MemoryDisk, Storage};
pub use templates::TeraRenderer;
pub use transport::{DeliveryReceipt, MemoryTransport, Transport};

use thiserror::Error;

use crate::jobs::JobError;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("missing required config: {0}")]
    MissingConfig(String),

    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    #[error("invalid message configuration: {0}")]
    Configuration(String),

    #[error("no mailer named `{0}`")]
    UnknownMailer(String),

    #[error("no storage disk named `{0}`")]
    UnknownDisk(String),

    #[error(transparent)]
    Render(BoxError),

    #[error("failed to collect view data: {0}")]
    ViewData(#[source] serde_json::Error),

    #[error("failed to read `{path}` from disk `{disk}`: {source}")]
    Storage {
        disk: String,
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read attachment `{path}`: {source}")]
    Attachment {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build message: {0}")]
    Build(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("queue error: {0}")]
    Queue(#[from] JobError),

    #[error("invalid queued payload: {0}")]
    Payload(#[source] serde_json::Error),
}
