//! Composable mail delivery: builders, rendering, assembly, and queued dispatch.

extern crate self as courier;

pub mod config;
pub mod jobs;
pub mod mail;

pub use config::{EnvConfig, MailConfig};
pub use mail::{Mailable, MailableFields, MailError, Mailer, MessageBuilder};

#[doc(hidden)]
pub mod __private {
    pub use serde_json;
}
