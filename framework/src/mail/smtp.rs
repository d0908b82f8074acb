//! SMTP transport using lettre.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use lettre::message::header::{ContentType, Header, HeaderName, HeaderValue};
use lettre::message::{Attachment as MimeAttachment, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Tokio1Executor};
use serde::Deserialize;
use uuid::Uuid;

use super::address::Address;
use super::message::{AttachmentBody, Message};
use super::transport::{DeliveryReceipt, Transport};
use super::{BoxError, MailError};
use crate::config::EnvConfig;

/// Configuration for the SMTP transport.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    /// SMTP server hostname.
    #[serde(rename = "smtp_host")]
    pub host: String,

    /// SMTP server port (default: 587).
    #[serde(rename = "smtp_port", default = "default_port")]
    pub port: u16,

    /// SMTP username for authentication.
    #[serde(rename = "smtp_username")]
    pub username: Option<String>,

    /// SMTP password for authentication.
    #[serde(rename = "smtp_password")]
    pub password: Option<String>,

    /// Sender used when a message has no `from`.
    #[serde(rename = "smtp_from")]
    pub from: String,

    /// TLS mode: "starttls" (default), "tls", or "none".
    #[serde(rename = "smtp_tls", default = "default_tls")]
    pub tls: String,

    /// Connection timeout in seconds (default: 10).
    #[serde(rename = "smtp_timeout", default = "default_timeout")]
    pub timeout: u64,
}

fn default_port() -> u16 {
    587
}

fn default_tls() -> String {
    "starttls".to_string()
}

fn default_timeout() -> u64 {
    10
}

/// `X-Priority` header carrying the builder's 1-5 priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct XPriority(u8);

impl Header for XPriority {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_str("X-Priority")
    }

    fn parse(s: &str) -> Result<Self, BoxError> {
        let level = s.split_whitespace().next().unwrap_or_default().parse::<u8>()?;
        Ok(Self(level))
    }

    fn display(&self) -> HeaderValue {
        let label = match self.0 {
            1 => "1 (Highest)",
            2 => "2 (High)",
            4 => "4 (Low)",
            5 => "5 (Lowest)",
            _ => "3 (Normal)",
        };
        HeaderValue::new(Self::name(), label.to_string())
    }
}

/// SMTP-based transport using lettre.
#[derive(Clone)]
pub struct SmtpTransport {
    transport: Arc<AsyncSmtpTransport<Tokio1Executor>>,
    from: Mailbox,
}

impl SmtpTransport {
    /// Create a transport from environment variables.
    ///
    /// Reads `SMTP_HOST`, `SMTP_PORT`, `SMTP_USERNAME`, `SMTP_PASSWORD`, `SMTP_FROM`,
    /// `SMTP_TLS` and `SMTP_TIMEOUT`.
    pub fn from_env() -> Result<Self, MailError> {
        dotenvy::dotenv().ok();

        let config = SmtpConfig::from_env().map_err(|e| MailError::MissingConfig(e.to_string()))?;

        Self::from_config(config)
    }

    /// Create a transport from explicit configuration.
    pub fn from_config(config: SmtpConfig) -> Result<Self, MailError> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|_| MailError::InvalidAddress(config.from.clone()))?;

        let mut builder = match config.tls.as_str() {
            "none" => AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host),
            "tls" => AsyncSmtpTransport::<Tokio1Executor>::relay(&config.host)
                .map_err(|e| MailError::Transport(e.to_string()))?,
            _ => AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| MailError::Transport(e.to_string()))?,
        };

        builder = builder
            .port(config.port)
            .timeout(Some(Duration::from_secs(config.timeout)));

        if let (Some(username), Some(password)) = (config.username, config.password) {
            builder = builder.credentials(Credentials::new(username, password));
        }

        let transport = builder.build();

        Ok(Self {
            transport: Arc::new(transport),
            from,
        })
    }

    /// Encode a [`Message`] as a lettre message.
    async fn build_message(
        &self,
        message: &Message,
        message_id: &str,
    ) -> Result<lettre::Message, MailError> {
        let from = match &message.from {
            Some(address) => mailbox(address)?,
            None => self.from.clone(),
        };
        let domain = from.email.domain().to_string();

        let mut builder = lettre::Message::builder()
            .from(from)
            .subject(&message.subject)
            .message_id(Some(format!("<{message_id}@{domain}>")))
            .header(XPriority(message.priority));

        if let Some(reply_to) = &message.reply_to {
            builder = builder.reply_to(mailbox(reply_to)?);
        }
        for to in &message.to {
            builder = builder.to(mailbox(to)?);
        }
        for cc in &message.cc {
            builder = builder.cc(mailbox(cc)?);
        }
        for bcc in &message.bcc {
            builder = builder.bcc(mailbox(bcc)?);
        }

        let body = body_part(message);

        let encoded = if message.attachments.is_empty() {
            match body {
                Body::Single(part) => builder.singlepart(part),
                Body::Multi(part) => builder.multipart(part),
            }
        } else {
            let mut mixed = match body {
                Body::Single(part) => MultiPart::mixed().singlepart(part),
                Body::Multi(part) => MultiPart::mixed().multipart(part),
            };
            for attachment in &message.attachments {
                let bytes = match &attachment.body {
                    AttachmentBody::Bytes(bytes) => bytes.clone(),
                    AttachmentBody::Path(path) => {
                        tokio::fs::read(path)
                            .await
                            .map_err(|source| MailError::Attachment {
                                path: path.display().to_string(),
                                source,
                            })?
                    }
                };
                let content_type = attachment
                    .content_type
                    .clone()
                    .or_else(|| guess_mime(&attachment.body))
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                let content_type = ContentType::parse(&content_type)
                    .map_err(|e| MailError::Build(format!("{content_type}: {e}")))?;
                mixed = mixed.singlepart(
                    MimeAttachment::new(attachment.filename.clone()).body(bytes, content_type),
                );
            }
            builder.multipart(mixed)
        };

        encoded.map_err(|e| MailError::Build(e.to_string()))
    }
}

enum Body {
    Single(SinglePart),
    Multi(MultiPart),
}

fn body_part(message: &Message) -> Body {
    match (message.html(), message.text()) {
        (Some(html), Some(text)) => Body::Multi(MultiPart::alternative_plain_html(
            text.to_string(),
            html.to_string(),
        )),
        (Some(html), None) => Body::Single(SinglePart::html(html.to_string())),
        (None, Some(text)) => Body::Single(SinglePart::plain(text.to_string())),
        (None, None) => Body::Single(SinglePart::plain(String::new())),
    }
}

fn mailbox(address: &Address) -> Result<Mailbox, MailError> {
    let email = address
        .address
        .parse()
        .map_err(|_| MailError::InvalidAddress(address.address.clone()))?;
    Ok(Mailbox::new(address.name.clone(), email))
}

fn guess_mime(body: &AttachmentBody) -> Option<String> {
    match body {
        AttachmentBody::Path(path) => mime_guess::from_path(Path::new(path))
            .first()
            .map(|m| m.to_string()),
        AttachmentBody::Bytes(_) => None,
    }
}

#[async_trait]
impl Transport for SmtpTransport {
    async fn send(&self, message: &Message) -> Result<DeliveryReceipt, MailError> {
        let message_id = Uuid::new_v4().to_string();
        let encoded = self.build_message(message, &message_id).await?;

        let response = self
            .transport
            .send(encoded)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;

        Ok(DeliveryReceipt {
            message_id,
            mailer: "smtp".to_string(),
            response: Some(response.message().collect::<Vec<_>>().join("\n")),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mail::message::{Attachment, Part};

    fn transport() -> SmtpTransport {
        SmtpTransport::from_config(SmtpConfig {
            host: "localhost".into(),
            port: 2525,
            username: None,
            password: None,
            from: "App <app@example.com>".into(),
            tls: "none".into(),
            timeout: 1,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn encodes_alternatives_and_attachments() {
        let message = Message {
            to: vec![Address::with_name("jane@example.com", "Jane")],
            subject: "Order Shipped".into(),
            priority: 1,
            body: Some(Part::html("<p>Shipped</p>")),
            alternatives: vec![Part::plain("Shipped")],
            attachments: vec![Attachment {
                filename: "label.txt".into(),
                content_type: Some("text/plain".into()),
                body: AttachmentBody::Bytes(b"label".to_vec()),
            }],
            ..Default::default()
        };

        let encoded = transport().build_message(&message, "abc").await.unwrap();
        let raw = String::from_utf8(encoded.formatted()).unwrap();

        assert!(raw.contains("From: App <app@example.com>"));
        assert!(raw.contains("To: Jane <jane@example.com>"));
        assert!(raw.contains("Subject: Order Shipped"));
        assert!(raw.contains("X-Priority: 1 (Highest)"));
        assert!(raw.contains("Message-ID: <abc@example.com>"));
        assert!(raw.contains("multipart/alternative"));
        assert!(raw.contains("filename=\"label.txt\""));
    }

    #[tokio::test]
    async fn rejects_invalid_addresses() {
        let message = Message {
            to: vec![Address::new("not an address")],
            subject: "Hi".into(),
            priority: 3,
            ..Default::default()
        };

        let err = transport().build_message(&message, "abc").await.unwrap_err();
        assert!(matches!(err, MailError::InvalidAddress(a) if a == "not an address"));
    }

    #[tokio::test]
    async fn missing_file_attachment_is_an_io_error() {
        let message = Message {
            to: vec![Address::new("jane@example.com")],
            subject: "Hi".into(),
            priority: 3,
            body: Some(Part::plain("Hi")),
            attachments: vec![Attachment {
                filename: "gone.pdf".into(),
                content_type: None,
                body: AttachmentBody::Path("/definitely/not/here.pdf".into()),
            }],
            ..Default::default()
        };

        let err = transport().build_message(&message, "abc").await.unwrap_err();
        assert!(matches!(err, MailError::Attachment { .. }));
    }
}
