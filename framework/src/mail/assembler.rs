//! Turns a built, rendered builder into a [`Message`].
//!
//! Steps run strictly in order and the first failure aborts the rest:
//! addresses, subject, callbacks, attachments (file, raw, storage), contents.
//! A message needs at least one to, cc or bcc recipient.

use std::path::PathBuf;

use super::address::Address;
use super::attachment::basename;
use super::builder::{MessageBuilder, ViewData, PRIORITY_RANGE};
use super::message::{Attachment, AttachmentBody, Message, Part};
use super::render::Rendered;
use super::storage::Disks;
use super::MailError;

#[derive(Clone, Default)]
pub struct Assembler {
    disks: Disks,
    always_from: Option<Address>,
}

impl Assembler {
    pub fn new(disks: Disks) -> Self {
        Self {
            disks,
            always_from: None,
        }
    }

    /// Sender applied to messages whose builder has no `from`.
    pub fn always_from(mut self, address: Option<Address>) -> Self {
        self.always_from = address;
        self
    }

    pub fn disks(&self) -> &Disks {
        &self.disks
    }

    /// `fallback_subject` is used when the builder's subject is unset or empty.
    pub async fn assemble(
        &self,
        builder: &MessageBuilder,
        fallback_subject: &str,
        rendered: Rendered,
        view_data: ViewData,
    ) -> Result<Message, MailError> {
        let mut message = Message {
            priority: builder
                .priority
                .clamp(*PRIORITY_RANGE.start(), *PRIORITY_RANGE.end()),
            tags: builder.tags.clone(),
            metadata: builder.metadata.clone(),
            ..Default::default()
        };

        self.apply_addresses(builder, &mut message)?;
        message.subject = subject(builder, fallback_subject);

        for callback in builder.callbacks() {
            callback(&mut message);
        }

        self.apply_attachments(builder, &mut message).await?;
        apply_contents(&mut message, rendered, view_data);

        tracing::debug!(
            subject = %message.subject,
            recipients = message.recipients().count(),
            attachments = message.attachments.len(),
            "assembled message"
        );
        Ok(message)
    }

    fn apply_addresses(
        &self,
        builder: &MessageBuilder,
        message: &mut Message,
    ) -> Result<(), MailError> {
        for (role, address) in builder.addresses.iter() {
            if address.address.trim().is_empty() {
                return Err(MailError::Configuration(format!("empty {role} address")));
            }
        }

        let addresses = &builder.addresses;
        if addresses.to.is_empty() && addresses.cc.is_empty() && addresses.bcc.is_empty() {
            return Err(MailError::Configuration("message has no recipients".into()));
        }

        message.from = addresses.from.clone().or_else(|| self.always_from.clone());
        message.reply_to = addresses.reply_to.clone();
        message.to = addresses.to.clone();
        message.cc = addresses.cc.clone();
        message.bcc = addresses.bcc.clone();
        Ok(())
    }

    async fn apply_attachments(
        &self,
        builder: &MessageBuilder,
        message: &mut Message,
    ) -> Result<(), MailError> {
        let set = &builder.attachments;

        for file in &set.files {
            message.attachments.push(Attachment {
                filename: file
                    .options
                    .name
                    .clone()
                    .unwrap_or_else(|| basename(&file.path)),
                content_type: file.options.mime.clone(),
                body: AttachmentBody::Path(PathBuf::from(&file.path)),
            });
        }

        for raw in &set.raw {
            message.attachments.push(Attachment {
                filename: raw.name.clone(),
                content_type: raw.options.mime.clone(),
                body: AttachmentBody::Bytes(raw.data.bytes()?.into_owned()),
            });
        }

        // An unnamed disk is the default disk, so `None` and the default's
        // name refer to the same file.
        let mut resolved: Vec<(&str, &str, &str)> = Vec::new();
        for stored in &set.storage {
            let (disk_name, disk) = self.disks.get(stored.disk.as_deref()).ok_or_else(|| {
                MailError::UnknownDisk(
                    stored
                        .disk
                        .clone()
                        .unwrap_or_else(|| self.disks.default_name().to_string()),
                )
            })?;
            let key = (disk_name, stored.path.as_str(), stored.name.as_str());
            if resolved.contains(&key) {
                continue;
            }
            resolved.push(key);
            let storage_error = |source| MailError::Storage {
                disk: disk_name.to_string(),
                path: stored.path.clone(),
                source,
            };

            let bytes = disk.read(&stored.path).await.map_err(storage_error)?;
            let content_type = match &stored.options.mime {
                Some(mime) => mime.clone(),
                None => disk.mime_type(&stored.path).await.map_err(storage_error)?,
            };

            message.attachments.push(Attachment {
                filename: stored.name.clone(),
                content_type: Some(content_type),
                body: AttachmentBody::Bytes(bytes),
            });
        }

        Ok(())
    }
}

fn subject(builder: &MessageBuilder, fallback: &str) -> String {
    match builder.subject.as_deref() {
        Some(subject) if !subject.is_empty() => subject.to_string(),
        _ => fallback.to_string(),
    }
}

fn apply_contents(message: &mut Message, rendered: Rendered, view_data: ViewData) {
    match (rendered.html, rendered.text) {
        (Some(html), text) => {
            message.body = Some(Part::html(html));
            if let Some(text) = text {
                message.alternatives.push(Part::plain(text));
            }
        }
        (None, Some(text)) => message.body = Some(Part::plain(text)),
        (None, None) => {}
    }
    message.view_data = view_data;
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use pretty_assertions::assert_eq;

    use super::*;
    use crate::mail::attachment::AttachmentOptions;
    use crate::mail::storage::MemoryDisk;

    fn addressed() -> MessageBuilder {
        let mut builder = MessageBuilder::new();
        builder.to("jane@example.com");
        builder
    }

    fn rendered(html: Option<&str>, text: Option<&str>) -> Rendered {
        Rendered {
            html: html.map(str::to_string),
            text: text.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn html_only_has_no_secondary_part() {
        let builder = addressed();

        let message = Assembler::default()
            .assemble(&builder, "Welcome", rendered(Some("<p>H</p>"), None), ViewData::new())
            .await
            .unwrap();

        assert_eq!(message.body, Some(Part::html("<p>H</p>")));
        assert!(message.alternatives.is_empty());
    }

    #[tokio::test]
    async fn html_and_text_become_primary_and_alternative() {
        let builder = addressed();
        let message = Assembler::default()
            .assemble(&builder, "Welcome", rendered(Some("H"), Some("T")), ViewData::new())
            .await
            .unwrap();

        assert_eq!(message.body, Some(Part::html("H")));
        assert_eq!(message.alternatives, vec![Part::plain("T")]);
    }

    #[tokio::test]
    async fn text_only_is_primary() {
        let builder = addressed();
        let message = Assembler::default()
            .assemble(&builder, "Welcome", rendered(None, Some("T")), ViewData::new())
            .await
            .unwrap();

        assert_eq!(message.body, Some(Part::plain("T")));
        assert!(message.alternatives.is_empty());
    }

    #[tokio::test]
    async fn subject_falls_back_to_the_given_title() {
        let mut builder = addressed();
        let assembler = Assembler::default();

        let message = assembler
            .assemble(&builder, "Order Shipped", Rendered::default(), ViewData::new())
            .await
            .unwrap();
        assert_eq!(message.subject, "Order Shipped");
        assert_eq!(message.body, None);

        builder.subject("");
        let message = assembler
            .assemble(&builder, "Order Shipped", Rendered::default(), ViewData::new())
            .await
            .unwrap();
        assert_eq!(message.subject, "Order Shipped");

        builder.subject("Your parcel");
        let message = assembler
            .assemble(&builder, "Order Shipped", Rendered::default(), ViewData::new())
            .await
            .unwrap();
        assert_eq!(message.subject, "Your parcel");
    }

    #[tokio::test]
    async fn priority_written_to_the_field_is_clamped() {
        let mut builder = addressed();
        builder.priority = 0;
        let message = Assembler::default()
            .assemble(&builder, "Welcome", Rendered::default(), ViewData::new())
            .await
            .unwrap();
        assert_eq!(message.priority, 1);

        builder.priority = 200;
        let message = Assembler::default()
            .assemble(&builder, "Welcome", Rendered::default(), ViewData::new())
            .await
            .unwrap();
        assert_eq!(message.priority, 5);
    }

    #[tokio::test]
    async fn empty_address_is_rejected() {
        let mut builder = MessageBuilder::new();
        builder.cc("  ");

        let err = Assembler::default()
            .assemble(&builder, "Welcome", Rendered::default(), ViewData::new())
            .await
            .unwrap_err();
        assert!(matches!(err, MailError::Configuration(_)));
    }

    #[tokio::test]
    async fn missing_recipients_are_rejected() {
        let mut builder = MessageBuilder::new();
        builder.from("team@example.com").reply_to("help@example.com");

        let err = Assembler::default()
            .assemble(&builder, "Welcome", rendered(None, Some("T")), ViewData::new())
            .await
            .unwrap_err();
        assert!(matches!(err, MailError::Configuration(ref msg) if msg.contains("no recipients")));

        builder.bcc("audit@example.com");
        let message = Assembler::default()
            .assemble(&builder, "Welcome", rendered(None, Some("T")), ViewData::new())
            .await
            .unwrap();
        assert_eq!(message.bcc, vec![Address::new("audit@example.com")]);
    }

    #[tokio::test]
    async fn always_from_applies_only_without_from() {
        let assembler =
            Assembler::default().always_from(Some(Address::with_name("noreply@example.com", "App")));

        let builder = addressed();
        let message = assembler
            .assemble(&builder, "Welcome", Rendered::default(), ViewData::new())
            .await
            .unwrap();
        assert_eq!(message.from, Some(Address::with_name("noreply@example.com", "App")));

        let mut builder = addressed();
        builder.from("team@example.com");
        let message = assembler
            .assemble(&builder, "Welcome", Rendered::default(), ViewData::new())
            .await
            .unwrap();
        assert_eq!(message.from, Some(Address::new("team@example.com")));
    }

    #[tokio::test]
    async fn callbacks_run_after_subject_and_before_attachments() {
        let seen = Arc::new(AtomicUsize::new(usize::MAX));
        let observed = seen.clone();

        let mut builder = addressed();
        builder
            .subject("Hello")
            .attach_data(b"x".to_vec(), "x.txt", AttachmentOptions::default())
            .with_email(move |message| {
                assert_eq!(message.subject, "Hello");
                observed.store(message.attachments.len(), Ordering::SeqCst);
                message.subject.push_str(" again");
            });

        let message = Assembler::default()
            .assemble(&builder, "Welcome", Rendered::default(), ViewData::new())
            .await
            .unwrap();

        assert_eq!(seen.load(Ordering::SeqCst), 0);
        assert_eq!(message.subject, "Hello again");
        assert_eq!(message.attachments.len(), 1);
    }

    #[tokio::test]
    async fn attachments_resolve_in_source_order() {
        let disk = MemoryDisk::new();
        disk.put("docs/terms.pdf", b"terms".to_vec(), "application/pdf").await;
        let assembler = Assembler::new(Disks::new("memory").disk("memory", disk));

        let mut builder = addressed();
        builder
            .attach_from_storage("docs/terms.pdf")
            .attach_data(b"raw".to_vec(), "raw.bin", AttachmentOptions::default())
            .attach("/var/files/report.csv", AttachmentOptions::default().mime("text/csv"));

        let message = assembler
            .assemble(&builder, "Welcome", Rendered::default(), ViewData::new())
            .await
            .unwrap();

        assert_eq!(
            message.attachments,
            vec![
                Attachment {
                    filename: "report.csv".into(),
                    content_type: Some("text/csv".into()),
                    body: AttachmentBody::Path("/var/files/report.csv".into()),
                },
                Attachment {
                    filename: "raw.bin".into(),
                    content_type: None,
                    body: AttachmentBody::Bytes(b"raw".to_vec()),
                },
                Attachment {
                    filename: "terms.pdf".into(),
                    content_type: Some("application/pdf".into()),
                    body: AttachmentBody::Bytes(b"terms".to_vec()),
                },
            ]
        );
    }

    #[tokio::test]
    async fn storage_failures_abort_assembly() {
        let assembler = Assembler::new(Disks::new("memory").disk("memory", MemoryDisk::new()));

        let mut builder = addressed();
        builder.attach_from_storage("missing.pdf");
        let err = assembler
            .assemble(&builder, "Welcome", Rendered::default(), ViewData::new())
            .await
            .unwrap_err();
        assert!(matches!(err, MailError::Storage { ref disk, .. } if disk == "memory"));

        let mut builder = addressed();
        builder.attach_from_storage_disk(Some("s3"), "a.pdf", None, AttachmentOptions::default());
        let err = assembler
            .assemble(&builder, "Welcome", Rendered::default(), ViewData::new())
            .await
            .unwrap_err();
        assert!(matches!(err, MailError::UnknownDisk(ref name) if name == "s3"));
    }

    #[tokio::test]
    async fn default_disk_storage_is_attached_once() {
        let disk = MemoryDisk::new();
        disk.put("a.pdf", b"a".to_vec(), "application/pdf").await;
        let assembler = Assembler::new(Disks::new("local").disk("local", disk));

        let mut builder = addressed();
        builder
            .attach_from_storage("a.pdf")
            .attach_from_storage_disk(Some("local"), "a.pdf", None, AttachmentOptions::default());

        let message = assembler
            .assemble(&builder, "Welcome", Rendered::default(), ViewData::new())
            .await
            .unwrap();
        assert_eq!(message.attachments.len(), 1);
        assert_eq!(message.attachments[0].filename, "a.pdf");
    }
}
