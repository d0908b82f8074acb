//! Sends one message immediately and queues another for a background worker.
//!
//! Uses SMTP when `SMTP_HOST` is set, otherwise an in-memory transport.
//!
//! ```sh
//! RUST_LOG=courier=debug cargo run --example basic
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use courier::jobs::{JobRegistry, MemoryQueue, Worker};
use courier::mail::{
    AttachmentOptions, MailError, Mailable, MailableFields, MailerBuilder, MemoryDisk,
    MemoryTransport, MessageBuilder, SendQueuedMailable, SmtpTransport, TeraRenderer,
};
use courier::MailConfig;
use serde::{Deserialize, Serialize};
use tracing_subscriber::EnvFilter;

#[derive(Clone, Serialize, Deserialize, MailableFields)]
pub struct Welcome {
    pub name: String,
    #[mail(skip)]
    pub email: String,
    mail: MessageBuilder,
}

impl Welcome {
    pub fn new(name: &str, email: &str) -> Self {
        Self {
            name: name.to_string(),
            email: email.to_string(),
            mail: MessageBuilder::new(),
        }
    }
}

impl Mailable for Welcome {
    fn build(&mut self) -> Result<(), MailError> {
        self.mail
            .to((self.email.as_str(), self.name.as_str()))
            .html_view("welcome.html")
            .text_view("welcome.txt")
            .attach_from_storage("guides/getting-started.md");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = MailConfig::load().context("failed to load MAIL_* config")?;

    let renderer = TeraRenderer::from_raw([
        ("welcome.html", "<h1>Welcome, {{ name }}!</h1><p>{{ product }}</p>"),
        ("welcome.txt", "Welcome, {{ name }}! {{ product }}"),
    ])?;

    let guides = MemoryDisk::new();
    guides
        .put("guides/getting-started.md", "# Getting started\n", "text/markdown")
        .await;

    let queue = Arc::new(MemoryQueue::new());
    let memory = MemoryTransport::new();

    let mut builder: MailerBuilder = MailerBuilder::from_config(&config)
        .renderer(renderer)
        .disk(config.default_disk.clone(), guides)
        .queue(queue.clone())
        .view_data(|_| {
            let mut data = courier::mail::ViewData::new();
            data.insert("product".into(), "Courier".into());
            data
        });

    builder = if std::env::var("SMTP_HOST").is_ok() {
        builder.transport("smtp", SmtpTransport::from_env()?)
    } else {
        builder
            .transport("memory", memory.clone())
            .default_mailer("memory")
    };
    let mailer = builder.build();

    let welcome = Welcome::new("Jane", "jane@example.com");
    println!("{}", mailer.render(&welcome).await?);

    let receipt = mailer.send(&welcome).await?;
    println!("sent {} via {}", receipt.message_id, receipt.mailer);

    let mut reminder = Welcome::new("Joe", "joe@example.com");
    reminder
        .mail
        .subject("Don't forget to finish signing up")
        .attach_data(b"signup-token".to_vec(), "token.txt", AttachmentOptions::default());
    let job_id = mailer.queue(&reminder, None).await?;
    println!("queued {job_id} on {}", mailer.default_queue());

    let registry = JobRegistry::new().register::<SendQueuedMailable<Welcome>>();
    Worker::new(queue.clone(), registry, mailer.clone())
        .queue(mailer.default_queue())
        .poll_interval(Duration::from_millis(100))
        .start();

    tokio::time::sleep(Duration::from_secs(1)).await;

    for message in memory.sent().await {
        println!("delivered {:?} to {:?}", message.subject, message.to);
    }

    Ok(())
}
