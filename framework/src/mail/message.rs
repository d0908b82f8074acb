//! The assembled, transport-ready message.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::address::Address;
use super::builder::ViewData;

/// Content type of a body part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PartKind {
    Html,
    Plain,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
    pub kind: PartKind,
    pub content: String,
}

impl Part {
    pub fn html(content: impl Into<String>) -> Self {
        Self {
            kind: PartKind::Html,
            content: content.into(),
        }
    }

    pub fn plain(content: impl Into<String>) -> Self {
        Self {
            kind: PartKind::Plain,
            content: content.into(),
        }
    }
}

/// Where an attachment's bytes live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttachmentBody {
    /// A local file, read by the transport when the message is encoded.
    Path(PathBuf),
    /// Bytes supplied in memory or already fetched from a storage disk.
    Bytes(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub filename: String,
    pub content_type: Option<String>,
    pub body: AttachmentBody,
}

/// A complete email message ready to send.
///
/// Built once per delivery attempt by the assembler. Post-assembly hooks
/// receive it mutably; transports only ever see a shared reference.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub from: Option<Address>,
    pub reply_to: Option<Address>,
    pub to: Vec<Address>,
    #[serde(default)]
    pub cc: Vec<Address>,
    #[serde(default)]
    pub bcc: Vec<Address>,
    pub subject: String,
    pub priority: u8,
    /// Primary body. `None` when neither html nor text resolved.
    pub body: Option<Part>,
    /// Secondary parts, e.g. the plain-text alternative of an html body.
    #[serde(default)]
    pub alternatives: Vec<Part>,
    #[serde(default)]
    pub attachments: Vec<Attachment>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// The data the templates were rendered with.
    #[serde(default)]
    pub view_data: ViewData,
}

impl Message {
    pub fn html(&self) -> Option<&str> {
        self.part(PartKind::Html)
    }

    pub fn text(&self) -> Option<&str> {
        self.part(PartKind::Plain)
    }

    fn part(&self, kind: PartKind) -> Option<&str> {
        self.body
            .iter()
            .chain(&self.alternatives)
            .find(|p| p.kind == kind)
            .map(|p| p.content.as_str())
    }

    /// Every envelope recipient across to, cc and bcc.
    pub fn recipients(&self) -> impl Iterator<Item = &Address> {
        self.to.iter().chain(&self.cc).chain(&self.bcc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_parts_by_kind() {
        let message = Message {
            body: Some(Part::html("<p>Hi</p>")),
            alternatives: vec![Part::plain("Hi")],
            ..Default::default()
        };

        assert_eq!(message.html(), Some("<p>Hi</p>"));
        assert_eq!(message.text(), Some("Hi"));
    }

    #[test]
    fn recipients_span_all_roles() {
        let message = Message {
            to: vec![Address::new("a@example.com")],
            cc: vec![Address::new("b@example.com")],
            bcc: vec![Address::new("c@example.com")],
            ..Default::default()
        };

        let all: Vec<_> = message.recipients().map(|a| a.address.as_str()).collect();
        assert_eq!(all, vec!["a@example.com", "b@example.com", "c@example.com"]);
    }
}
