//! Attachment references collected on a builder.
//!
//! Three sources are supported: a local file path, in-memory bytes and a
//! path on a named storage disk. Each source is de-duplicated by its own key
//! and the first registration of a key wins. Nothing is read at attach time;
//! storage references are resolved by the assembler.

use std::borrow::Cow;
use std::path::Path;

use base64::prelude::*;
use serde::{Deserialize, Serialize};

use super::MailError;

/// Per-attachment overrides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentOptions {
    /// File name presented to the recipient.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Content type; guessed or looked up when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime: Option<String>,
}

impl AttachmentOptions {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn mime(mut self, mime: impl Into<String>) -> Self {
        self.mime = Some(mime.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileAttachment {
    pub path: String,
    #[serde(default)]
    pub options: AttachmentOptions,
}

/// Attachment bytes, either as-is or in their compact queue encoding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "encoding", content = "data", rename_all = "snake_case")]
pub enum AttachmentData {
    Raw(Vec<u8>),
    Base64(String),
}

impl AttachmentData {
    pub fn bytes(&self) -> Result<Cow<'_, [u8]>, MailError> {
        match self {
            Self::Raw(bytes) => Ok(Cow::Borrowed(bytes)),
            Self::Base64(encoded) => BASE64_STANDARD
                .decode(encoded)
                .map(Cow::Owned)
                .map_err(|e| MailError::Configuration(format!("corrupt attachment data: {e}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAttachment {
    pub data: AttachmentData,
    pub name: String,
    #[serde(default)]
    pub options: AttachmentOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageAttachment {
    /// Disk name; `None` resolves to the configured default disk.
    #[serde(default)]
    pub disk: Option<String>,
    pub path: String,
    pub name: String,
    #[serde(default)]
    pub options: AttachmentOptions,
}

/// Replace a value with its compact form before it crosses the queue.
pub trait Compressible {
    fn compress(&mut self);
}

/// Restore a value compressed by [`Compressible::compress`].
pub trait Decompressible {
    fn decompress(&mut self) -> Result<(), MailError>;
}

impl Compressible for AttachmentData {
    fn compress(&mut self) {
        if let Self::Raw(bytes) = self {
            *self = Self::Base64(BASE64_STANDARD.encode(bytes));
        }
    }
}

impl Decompressible for AttachmentData {
    fn decompress(&mut self) -> Result<(), MailError> {
        if let Self::Base64(_) = self {
            let bytes = self.bytes()?.into_owned();
            *self = Self::Raw(bytes);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttachmentSet {
    #[serde(default)]
    pub files: Vec<FileAttachment>,
    #[serde(default)]
    pub raw: Vec<RawAttachment>,
    #[serde(default)]
    pub storage: Vec<StorageAttachment>,
}

impl AttachmentSet {
    pub fn attach_file(&mut self, path: impl Into<String>, options: AttachmentOptions) {
        let path = path.into();
        if self.has_file(&path) {
            return;
        }
        self.files.push(FileAttachment { path, options });
    }

    pub fn attach_raw(
        &mut self,
        data: impl Into<Vec<u8>>,
        name: impl Into<String>,
        options: AttachmentOptions,
    ) {
        let data = data.into();
        let name = name.into();
        if self.has_raw(&data, &name) {
            return;
        }
        self.raw.push(RawAttachment {
            data: AttachmentData::Raw(data),
            name,
            options,
        });
    }

    /// Reference a file on a storage disk. The display name defaults to the
    /// path's file name.
    pub fn attach_from_storage(
        &mut self,
        disk: Option<&str>,
        path: impl Into<String>,
        name: Option<&str>,
        options: AttachmentOptions,
    ) {
        let path = path.into();
        let name = name.map_or_else(|| basename(&path), str::to_string);
        if self.has_storage(disk, &path, Some(&name)) {
            return;
        }
        self.storage.push(StorageAttachment {
            disk: disk.map(str::to_string),
            path,
            name,
            options,
        });
    }

    pub fn has_file(&self, path: &str) -> bool {
        self.files.iter().any(|f| f.path == path)
    }

    pub fn has_raw(&self, data: &[u8], name: &str) -> bool {
        self.raw
            .iter()
            .any(|r| r.name == name && r.data.bytes().is_ok_and(|b| b.as_ref() == data))
    }

    pub fn has_storage(&self, disk: Option<&str>, path: &str, name: Option<&str>) -> bool {
        let name = name.map_or_else(|| basename(path), str::to_string);
        self.storage
            .iter()
            .any(|s| s.disk.as_deref() == disk && s.path == path && s.name == name)
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.raw.is_empty() && self.storage.is_empty()
    }
}

impl Compressible for AttachmentSet {
    fn compress(&mut self) {
        for raw in &mut self.raw {
            raw.data.compress();
        }
    }
}

impl Decompressible for AttachmentSet {
    fn decompress(&mut self) -> Result<(), MailError> {
        for raw in &mut self.raw {
            raw.data.decompress()?;
        }
        Ok(())
    }
}

pub(crate) fn basename(path: &str) -> String {
    Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.to_string())
}
