//! Named storage disks that attachments can be fetched from.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

/// Storage collaborator. Paths are relative to the disk's root.
#[async_trait]
pub trait Storage: Send + Sync + 'static {
    async fn read(&self, path: &str) -> io::Result<Vec<u8>>;

    async fn mime_type(&self, path: &str) -> io::Result<String>;
}

/// Disk registry keyed by name, with a default.
#[derive(Clone)]
pub struct Disks {
    default: String,
    disks: HashMap<String, Arc<dyn Storage>>,
}

impl Disks {
    pub fn new(default: impl Into<String>) -> Self {
        Self {
            default: default.into(),
            disks: HashMap::new(),
        }
    }

    pub fn disk(mut self, name: impl Into<String>, storage: impl Storage) -> Self {
        self.disks.insert(name.into(), Arc::new(storage));
        self
    }

    pub fn default_name(&self) -> &str {
        &self.default
    }

    /// Look up a disk, falling back to the default name.
    pub fn get(&self, name: Option<&str>) -> Option<(&str, &Arc<dyn Storage>)> {
        let name = name.unwrap_or(&self.default);
        self.disks.get_key_value(name).map(|(k, v)| (k.as_str(), v))
    }
}

impl Default for Disks {
    fn default() -> Self {
        Self::new("local")
    }
}

/// File system disk rooted at a directory.
#[derive(Clone)]
pub struct LocalDisk {
    root: PathBuf,
}

impl LocalDisk {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl Storage for LocalDisk {
    async fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        tokio::fs::read(self.root.join(path)).await
    }

    async fn mime_type(&self, path: &str) -> io::Result<String> {
        let metadata = tokio::fs::metadata(self.root.join(path)).await?;
        if !metadata.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{path} is not a file"),
            ));
        }
        Ok(mime_guess::from_path(path).first_or_octet_stream().to_string())
    }
}

/// In-memory disk for development and testing.
#[derive(Clone, Default)]
pub struct MemoryDisk {
    files: Arc<RwLock<HashMap<String, (Vec<u8>, String)>>>,
}

impl MemoryDisk {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, path: impl Into<String>, bytes: impl Into<Vec<u8>>, mime: &str) {
        self.files
            .write()
            .await
            .insert(path.into(), (bytes.into(), mime.to_string()));
    }
}

fn not_found(path: &str) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("{path} does not exist"))
}

#[async_trait]
impl Storage for MemoryDisk {
    async fn read(&self, path: &str) -> io::Result<Vec<u8>> {
        let files = self.files.read().await;
        files
            .get(path)
            .map(|(bytes, _)| bytes.clone())
            .ok_or_else(|| not_found(path))
    }

    async fn mime_type(&self, path: &str) -> io::Result<String> {
        let files = self.files.read().await;
        files
            .get(path)
            .map(|(_, mime)| mime.clone())
            .ok_or_else(|| not_found(path))
    }
}
