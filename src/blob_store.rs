use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rand::Rng;
use tokio::fs;
use tracing::info;

/// Requested output dimensions for an uploaded image.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

pub const DISPLAY_PICTURE_SIZE: ImageSize = ImageSize {
    width: 1000,
    height: 1000,
};

/// Image hosting. Takes raw bytes and returns the public URL of the stored
/// object.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        size: Option<ImageSize>,
    ) -> Result<String>;
}

/// Stores blobs as flat files in one directory, served under `public_prefix`.
pub struct LocalBlobStore {
    dir: PathBuf,
    public_prefix: String,
}

impl LocalBlobStore {
    pub async fn new(dir: PathBuf, public_prefix: String) -> Result<Self> {
        fs::create_dir_all(&dir)
            .await
            .with_context(|| format!("Failed to create upload dir {}", dir.display()))?;
        info!("Upload directory: {}", dir.display());
        Ok(Self {
            dir,
            public_prefix: public_prefix.trim_end_matches('/').to_string(),
        })
    }

    /// Random object name that keeps a sanitized extension of the uploaded file.
    fn object_name(file_name: &str) -> String {
        let stem: u64 = rand::thread_rng().gen();
        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext)
            .filter(|ext| !ext.is_empty() && ext.len() <= 8)
            .filter(|ext| ext.chars().all(|c| c.is_ascii_alphanumeric()));
        match extension {
            Some(ext) => format!("{:016x}.{}", stem, ext.to_ascii_lowercase()),
            None => format!("{:016x}", stem),
        }
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn upload(
        &self,
        bytes: Vec<u8>,
        file_name: &str,
        size: Option<ImageSize>,
    ) -> Result<String> {
        if bytes.is_empty() {
            anyhow::bail!("Refusing to store an empty upload");
        }
        let name = Self::object_name(file_name);
        let path = self.dir.join(&name);
        fs::write(&path, &bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
        // Stored as uploaded; resizing is left to whatever serves the files.
        if let Some(ImageSize { width, height }) = size {
            tracing::debug!(%name, width, height, "requested image size");
        }
        Ok(format!("{}/{}", self.public_prefix, name))
    }
}
