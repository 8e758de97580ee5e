//! Filesystem attachment backend: one file per blob, named by its hash.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use idledger_core::{AttachmentHash, SecureHash};

use crate::error::StorageError;
use crate::record::AttachmentStored;
use crate::traits::AttachmentStore;

/// Stores each blob at `<root>/<hex hash>`.
///
/// Writes go to a temporary file that is renamed into place, so a reader
/// never sees a partially written blob.
#[derive(Debug, Clone)]
pub struct FsAttachmentStore {
    root: PathBuf,
}

impl FsAttachmentStore {
    /// Open (creating if needed) the attachment directory.
    pub async fn open(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        tokio::fs::create_dir_all(&root).await?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, hash: &AttachmentHash) -> PathBuf {
        self.root.join(hash.to_hex())
    }
}

#[async_trait]
impl AttachmentStore for FsAttachmentStore {
    async fn store(&self, bytes: Vec<u8>) -> Result<AttachmentStored, StorageError> {
        let hash = SecureHash::sha256(&bytes);
        let path = self.blob_path(&hash);
        if tokio::fs::try_exists(&path).await? {
            tracing::info!(hash = %hash, "attachment already exists");
            return Ok(AttachmentStored::Existing(hash));
        }
        let tmp = self.root.join(format!(".{}.tmp", hash.to_hex()));
        tokio::fs::write(&tmp, &bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        tracing::info!(hash = %hash, size = bytes.len(), "attachment stored");
        Ok(AttachmentStored::New(hash))
    }

    async fn fetch(&self, hash: &AttachmentHash) -> Result<Vec<u8>, StorageError> {
        let bytes = match tokio::fs::read(self.blob_path(hash)).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::AttachmentNotFound { hash: *hash })
            }
            Err(e) => return Err(e.into()),
        };
        if SecureHash::sha256(&bytes) != *hash {
            return Err(StorageError::AttachmentCorrupt { hash: *hash });
        }
        Ok(bytes)
    }

    async fn contains(&self, hash: &AttachmentHash) -> Result<bool, StorageError> {
        Ok(tokio::fs::try_exists(self.blob_path(hash)).await?)
    }
}
