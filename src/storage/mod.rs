//! Shared audio object store
//!
//! The pipeline issues a write-once upload target per session, the client
//! uploads the recorded artifact to it, and the transcription step reads it
//! back by key. Only the contract lives here; the reference implementation
//! keeps objects on the local filesystem.

use async_trait::async_trait;
use std::path::PathBuf;
use thiserror::Error;
use tokio::fs;
use tracing::info;

/// Content type every upload target is created for.
pub const AUDIO_CONTENT_TYPE: &str = "audio/wav";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("uploads destination is not configured")]
    Unconfigured,

    #[error("object {0} already uploaded")]
    AlreadyUploaded(String),

    #[error("object {0} not found")]
    NotFound(String),

    /// The uploaded artifact does not match the content type the target was
    /// created for. A caller error, not retried automatically.
    #[error("content type mismatch: target expects {expected}, got {got}")]
    ContentTypeMismatch { expected: String, got: String },

    #[error("storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
}

/// A write-once destination for one session's raw audio.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadTarget {
    /// Object key; the session id is the join key for all steps
    pub key: String,

    /// Content type the target accepts
    pub content_type: &'static str,
}

/// Storage collaborator seam.
#[async_trait]
pub trait AudioStore: Send + Sync {
    /// Readiness check; fails when the destination is not configured.
    /// Called before anything is spent or created.
    fn ready(&self) -> Result<(), StorageError>;

    /// Create the write-once destination for `key`
    async fn issue_upload_target(&self, key: &str) -> Result<UploadTarget, StorageError>;

    /// Upload the artifact to a previously issued target. Exactly once per
    /// key; the content type must match what the target was created for.
    async fn put_object(
        &self,
        key: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<(), StorageError>;

    /// Read an uploaded object back
    async fn read_object(&self, key: &str) -> Result<Vec<u8>, StorageError>;
}

/// Filesystem-backed audio store rooted at a configured uploads directory.
pub struct LocalAudioStore {
    root: PathBuf,
}

impl LocalAudioStore {
    /// `root` may be empty to model an unconfigured destination; every
    /// operation will then fail with `StorageError::Unconfigured`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, key: &str) -> PathBuf {
        self.root.join(format!("{key}.wav"))
    }
}

#[async_trait]
impl AudioStore for LocalAudioStore {
    fn ready(&self) -> Result<(), StorageError> {
        if self.root.as_os_str().is_empty() {
            return Err(StorageError::Unconfigured);
        }
        Ok(())
    }

    async fn issue_upload_target(&self, key: &str) -> Result<UploadTarget, StorageError> {
        self.ready()?;
        fs::create_dir_all(&self.root).await?;

        info!("Issued upload target for {key}");

        Ok(UploadTarget {
            key: key.to_string(),
            content_type: AUDIO_CONTENT_TYPE,
        })
    }

    async fn put_object(
        &self,
        key: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> Result<(), StorageError> {
        self.ready()?;

        if content_type != AUDIO_CONTENT_TYPE {
            return Err(StorageError::ContentTypeMismatch {
                expected: AUDIO_CONTENT_TYPE.to_string(),
                got: content_type.to_string(),
            });
        }

        let path = self.object_path(key);
        if fs::try_exists(&path).await? {
            return Err(StorageError::AlreadyUploaded(key.to_string()));
        }

        fs::create_dir_all(&self.root).await?;
        fs::write(&path, bytes).await?;

        info!("Stored {} bytes for {key}", bytes.len());
        Ok(())
    }

    async fn read_object(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        self.ready()?;

        let path = self.object_path(key);
        match fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(StorageError::NotFound(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}
