use axum::body::Bytes;
use axum::extract::multipart::{Field, MultipartError};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum UploadError {
    #[error("only image uploads are allowed, got {0}")]
    NotAnImage(String),
    #[error("file exceeds the {limit} byte upload limit")]
    TooLarge { limit: usize },
    #[error("unexpected file field: {0}")]
    UnexpectedField(String),
    #[error("malformed multipart body: {0}")]
    Multipart(#[from] MultipartError),
    #[error("failed to store upload: {0}")]
    Io(#[from] std::io::Error),
}

/// A screenshot that passed the type and size checks but is not on disk yet.
#[derive(Debug, Clone)]
pub struct PendingUpload {
    pub original_name: String,
    pub content_type: String,
    pub bytes: Bytes,
}

/// A screenshot written to the upload directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredUpload {
    pub filename: String,
    pub path: PathBuf,
    pub content_type: String,
    pub size: usize,
}

#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
    max_bytes: usize,
}

pub fn is_image(content_type: &str) -> bool {
    content_type.starts_with("image/")
}

/// `<unix_millis>-<uuid>` plus the original extension, when there is one.
pub fn stored_filename(original_name: &str, unix_millis: i64, token: Uuid) -> String {
    match Path::new(original_name).extension().and_then(|e| e.to_str()) {
        Some(ext) if !ext.is_empty() => format!("{unix_millis}-{token}.{ext}"),
        _ => format!("{unix_millis}-{token}"),
    }
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            dir: dir.into(),
            max_bytes,
        }
    }

    pub fn max_bytes(&self) -> usize {
        self.max_bytes
    }

    /// Reads a file field into memory, enforcing the image type and size policy.
    /// A file input left empty by the browser yields `None`.
    pub async fn accept(&self, mut field: Field<'_>) -> Result<Option<PendingUpload>, UploadError> {
        let original_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();

        let mut next = field.chunk().await?;
        // nothing picked in the form
        if original_name.is_empty() && next.as_ref().map_or(true, |c| c.is_empty()) {
            return Ok(None);
        }

        if !is_image(&content_type) {
            return Err(UploadError::NotAnImage(content_type));
        }

        let mut buf = Vec::new();
        while let Some(chunk) = next {
            if buf.len() + chunk.len() > self.max_bytes {
                return Err(UploadError::TooLarge {
                    limit: self.max_bytes,
                });
            }
            buf.extend_from_slice(&chunk);
            next = field.chunk().await?;
        }

        debug!(
            "Accepted upload {} ({}, {} bytes)",
            original_name,
            content_type,
            buf.len()
        );

        Ok(Some(PendingUpload {
            original_name,
            content_type,
            bytes: Bytes::from(buf),
        }))
    }

    /// Writes an accepted upload under a fresh unique name. The file is kept
    /// indefinitely.
    pub async fn store(&self, upload: PendingUpload) -> Result<StoredUpload, UploadError> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let filename = stored_filename(
            &upload.original_name,
            Utc::now().timestamp_millis(),
            Uuid::new_v4(),
        );
        let path = self.dir.join(&filename);
        tokio::fs::write(&path, &upload.bytes).await?;

        let stored = StoredUpload {
            filename,
            path,
            content_type: upload.content_type,
            size: upload.bytes.len(),
        };
        info!(
            "Stored screenshot at: {} ({} bytes)",
            stored.path.display(),
            stored.size
        );
        Ok(stored)
    }
}
