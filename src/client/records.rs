//! Client-side records: files picked for upload and what became of them.
//! Nothing here is persisted; a session's state is gone when the process exits.

use crate::models::bucket::BucketName;
use chrono::{DateTime, Utc};
use std::{
    io,
    path::{Path, PathBuf},
};
use tokio::fs;
use uuid::Uuid;

/// A local file chosen for upload.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectedFile {
    /// Where the bytes are read from; also what a front end previews.
    pub path: PathBuf,
    /// Original file name, sent to the server to derive the extension.
    pub name: String,
    pub size_bytes: u64,
    /// MIME type guessed from the extension.
    pub mime: String,
}

impl SelectedFile {
    pub fn new(
        path: impl Into<PathBuf>,
        name: impl Into<String>,
        size_bytes: u64,
        mime: impl Into<String>,
    ) -> Self {
        Self {
            path: path.into(),
            name: name.into(),
            size_bytes,
            mime: mime.into(),
        }
    }

    /// Describe a file on disk, guessing its MIME type from the extension.
    pub async fn from_path(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref();
        let meta = fs::metadata(path).await?;
        if !meta.is_file() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("{} is not a regular file", path.display()),
            ));
        }
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let mime = mime_guess::from_path(path).first_or_octet_stream();
        Ok(Self::new(path, name, meta.len(), mime.essence_str()))
    }

    /// Only `image/*` files are accepted into the queue.
    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }

    /// Size in MiB with two decimals, for display.
    pub fn size_mib(&self) -> String {
        format!("{:.2}", self.size_bytes as f64 / 1024.0 / 1024.0)
    }
}

/// Lifecycle of one record. `Success` and `Error` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadStatus {
    Uploading,
    Success,
    Error,
}

/// One queued file moving through selection → upload → success/error.
#[derive(Clone, Debug)]
pub struct UploadRecord {
    pub id: Uuid,
    pub file: SelectedFile,
    pub status: UploadStatus,
    /// Bucket the file was queued under.
    pub bucket: BucketName,
    /// Public URL, set once the server accepted the file.
    pub url: Option<String>,
}

impl UploadRecord {
    pub fn new(file: SelectedFile, bucket: BucketName) -> Self {
        Self {
            id: Uuid::new_v4(),
            file,
            status: UploadStatus::Uploading,
            bucket,
            url: None,
        }
    }
}

/// Files successfully uploaded together in one batch.
#[derive(Clone, Debug)]
pub struct CompletedBucket {
    pub name: BucketName,
    /// Successful records in submission order.
    pub files: Vec<UploadRecord>,
    pub created_at: DateTime<Utc>,
}
