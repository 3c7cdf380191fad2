//! Represents a stored upload and the JSON body returned for it.

use crate::models::bucket::BucketName;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A file persisted under `<upload root>/<bucket>/<file_name>`.
///
/// Nothing besides the filesystem entry is recorded; this struct only
/// lives for the duration of the request that wrote it.
#[derive(Clone, Debug)]
pub struct StoredFile {
    /// Bucket the file was written into.
    pub bucket: BucketName,

    /// Generated name (`<millis>-<random><ext>`), independent of the original name.
    pub file_name: String,

    /// Full path on disk.
    pub path: PathBuf,

    /// Number of bytes written.
    pub size_bytes: u64,
}

/// Body of every `POST /api/upload` response.
///
/// Success carries `url`, failure carries `message`; the unused field is
/// omitted from the JSON.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct UploadResponse {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl UploadResponse {
    pub fn ok(url: impl Into<String>) -> Self {
        Self {
            success: true,
            url: Some(url.into()),
            message: None,
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            url: None,
            message: Some(message.into()),
        }
    }
}
