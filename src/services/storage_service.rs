//! src/services/storage_service.rs
//!
//! StorageService — writes uploaded images to local disk beneath
//! `base_path/{bucket}/{generated-name}`. There is no metadata store: the
//! filesystem entry is the only record of an upload.
//!
//! Incoming bytes land in `staging_path` first. That directory is not served
//! and must sit on the same filesystem as `base_path` so a commit is a link,
//! not a copy.

use crate::models::{bucket::BucketName, upload::StoredFile};
use bytes::Bytes;
use chrono::Utc;
use futures::{Stream, StreamExt, pin_mut};
use rand::Rng;
use std::{
    io,
    path::{Path, PathBuf},
};
use thiserror::Error;
use tokio::{
    fs::{self, File},
    io::AsyncWriteExt,
};
use tracing::{debug, info};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("No image uploaded")]
    MissingImage,
    #[error("No bucket specified")]
    MissingBucket,
    #[error("bucket `{name}` invalid: {reason}")]
    InvalidBucketName { name: String, reason: String },
    #[error("could not pick a free file name in bucket `{0}`")]
    NameExhausted(String),
    #[error(transparent)]
    Io(#[from] io::Error),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// Upper bound (inclusive) of the random component of a generated name.
const NAME_NONCE_MAX: u32 = 1_000_000_000;
/// Extensions longer than this are dropped from the generated name.
const MAX_EXTENSION_LEN: usize = 16;
/// How many fresh names are tried before giving up on a collision.
const NAME_ATTEMPTS: usize = 4;

/// An upload whose bytes are on disk but not yet placed in a bucket.
///
/// Multipart fields may arrive in any order, so the image is streamed to a
/// temporary file first and moved once the bucket is known.
#[derive(Debug)]
pub struct StagedUpload {
    tmp_path: PathBuf,
    original_name: Option<String>,
    size_bytes: u64,
}

impl StagedUpload {
    pub fn original_name(&self) -> Option<&str> {
        self.original_name.as_deref()
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }
}

/// StorageService owns the upload root and every path computed under it.
#[derive(Clone, Debug)]
pub struct StorageService {
    /// Base directory on disk; also the root served under `/images`.
    pub base_path: PathBuf,

    /// Private directory for partially received uploads.
    pub staging_path: PathBuf,
}

impl StorageService {
    /// Use `base_path` as the upload root and its sibling
    /// `.<name>-staging` directory for partial uploads.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        let base_path = base_path.into();
        let staging_path = default_staging_dir(&base_path);
        Self::with_staging_dir(base_path, staging_path)
    }

    pub fn with_staging_dir(base_path: impl Into<PathBuf>, staging_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            staging_path: staging_path.into(),
        }
    }

    /// Compute the directory for a bucket.
    ///
    /// Pure: does not touch the filesystem. `BucketName` guarantees the
    /// result stays directly beneath `base_path`.
    pub fn bucket_path(&self, bucket: &BucketName) -> PathBuf {
        self.base_path.join(bucket.as_str())
    }

    /// Validate a raw bucket value from a request and resolve its directory.
    pub fn resolve_bucket(&self, raw: Option<&str>) -> StorageResult<(BucketName, PathBuf)> {
        let raw = raw.map(str::trim).filter(|s| !s.is_empty());
        let Some(raw) = raw else {
            return Err(StorageError::MissingBucket);
        };
        let bucket = BucketName::parse(raw).map_err(|err| StorageError::InvalidBucketName {
            name: raw.to_string(),
            reason: err.to_string(),
        })?;
        let path = self.bucket_path(&bucket);
        debug!("resolved bucket {} to {}", bucket, path.display());
        Ok((bucket, path))
    }

    /// Stream an incoming image to a temporary file under `staging_path`.
    ///
    /// The temporary file is removed again if the stream or a write fails.
    pub async fn stage_upload<S>(
        &self,
        original_name: Option<String>,
        stream: S,
    ) -> StorageResult<StagedUpload>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        fs::create_dir_all(&self.staging_path).await?;
        let tmp_path = self.staging_path.join(format!(".tmp-{}", Uuid::new_v4()));
        let mut file = File::create(&tmp_path).await?;

        let mut size_bytes: u64 = 0;
        pin_mut!(stream);
        while let Some(chunk_res) = stream.next().await {
            let chunk = match chunk_res {
                Ok(chunk) => chunk,
                Err(err) => {
                    let _ = fs::remove_file(&tmp_path).await;
                    return Err(StorageError::Io(err));
                }
            };
            size_bytes += chunk.len() as u64;
            if let Err(err) = file.write_all(&chunk).await {
                let _ = fs::remove_file(&tmp_path).await;
                return Err(StorageError::Io(err));
            }
        }
        if let Err(err) = file.flush().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }
        if let Err(err) = file.sync_all().await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StorageError::Io(err));
        }

        Ok(StagedUpload {
            tmp_path,
            original_name,
            size_bytes,
        })
    }

    /// Move a staged upload into its bucket under a freshly generated name.
    ///
    /// Creates the bucket directory (and parents) if needed. The file is
    /// hard-linked into place, which fails instead of replacing an existing
    /// entry; on a name collision a new name is generated.
    pub async fn commit_upload(
        &self,
        staged: StagedUpload,
        bucket: BucketName,
        dir: PathBuf,
    ) -> StorageResult<StoredFile> {
        self.commit_with_names(staged, bucket, dir, |original_name| {
            generated_name(
                original_name,
                Utc::now().timestamp_millis(),
                rand::rng().random_range(0..=NAME_NONCE_MAX),
            )
        })
        .await
    }

    async fn commit_with_names<F>(
        &self,
        staged: StagedUpload,
        bucket: BucketName,
        dir: PathBuf,
        mut next_name: F,
    ) -> StorageResult<StoredFile>
    where
        F: FnMut(Option<&str>) -> String,
    {
        if let Err(err) = fs::create_dir_all(&dir).await {
            self.discard_upload(staged).await;
            return Err(StorageError::Io(err));
        }

        for _ in 0..NAME_ATTEMPTS {
            let file_name = next_name(staged.original_name());
            let path = dir.join(&file_name);
            match fs::hard_link(&staged.tmp_path, &path).await {
                Ok(_) => {}
                Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                    debug!("generated name {} already taken, retrying", file_name);
                    continue;
                }
                Err(err) => {
                    self.discard_upload(staged).await;
                    return Err(StorageError::Io(err));
                }
            }
            // the stored link is complete; the staging name is just dropped
            self.discard_upload_path(&staged.tmp_path).await;

            info!(
                "stored {} bytes as {}",
                staged.size_bytes,
                path.display()
            );
            return Ok(StoredFile {
                bucket,
                file_name,
                path,
                size_bytes: staged.size_bytes,
            });
        }

        self.discard_upload(staged).await;
        Err(StorageError::NameExhausted(bucket.to_string()))
    }

    /// Remove a staged upload that will not be committed.
    pub async fn discard_upload(&self, staged: StagedUpload) {
        self.discard_upload_path(&staged.tmp_path).await;
    }

    async fn discard_upload_path(&self, tmp_path: &Path) {
        if let Err(err) = fs::remove_file(tmp_path).await {
            if err.kind() != io::ErrorKind::NotFound {
                debug!(
                    "failed to remove staged upload {}: {}",
                    tmp_path.display(),
                    err
                );
            }
        }
    }
}

/// `<parent>/.<name>-staging` next to the upload root.
fn default_staging_dir(base_path: &Path) -> PathBuf {
    let name = base_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "uploads".into());
    let staging = format!(".{}-staging", name);
    match base_path.parent() {
        Some(parent) => parent.join(staging),
        None => PathBuf::from(staging),
    }
}

/// Build the on-disk name for an upload: `<millis>-<nonce><ext>`.
///
/// `<ext>` is the original file's extension including the dot, or empty
/// when the original has none or it is not plain alphanumeric.
pub fn generated_name(original_name: Option<&str>, millis: i64, nonce: u32) -> String {
    let ext = original_name.and_then(original_extension).unwrap_or_default();
    format!("{}-{}{}", millis, nonce, ext)
}

/// Extension of the last path component of `name`, dot included.
///
/// Browsers may send a full client path, so both separators are honoured.
fn original_extension(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    let ext = Path::new(base).extension()?.to_str()?;
    if ext.is_empty()
        || ext.len() > MAX_EXTENSION_LEN
        || !ext.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return None;
    }
    Some(format!(".{}", ext))
}
