//! The upload client's state: bucket input, the pending queue and the
//! buckets completed this session.
//!
//! A front end owns one `UploadClient` and calls into it from its event
//! handlers; rendering reads the state back through the accessors.

use crate::{
    client::{
        records::{CompletedBucket, SelectedFile, UploadRecord, UploadStatus},
        uploader::Uploader,
    },
    models::bucket::{BucketName, BucketNameError},
};
use chrono::Utc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// How long a copied URL stays marked as copied.
pub const COPIED_FEEDBACK: Duration = Duration::from_secs(2);

#[derive(Debug)]
struct CopiedUrl {
    url: String,
    until: Instant,
}

/// Outcome of one `upload_all` run.
#[derive(Debug)]
pub struct BatchReport {
    /// Every attempted record, in submission order, with its final status.
    pub records: Vec<UploadRecord>,
    /// Whether a completed bucket was recorded for this batch.
    pub completed: bool,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.count(UploadStatus::Success)
    }

    pub fn failed(&self) -> usize {
        self.count(UploadStatus::Error)
    }

    fn count(&self, status: UploadStatus) -> usize {
        self.records.iter().filter(|r| r.status == status).count()
    }
}

#[derive(Debug)]
pub struct UploadClient {
    bucket_input: String,
    bucket_error: Option<BucketNameError>,
    records: Vec<UploadRecord>,
    completed: Vec<CompletedBucket>,
    copied: Option<CopiedUrl>,
}

impl Default for UploadClient {
    fn default() -> Self {
        Self::new()
    }
}

impl UploadClient {
    pub fn new() -> Self {
        let mut client = Self {
            bucket_input: String::new(),
            bucket_error: None,
            records: Vec::new(),
            completed: Vec::new(),
            copied: None,
        };
        client.validate_input();
        client
    }

    /// Replace the bucket input and re-validate it.
    ///
    /// Returns whether file selection is now enabled.
    pub fn set_bucket_input(&mut self, value: &str) -> bool {
        self.bucket_input = value.to_string();
        self.validate_input()
    }

    /// Re-run validation when the input loses focus.
    pub fn blur(&mut self) -> bool {
        self.validate_input()
    }

    pub fn bucket_input(&self) -> &str {
        &self.bucket_input
    }

    /// The inline validation message, if the current input is invalid.
    pub fn bucket_error(&self) -> Option<&BucketNameError> {
        self.bucket_error.as_ref()
    }

    /// The current bucket, if the input is valid.
    pub fn current_bucket(&self) -> Option<BucketName> {
        BucketName::parse(self.bucket_input.trim()).ok()
    }

    /// File selection is only possible while the bucket input is valid.
    pub fn selection_enabled(&self) -> bool {
        self.bucket_error.is_none()
    }

    /// Queue files under the current bucket.
    ///
    /// Ignored entirely while selection is disabled; non-image files are
    /// skipped. Returns the ids of the records created.
    pub fn add_files(&mut self, files: impl IntoIterator<Item = SelectedFile>) -> Vec<Uuid> {
        let Some(bucket) = self.current_bucket() else {
            debug!("file selection ignored: no valid bucket");
            return Vec::new();
        };

        let mut added = Vec::new();
        for file in files {
            if !file.is_image() {
                debug!("skipping {} ({})", file.name, file.mime);
                continue;
            }
            let record = UploadRecord::new(file, bucket.clone());
            added.push(record.id);
            self.records.push(record);
        }
        added
    }

    /// Drop a queued record. Returns false if no record had that id.
    pub fn remove(&mut self, id: Uuid) -> bool {
        let before = self.records.len();
        self.records.retain(|r| r.id != id);
        self.records.len() != before
    }

    /// Drop every queued record.
    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn records(&self) -> &[UploadRecord] {
        &self.records
    }

    /// Completed buckets, most recent first.
    pub fn completed_buckets(&self) -> &[CompletedBucket] {
        &self.completed
    }

    /// Upload every queued record, one at a time, in queue order.
    ///
    /// A failed record is marked `Error` and the loop moves on. Afterwards
    /// the successful records (if any) become a new completed bucket, the
    /// queue is emptied and the bucket input is reset. Returns `None` when
    /// the queue was empty.
    ///
    /// Holding `&mut self` for the whole batch means a second trigger cannot
    /// start while one is running.
    pub async fn upload_all<U>(&mut self, uploader: &U) -> Option<BatchReport>
    where
        U: Uploader + ?Sized,
    {
        if self.records.is_empty() {
            return None;
        }

        for record in self.records.iter_mut() {
            match uploader.upload(&record.bucket, &record.file).await {
                Ok(url) => {
                    record.status = UploadStatus::Success;
                    record.url = Some(url);
                }
                Err(err) => {
                    warn!("upload of {} failed: {}", record.file.name, err);
                    record.status = UploadStatus::Error;
                }
            }
        }

        let successes: Vec<UploadRecord> = self
            .records
            .iter()
            .filter(|r| r.status == UploadStatus::Success)
            .cloned()
            .collect();

        let completed = !successes.is_empty();
        if completed {
            let name = self
                .current_bucket()
                .unwrap_or_else(|| successes[0].bucket.clone());
            info!("bucket {} completed with {} file(s)", name, successes.len());
            self.completed.insert(
                0,
                CompletedBucket {
                    name,
                    files: successes,
                    created_at: Utc::now(),
                },
            );
        }

        let records = std::mem::take(&mut self.records);
        self.set_bucket_input("");

        Some(BatchReport { records, completed })
    }

    /// Mark `url` as just copied; the mark expires after `COPIED_FEEDBACK`.
    pub fn mark_copied(&mut self, url: impl Into<String>, now: Instant) {
        self.copied = Some(CopiedUrl {
            url: url.into(),
            until: now + COPIED_FEEDBACK,
        });
    }

    /// The URL currently shown as copied, if its mark has not expired.
    pub fn copied_url(&self, now: Instant) -> Option<&str> {
        self.copied
            .as_ref()
            .filter(|c| now < c.until)
            .map(|c| c.url.as_str())
    }

    fn validate_input(&mut self) -> bool {
        self.bucket_error = BucketName::parse(self.bucket_input.trim()).err();
        self.bucket_error.is_none()
    }
}
