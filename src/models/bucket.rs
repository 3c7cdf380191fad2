//! Represents a logical bucket — a user-named folder of uploaded images.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Minimum accepted bucket name length.
pub const BUCKET_NAME_MIN_LEN: usize = 3;

/// Reasons a bucket name is rejected.
///
/// The `Display` strings are the messages shown inline next to the bucket
/// input, so they are phrased for end users.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BucketNameError {
    #[error("Bucket name is required")]
    Empty,
    #[error("Bucket name must be at least 3 characters")]
    TooShort,
    #[error("Bucket name can only contain letters, numbers, hyphens, and underscores")]
    InvalidCharacters,
}

/// A validated bucket name.
///
/// Only `[A-Za-z0-9_-]` characters are allowed, so a `BucketName` can never
/// contain a path separator or a `..` segment and is safe to join onto the
/// upload root.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, Hash)]
#[serde(try_from = "String", into = "String")]
pub struct BucketName(String);

impl BucketName {
    /// Validate a raw name.
    ///
    /// Checks run in the order the user would fix them: presence, length,
    /// then character set. The name is not trimmed here; callers decide
    /// whether surrounding whitespace is user noise.
    pub fn parse(raw: &str) -> Result<Self, BucketNameError> {
        if raw.trim().is_empty() {
            return Err(BucketNameError::Empty);
        }
        if raw.chars().count() < BUCKET_NAME_MIN_LEN {
            return Err(BucketNameError::TooShort);
        }
        if !raw
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            return Err(BucketNameError::InvalidCharacters);
        }
        Ok(Self(raw.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BucketName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for BucketName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for BucketName {
    type Error = BucketNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<BucketName> for String {
    fn from(name: BucketName) -> Self {
        name.0
    }
}
