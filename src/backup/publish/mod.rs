//! Destinations for finished archives.

mod directory;
#[cfg(feature = "s3")]
mod s3;

pub use directory::DirectoryObjectStore;
#[cfg(feature = "s3")]
pub use s3::S3ObjectStore;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Upload failures. Fatal to the backup and never retried here.
#[derive(Error, Debug)]
pub enum PublishError {
    #[error("bucket {bucket} does not exist")]
    BucketNotFound { bucket: String },

    #[error("failed to upload {key} to {destination}: {cause}")]
    Upload {
        destination: String,
        key: String,
        cause: String,
    },

    #[error("cannot read archive {path}: {cause}")]
    Archive { path: PathBuf, cause: String },
}

/// Where a published archive can be found
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedObject {
    pub bucket: String,
    pub key: String,
}

/// Object storage sink for archives.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Upload `archive_path` under its file name.
    async fn publish(&self, archive_path: &Path) -> Result<PublishedObject, PublishError>;

    /// Human readable destination for logs.
    fn describe(&self) -> String;
}

/// Object key for an archive: its file name.
pub fn object_key(archive_path: &Path) -> Result<String, PublishError> {
    archive_path
        .file_name()
        .and_then(|name| name.to_str())
        .map(str::to_string)
        .ok_or_else(|| PublishError::Archive {
            path: archive_path.to_path_buf(),
            cause: "archive path has no file name".to_string(),
        })
}
