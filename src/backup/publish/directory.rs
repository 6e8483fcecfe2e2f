use super::{object_key, ObjectStore, PublishError, PublishedObject};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::info;

/// Publishes archives by copying them into a local directory.
///
/// The directory plays the role of the bucket and must already exist.
pub struct DirectoryObjectStore {
    directory: PathBuf,
}

impl DirectoryObjectStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
        }
    }
}

#[async_trait]
impl ObjectStore for DirectoryObjectStore {
    async fn publish(&self, archive_path: &Path) -> Result<PublishedObject, PublishError> {
        let key = object_key(archive_path)?;
        let bucket = self.directory.display().to_string();

        if !fs::metadata(&self.directory).await.map(|m| m.is_dir()).unwrap_or(false) {
            return Err(PublishError::BucketNotFound { bucket });
        }

        fs::copy(archive_path, self.directory.join(&key))
            .await
            .map_err(|e| PublishError::Upload {
                destination: bucket.clone(),
                key: key.clone(),
                cause: e.to_string(),
            })?;

        info!(bucket = %bucket, key = %key, "Archive copied");
        Ok(PublishedObject { bucket, key })
    }

    fn describe(&self) -> String {
        format!("directory {}", self.directory.display())
    }
}
