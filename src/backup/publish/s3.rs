// S3 publisher
// Works against AWS S3 and S3-compatible services such as MinIO

use super::{object_key, ObjectStore, PublishError, PublishedObject};
use crate::config::ObjectStoreTarget;
use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::DisplayErrorContext;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::path::Path;
use tracing::{debug, info, instrument};

/// Uploads archives to an S3 bucket with static credentials.
pub struct S3ObjectStore {
    client: Client,
    target: ObjectStoreTarget,
}

impl S3ObjectStore {
    /// Build a client for `target`. Nothing is read from the environment.
    pub fn new(target: ObjectStoreTarget) -> Self {
        let credentials = Credentials::new(
            target.access_key_id.clone(),
            target.secret_access_key.clone(),
            None,
            None,
            "etcd-snapshot",
        );

        // Path style addressing keeps MinIO style host:port endpoints working
        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(target.region.clone()))
            .endpoint_url(target.endpoint_url())
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(config),
            target,
        }
    }

    /// Check the bucket, creating it when the target allows it.
    async fn ensure_bucket(&self) -> Result<(), PublishError> {
        let bucket = &self.target.bucket;
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(()),
            Err(e) => {
                let service_error = e.into_service_error();
                if !service_error.is_not_found() {
                    return Err(PublishError::Upload {
                        destination: self.describe(),
                        key: String::new(),
                        cause: DisplayErrorContext(&service_error).to_string(),
                    });
                }
                if !self.target.create_bucket {
                    return Err(PublishError::BucketNotFound {
                        bucket: bucket.clone(),
                    });
                }

                debug!(bucket = %bucket, "Creating bucket");
                self.client
                    .create_bucket()
                    .bucket(bucket)
                    .send()
                    .await
                    .map_err(|e| PublishError::Upload {
                        destination: self.describe(),
                        key: String::new(),
                        cause: format!("failed to create bucket: {}", DisplayErrorContext(&e)),
                    })?;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl ObjectStore for S3ObjectStore {
    #[instrument(skip(self), fields(destination = %self.describe()))]
    async fn publish(&self, archive_path: &Path) -> Result<PublishedObject, PublishError> {
        let key = object_key(archive_path)?;
        self.ensure_bucket().await?;

        let body = ByteStream::from_path(archive_path)
            .await
            .map_err(|e| PublishError::Archive {
                path: archive_path.to_path_buf(),
                cause: e.to_string(),
            })?;

        self.client
            .put_object()
            .bucket(&self.target.bucket)
            .key(&key)
            .content_type("application/gzip")
            .body(body)
            .send()
            .await
            .map_err(|e| PublishError::Upload {
                destination: self.describe(),
                key: key.clone(),
                cause: DisplayErrorContext(&e).to_string(),
            })?;

        info!(bucket = %self.target.bucket, key = %key, "Archive uploaded");
        Ok(PublishedObject {
            bucket: self.target.bucket.clone(),
            key,
        })
    }

    fn describe(&self) -> String {
        format!("{}/{}", self.target.endpoint_url(), self.target.bucket)
    }
}
