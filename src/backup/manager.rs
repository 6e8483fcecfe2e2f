// Backup Manager - sequences probe, walk, materialize, archive and publish

use super::archive::{self, backup_id};
use super::materialize::{Materializer, WriteError};
use super::paths::root_sentinel;
use super::publish::ObjectStore;
use super::types::{BackupArtifact, BackupSummary};
use crate::cancel::Cancellation;
use crate::config::{Config, ObjectStoreTarget};
use crate::discovery::{detect_distro, probe};
use crate::error::Result;
use crate::keyspace::{self, KeyspaceWalker, WalkerOptions};
use chrono::Utc;
use futures::TryStreamExt;
use std::path::Path;
use tokio::fs;
use tracing::{debug, info, instrument, warn};

/// Runs backups of one or more etcd endpoints with a fixed configuration.
pub struct BackupManager {
    config: Config,
    store: Option<Box<dyn ObjectStore>>,
    cancellation: Cancellation,
}

impl BackupManager {
    /// A manager that only archives locally until an object store is attached.
    pub fn new(config: Config) -> Self {
        Self {
            config,
            store: None,
            cancellation: Cancellation::new(),
        }
    }

    pub fn with_object_store(mut self, store: impl ObjectStore + 'static) -> Self {
        self.store = Some(Box::new(store));
        self
    }

    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = cancellation;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Probe `endpoint_url`, then back it up below `work_dir`.
    #[instrument(skip(self, work_dir), fields(work_dir = %work_dir.display()))]
    pub async fn backup(&self, endpoint_url: &str, work_dir: &Path) -> Result<BackupArtifact> {
        let endpoint = probe(
            endpoint_url,
            self.config.etcd_tls.as_ref(),
            self.config.request_timeout,
        )
        .await?;

        let options = WalkerOptions::from_config(&self.config).with_cancellation(self.cancellation.clone());
        let walker = keyspace::connect(&endpoint, &options).await?;
        self.backup_from(walker.as_ref(), endpoint.url(), work_dir).await
    }

    /// Back up the keyspace behind `walker`.
    ///
    /// `endpoint_label` identifies the source in the backup id. Entries are
    /// materialized into `<work_dir>/<id>/` and archived as
    /// `<work_dir>/<id>.tar.gz`. The archive is left on disk after publishing.
    pub async fn backup_from(
        &self,
        walker: &dyn KeyspaceWalker,
        endpoint_label: &str,
        work_dir: &Path,
    ) -> Result<BackupArtifact> {
        let backup_id = backup_id(endpoint_label, Utc::now());
        let staging = work_dir.join(&backup_id);
        info!(backup_id = %backup_id, endpoint = %endpoint_label, "Starting backup");

        let summary = match self.stage(walker, &staging).await {
            Ok(summary) => summary,
            Err(e) => {
                discard_staging(&staging).await;
                return Err(e);
            }
        };

        // Cancellation is no longer observed past this point
        let archive_path = match archive::archive(&staging, &backup_id, work_dir).await {
            Ok(path) => path,
            Err(e) => {
                discard_staging(&staging).await;
                return Err(e.into());
            }
        };

        let local_directory = if self.config.retain_staging {
            Some(staging)
        } else {
            fs::remove_dir_all(&staging)
                .await
                .map_err(|source| WriteError {
                    path: staging.clone(),
                    source,
                })?;
            None
        };

        let published = match &self.store {
            Some(store) => {
                debug!(destination = %store.describe(), "Publishing archive");
                Some(store.publish(&archive_path).await?)
            }
            None => None,
        };

        info!(
            backup_id = %backup_id,
            archive = %archive_path.display(),
            keys = summary.keys_written,
            skipped = summary.keys_skipped,
            published = published.is_some(),
            "Backup complete"
        );

        Ok(BackupArtifact {
            backup_id,
            local_directory,
            archive_path,
            published,
            summary,
        })
    }

    async fn stage(&self, walker: &dyn KeyspaceWalker, staging: &Path) -> Result<BackupSummary> {
        fs::create_dir_all(staging).await.map_err(|source| WriteError {
            path: staging.to_path_buf(),
            source,
        })?;

        let protocol = walker.protocol();
        let distro = detect_distro(walker).await?;
        let prefixes = distro.backup_prefixes(protocol);
        let mut materializer = Materializer::new(staging);

        for prefix in &prefixes {
            self.cancellation.check()?;
            let mut entries = walker.walk(prefix);
            while let Some(entry) = entries.try_next().await? {
                self.cancellation.check()?;
                materializer.materialize(&entry).await?;
            }
            debug!(prefix, written = materializer.written(), "Walked prefix");
        }

        remove_root_sentinel(staging).await?;

        Ok(BackupSummary {
            protocol,
            distro,
            prefixes: prefixes.into_iter().map(str::to_string).collect(),
            keys_written: materializer.written(),
            keys_skipped: materializer.skipped(),
        })
    }
}

async fn discard_staging(staging: &Path) {
    if let Err(cleanup) = fs::remove_dir_all(staging).await {
        debug!(error = %cleanup, "Staging directory not removed");
    }
}

/// The root key never becomes backup content.
async fn remove_root_sentinel(staging: &Path) -> std::result::Result<(), WriteError> {
    let sentinel = root_sentinel(staging);
    match fs::remove_file(&sentinel).await {
        Ok(()) => {
            warn!(path = %sentinel.display(), "Dropped value of the root key");
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(WriteError {
            path: sentinel,
            source,
        }),
    }
}

/// Back up `endpoint_url` into `work_dir` and publish to `target` if given.
///
/// Returns the backup id; `<work_dir>/<id>.tar.gz` exists when this returns.
pub async fn backup(
    endpoint_url: &str,
    work_dir: &Path,
    target: Option<ObjectStoreTarget>,
    config: &Config,
) -> Result<String> {
    let manager = BackupManager::new(config.clone());

    #[cfg(feature = "s3")]
    let manager = match target {
        Some(target) => manager.with_object_store(super::publish::S3ObjectStore::new(target)),
        None => manager,
    };
    #[cfg(not(feature = "s3"))]
    if target.is_some() {
        return Err(crate::error::SnapshotError::FeatureDisabled("publishing to object storage", "s3"));
    }

    let artifact = manager.backup(endpoint_url, work_dir).await?;
    Ok(artifact.backup_id)
}
