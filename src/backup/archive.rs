//! Packing a materialized tree into a single gzip-compressed tar archive.

use crate::types::ARCHIVE_EXTENSION;
use chrono::{DateTime, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("failed to archive {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("archive task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Identifier of one backup run: creation time in milliseconds plus a
/// short digest of the endpoint it was taken from.
pub fn backup_id(endpoint_url: &str, at: DateTime<Utc>) -> String {
    let digest = format!("{:x}", Sha256::digest(endpoint_url.as_bytes()));
    format!("{}-{}", at.timestamp_millis(), &digest[..8])
}

/// `<work_dir>/<backup_id>.tar.gz`
pub fn archive_path(work_dir: &Path, backup_id: &str) -> PathBuf {
    work_dir.join(format!("{}.{}", backup_id, ARCHIVE_EXTENSION))
}

/// Archive `source_dir` as `<work_dir>/<backup_id>.tar.gz`.
///
/// Entries are rooted at `<backup_id>/`. The archive is written under a
/// temporary name and renamed once complete, so a finished path never holds
/// a truncated archive. On failure the temporary file is removed.
#[instrument(skip_all, fields(backup_id = %backup_id))]
pub async fn archive(source_dir: &Path, backup_id: &str, work_dir: &Path) -> Result<PathBuf, ArchiveError> {
    let target = archive_path(work_dir, backup_id);
    let partial = work_dir.join(format!("{}.{}.partial", backup_id, ARCHIVE_EXTENSION));

    let source = source_dir.to_path_buf();
    let root = backup_id.to_string();
    let written = partial.clone();
    let result = match tokio::task::spawn_blocking(move || write_archive(&source, &root, &written)).await {
        Ok(Ok(())) => tokio::fs::rename(&partial, &target)
            .await
            .map_err(|source| ArchiveError::Io {
                path: target.clone(),
                source,
            }),
        Ok(Err(e)) => Err(e),
        Err(join) => Err(join.into()),
    };
    if let Err(e) = result {
        remove_partial(&partial).await;
        return Err(e);
    }

    let size = tokio::fs::metadata(&target).await.map(|m| m.len()).unwrap_or(0);
    info!(archive = %target.display(), size_bytes = size, "Archive written");
    Ok(target)
}

async fn remove_partial(partial: &Path) {
    match tokio::fs::remove_file(partial).await {
        Ok(()) => debug!(path = %partial.display(), "Removed partial archive"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %partial.display(), error = %e, "Partial archive not removed"),
    }
}

fn write_archive(source_dir: &Path, root: &str, target: &Path) -> Result<(), ArchiveError> {
    let io_error = |source| ArchiveError::Io {
        path: target.to_path_buf(),
        source,
    };

    let file = File::create(target).map_err(io_error)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);
    builder.append_dir_all(root, source_dir).map_err(io_error)?;

    let encoder = builder.into_inner().map_err(io_error)?;
    let file = encoder.finish().map_err(io_error)?;
    file.sync_all().map_err(io_error)?;
    Ok(())
}
