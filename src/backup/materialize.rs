//! Writing walked entries to disk.

use super::paths::{map_to_path, PathError};
use crate::keyspace::implied_directories;
use crate::types::KeyEntry;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

/// A filesystem failure; aborts the backup
#[derive(Error, Debug)]
#[error("failed to write {path}: {source}")]
pub struct WriteError {
    pub path: PathBuf,
    #[source]
    pub source: std::io::Error,
}

impl WriteError {
    fn new(path: &Path, source: std::io::Error) -> Self {
        Self {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Writes entries below one working directory.
///
/// Remembers the directories it already created so the directories implied
/// by flat v3 keys are only created once per walk.
#[derive(Debug)]
pub struct Materializer {
    work_dir: PathBuf,
    created: HashSet<PathBuf>,
    written: u64,
    skipped: u64,
}

impl Materializer {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
            created: HashSet::new(),
            written: 0,
            skipped: 0,
        }
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Values written so far
    pub fn written(&self) -> u64 {
        self.written
    }

    /// Entries dropped because their key was invalid
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Write one entry.
    ///
    /// Returns the value file for leaves, the directory for directory
    /// entries and `None` for skipped invalid keys.
    pub async fn materialize(&mut self, entry: &KeyEntry) -> Result<Option<PathBuf>, WriteError> {
        let mapped = match map_to_path(&entry.key, &self.work_dir) {
            Ok(mapped) => mapped,
            Err(PathError::InvalidKey(key)) | Err(PathError::MalformedComponent(key)) => {
                warn!(key = %key, "Skipping invalid key");
                self.skipped += 1;
                return Ok(None);
            }
        };

        for parent in implied_directories(&entry.key) {
            if let Ok(parent) = map_to_path(parent, &self.work_dir) {
                self.ensure_dir(&parent.dir).await?;
            }
        }

        if entry.is_directory {
            self.ensure_dir(&mapped.dir).await?;
            return Ok(Some(mapped.dir));
        }

        self.ensure_dir(&mapped.dir).await?;
        fs::write(&mapped.file, &entry.value)
            .await
            .map_err(|e| WriteError::new(&mapped.file, e))?;
        self.written += 1;
        debug!(key = %entry.key, bytes = entry.value.len(), "Stored key");

        Ok(Some(mapped.file))
    }

    async fn ensure_dir(&mut self, dir: &Path) -> Result<(), WriteError> {
        if self.created.contains(dir) {
            return Ok(());
        }
        fs::create_dir_all(dir)
            .await
            .map_err(|e| WriteError::new(dir, e))?;
        self.created.insert(dir.to_path_buf());
        Ok(())
    }
}

/// Write a single entry below `work_dir`.
pub async fn materialize(entry: &KeyEntry, work_dir: &Path) -> Result<Option<PathBuf>, WriteError> {
    Materializer::new(work_dir).materialize(entry).await
}
