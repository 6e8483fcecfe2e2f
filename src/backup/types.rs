// Backup result types

use super::publish::PublishedObject;
use crate::types::{KubernetesDistro, ProtocolVersion};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Outcome of one successful backup run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupArtifact {
    pub backup_id: String,
    /// Staging tree the keys were materialized into, `None` once removed
    pub local_directory: Option<PathBuf>,
    /// `<work_dir>/<backup_id>.tar.gz`, present on disk when returned
    pub archive_path: PathBuf,
    pub published: Option<PublishedObject>,
    pub summary: BackupSummary,
}

/// What a backup walked and wrote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupSummary {
    pub protocol: ProtocolVersion,
    pub distro: KubernetesDistro,
    pub prefixes: Vec<String>,
    /// Leaf values written to disk
    pub keys_written: u64,
    /// Entries dropped because their key was not a valid store key
    pub keys_skipped: u64,
}
