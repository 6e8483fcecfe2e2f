// Backup pipeline: key to path mapping, materialization, archiving and publishing

pub mod archive;
pub mod manager;
pub mod materialize;
pub mod paths;
pub mod publish;
pub mod types;

pub use archive::{archive, archive_path, backup_id, ArchiveError};
pub use manager::{backup, BackupManager};
pub use materialize::{materialize, Materializer, WriteError};
pub use paths::{map_to_path, MappedPath, PathError};
pub use publish::{DirectoryObjectStore, ObjectStore, PublishError, PublishedObject};
#[cfg(feature = "s3")]
pub use publish::S3ObjectStore;
pub use types::{BackupArtifact, BackupSummary};
