use crate::backup::archive::ArchiveError;
use crate::backup::materialize::WriteError;
use crate::backup::publish::PublishError;
use crate::cancel::Cancelled;
use crate::config::ConfigError;
use crate::discovery::ProbeError;
use crate::keyspace::WalkError;
use thiserror::Error;

/// Result type for snapshot operations
pub type Result<T> = std::result::Result<T, SnapshotError>;

/// Main error type for snapshot operations.
///
/// Every variant is fatal to the operation that produced it. Invalid keys
/// never show up here; they are skipped during materialization.
#[derive(Error, Debug)]
pub enum SnapshotError {
    /// The endpoint could not be classified
    #[error(transparent)]
    Probe(#[from] ProbeError),

    /// Reading the keyspace failed
    #[error(transparent)]
    Walk(#[from] WalkError),

    /// Writing the materialized tree failed
    #[error(transparent)]
    Write(#[from] WriteError),

    /// Packing the tree failed
    #[error(transparent)]
    Archive(#[from] ArchiveError),

    /// Uploading the archive failed
    #[error(transparent)]
    Publish(#[from] PublishError),

    /// Invalid configuration
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Cancelled before archiving started
    #[error(transparent)]
    Cancelled(#[from] Cancelled),

    /// The crate was built without support for the requested operation
    #[error("{0} requires the {1:?} feature")]
    FeatureDisabled(&'static str, &'static str),
}

impl SnapshotError {
    /// Whether the operation was stopped by a cancellation signal or deadline.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            SnapshotError::Cancelled(_) | SnapshotError::Walk(WalkError::Cancelled(_))
        )
    }
}
