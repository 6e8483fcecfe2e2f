//! # etcd-snapshot
//!
//! Point-in-time, restorable snapshots of the etcd keyspace behind Kubernetes
//! and OpenShift control planes, over both the v2 and v3 etcd protocols.
//!
//! ## Overview
//!
//! A backup probes the endpoint to find out which protocol it speaks, walks
//! every namespace prefix of the detected distribution, writes each key to a
//! directory tree (one `content` file per key), packs the tree into
//! `<backup id>.tar.gz` and optionally uploads it to object storage.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use etcd_snapshot::backup::BackupManager;
//! use etcd_snapshot::config::Config;
//! use std::path::Path;
//!
//! # async fn example() -> etcd_snapshot::Result<()> {
//! let manager = BackupManager::new(Config::default());
//! let artifact = manager
//!     .backup("http://127.0.0.1:2379", Path::new("/tmp/etcd-snapshot"))
//!     .await?;
//! println!("wrote {}", artifact.archive_path.display());
//! # Ok(())
//! # }
//! ```
//!
//! ## Modules
//!
//! - [`discovery`]: endpoint probing, distro detection and key statistics
//! - [`keyspace`]: protocol independent keyspace walking
//! - [`backup`]: path mapping, materialization, archiving and publishing
//! - [`config`]: configuration built once at the boundary
//! - [`cancel`]: cooperative cancellation

#![warn(rustdoc::missing_crate_level_docs)]

/// Backup pipeline
pub mod backup;

/// Cooperative cancellation
pub mod cancel;

/// Configuration
pub mod config;

/// Endpoint probing and keyspace statistics
pub mod discovery;

/// Crate level errors
pub mod error;

/// Keyspace traversal over etcd v2 and v3
pub mod keyspace;

/// HTTP and gRPC client setup
pub mod transport;

/// Core data types and prefix constants
pub mod types;

pub use error::{Result, SnapshotError};
pub use types::{EtcdEndpoint, KeyEntry, KubernetesDistro, ProtocolVersion, StatsResult};
