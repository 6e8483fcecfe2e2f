//! Core data types shared by the prober, walkers, backup pipeline and stats.

use crate::config::EtcdTlsConfig;
use serde::{Deserialize, Serialize};
use std::fmt;

/// etcd key prefix for Kubernetes objects on etcd v2 era installs
pub const LEGACY_KUBERNETES_PREFIX: &str = "/kubernetes.io";

/// etcd key prefix for Kubernetes objects on etcd v3
pub const KUBERNETES_PREFIX: &str = "/registry";

/// etcd key prefix for OpenShift-specific objects
pub const OPENSHIFT_PREFIX: &str = "/openshift.io";

/// Default working directory used by the command line front end
pub const DEFAULT_WORK_DIR: &str = "/tmp/etcd-snapshot";

/// Extension of the archives produced by a backup
pub const ARCHIVE_EXTENSION: &str = "tar.gz";

/// etcd client protocol generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProtocolVersion {
    /// Hierarchical keys API (`/v2/keys`)
    V2,
    /// Flat keyspace with prefix range queries
    V3,
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolVersion::V2 => write!(f, "v2"),
            ProtocolVersion::V3 => write!(f, "v3"),
        }
    }
}

/// Orchestration platform flavor whose namespace convention is targeted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KubernetesDistro {
    /// Upstream Kubernetes
    Vanilla,
    /// OpenShift, which stores additional objects under its own root
    OpenShift,
}

impl KubernetesDistro {
    /// The Kubernetes root prefix for the given protocol.
    pub fn kubernetes_prefix(protocol: ProtocolVersion) -> &'static str {
        match protocol {
            ProtocolVersion::V2 => LEGACY_KUBERNETES_PREFIX,
            ProtocolVersion::V3 => KUBERNETES_PREFIX,
        }
    }

    /// Prefixes a backup of this distro has to cover.
    pub fn backup_prefixes(&self, protocol: ProtocolVersion) -> Vec<&'static str> {
        match self {
            KubernetesDistro::Vanilla => vec![Self::kubernetes_prefix(protocol)],
            KubernetesDistro::OpenShift => {
                vec![Self::kubernetes_prefix(protocol), OPENSHIFT_PREFIX]
            }
        }
    }

    /// Prefixes that hold keys specific to this distro.
    ///
    /// Stats for OpenShift only look at the OpenShift root so a vanilla
    /// cluster reports zero for it.
    pub fn stats_prefixes(&self, protocol: ProtocolVersion) -> Vec<&'static str> {
        match self {
            KubernetesDistro::Vanilla => vec![Self::kubernetes_prefix(protocol)],
            KubernetesDistro::OpenShift => vec![OPENSHIFT_PREFIX],
        }
    }
}

impl fmt::Display for KubernetesDistro {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KubernetesDistro::Vanilla => write!(f, "Vanilla Kubernetes"),
            KubernetesDistro::OpenShift => write!(f, "OpenShift"),
        }
    }
}

/// A probed etcd endpoint. Immutable once constructed by the prober.
#[derive(Debug, Clone, PartialEq)]
pub struct EtcdEndpoint {
    url: String,
    protocol: ProtocolVersion,
    secure: bool,
    tls: Option<EtcdTlsConfig>,
}

impl EtcdEndpoint {
    /// Build an endpoint from already known properties.
    ///
    /// Normally obtained through [`crate::discovery::probe`].
    pub fn new(
        url: impl Into<String>,
        protocol: ProtocolVersion,
        secure: bool,
        tls: Option<EtcdTlsConfig>,
    ) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            protocol,
            secure,
            tls,
        }
    }

    /// Base URL without trailing slash
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Detected protocol generation
    pub fn protocol(&self) -> ProtocolVersion {
        self.protocol
    }

    /// Whether the endpoint is reached over TLS
    pub fn is_secure(&self) -> bool {
        self.secure
    }

    /// TLS material, present for secure endpoints
    pub fn tls(&self) -> Option<&EtcdTlsConfig> {
        if self.secure {
            self.tls.as_ref()
        } else {
            None
        }
    }
}

/// One entry produced by a keyspace walk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEntry {
    /// Absolute, slash delimited key
    pub key: String,
    /// Raw value bytes, empty for directories
    pub value: Vec<u8>,
    /// Explicit v2 directory marker
    pub is_directory: bool,
}

impl KeyEntry {
    /// A key holding a value.
    pub fn leaf(key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            is_directory: false,
        }
    }

    /// An explicit v2 directory node.
    pub fn directory(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: Vec::new(),
            is_directory: true,
        }
    }
}

/// Key count and aggregate value size of a namespace.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsResult {
    /// Number of entries, directories included
    pub key_count: u64,
    /// Sum of value lengths in bytes
    pub total_bytes: u64,
    /// Number of explicit directory entries among `key_count`
    pub directory_count: u64,
}

impl StatsResult {
    /// Entries that carry a value.
    ///
    /// Zero when `directory_count` exceeds `key_count`.
    pub fn leaf_count(&self) -> u64 {
        self.key_count.saturating_sub(self.directory_count)
    }

    /// Fold one entry into the running totals.
    pub fn record(&mut self, entry: &KeyEntry) {
        self.key_count += 1;
        if entry.is_directory {
            self.directory_count += 1;
        } else {
            self.total_bytes += entry.value.len() as u64;
        }
    }

    /// True when the namespace held nothing.
    pub fn is_empty(&self) -> bool {
        self.key_count == 0
    }
}

impl std::ops::AddAssign for StatsResult {
    fn add_assign(&mut self, other: Self) {
        self.key_count += other.key_count;
        self.total_bytes += other.total_bytes;
        self.directory_count += other.directory_count;
    }
}
