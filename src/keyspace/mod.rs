//! Keyspace traversal over the etcd v2 and v3 protocols.
//!
//! Both protocols sit behind [`KeyspaceWalker`], which exposes a single
//! operation: stream every entry under a prefix. Which implementation is used
//! is decided once, after probing, by [`connect`].

pub mod memory;
pub mod tree;
pub mod v2;
pub mod v3;

pub use memory::MemoryWalker;
pub use tree::{implied_directories, infer_directories};
pub use v2::V2Walker;
pub use v3::{RangeFetch, RangePage, RangeRequest, V3Walker};

use crate::cancel::{Cancellation, Cancelled};
use crate::config::Config;
use crate::types::{EtcdEndpoint, KeyEntry, ProtocolVersion};
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use futures::{FutureExt, TryStreamExt};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Errors raised while walking a keyspace
#[derive(Error, Debug)]
pub enum WalkError {
    /// A request failed; the walk is aborted
    #[error("failed to read keyspace under {prefix}: {cause}")]
    KeyspaceRead { prefix: String, cause: String },

    /// The client for the endpoint could not be set up
    #[error("failed to connect to {endpoint}: {cause}")]
    Connect { endpoint: String, cause: String },

    #[error(transparent)]
    Cancelled(#[from] Cancelled),
}

impl WalkError {
    pub(crate) fn read(prefix: &str, cause: impl ToString) -> Self {
        WalkError::KeyspaceRead {
            prefix: prefix.to_string(),
            cause: cause.to_string(),
        }
    }
}

/// Lazy, finite stream of entries produced by a walk
pub type WalkStream = BoxStream<'static, Result<KeyEntry, WalkError>>;

/// Protocol independent traversal of an etcd keyspace.
///
/// Every call to [`walk`](KeyspaceWalker::walk) starts from the beginning of
/// the prefix. An error item ends the stream.
pub trait KeyspaceWalker: Send + Sync {
    /// Stream all entries under `prefix`.
    fn walk(&self, prefix: &str) -> WalkStream;

    /// Whether anything lives under `prefix`.
    ///
    /// Defaults to pulling the first entry of a walk. Walkers that can
    /// answer without reading the subtree override it.
    fn exists<'a>(&'a self, prefix: &'a str) -> BoxFuture<'a, Result<bool, WalkError>> {
        let mut entries = self.walk(prefix);
        async move { Ok::<_, WalkError>(entries.try_next().await?.is_some()) }.boxed()
    }

    /// Protocol whose layout the entries follow.
    fn protocol(&self) -> ProtocolVersion;
}

/// Options shared by the network walkers
#[derive(Debug, Clone)]
pub struct WalkerOptions {
    pub request_timeout: Duration,
    pub page_size: i64,
    pub cancellation: Cancellation,
}

impl Default for WalkerOptions {
    fn default() -> Self {
        let config = Config::default();
        Self {
            request_timeout: config.request_timeout,
            page_size: config.page_size,
            cancellation: Cancellation::new(),
        }
    }
}

impl WalkerOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            request_timeout: config.request_timeout,
            page_size: config.page_size,
            cancellation: Cancellation::new(),
        }
    }

    pub fn with_cancellation(mut self, cancellation: Cancellation) -> Self {
        self.cancellation = cancellation;
        self
    }
}

/// Pick the walker matching the probed protocol.
pub async fn connect(
    endpoint: &EtcdEndpoint,
    options: &WalkerOptions,
) -> Result<Box<dyn KeyspaceWalker>, WalkError> {
    debug!(endpoint = %endpoint.url(), protocol = %endpoint.protocol(), "Connecting keyspace walker");
    match endpoint.protocol() {
        ProtocolVersion::V2 => Ok(Box::new(V2Walker::new(endpoint, options)?)),
        ProtocolVersion::V3 => Ok(Box::new(V3Walker::connect(endpoint, options).await?)),
    }
}
