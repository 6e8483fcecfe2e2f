//! etcd v3 walker using paged prefix range scans.

use super::{KeyspaceWalker, WalkError, WalkStream, WalkerOptions};
use crate::cancel::Cancellation;
use crate::transport;
use crate::types::{EtcdEndpoint, KeyEntry, ProtocolVersion};
use async_trait::async_trait;
use etcd_client::{Client, GetOptions};
use futures::future::BoxFuture;
use futures::{stream, FutureExt, StreamExt, TryStreamExt};
use tracing::{debug, info, warn};

/// Marks a key whose raw bytes are not UTF-8. Such keys never map to a path.
pub const NON_UTF8_KEY_PREFIX: &str = "non-utf8:";

/// One bounded range read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeRequest {
    pub start: Vec<u8>,
    pub range_end: Vec<u8>,
    pub limit: i64,
    /// Read at this store revision; the current one when `None`
    pub revision: Option<i64>,
}

/// Key/value pairs returned by one range read, in key order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RangePage {
    pub kvs: Vec<(Vec<u8>, Vec<u8>)>,
    /// More keys exist past the last one returned
    pub more: bool,
    /// Store revision the page was read at
    pub revision: i64,
}

/// Source of range reads for [`V3Walker`].
#[async_trait]
pub trait RangeFetch: Clone + Send + Sync + 'static {
    async fn fetch(&mut self, request: RangeRequest) -> Result<RangePage, String>;
}

#[async_trait]
impl RangeFetch for Client {
    async fn fetch(&mut self, request: RangeRequest) -> Result<RangePage, String> {
        let mut options = GetOptions::new()
            .with_range(request.range_end)
            .with_limit(request.limit);
        if let Some(revision) = request.revision {
            options = options.with_revision(revision);
        }

        let response = self
            .get(request.start, Some(options))
            .await
            .map_err(|e| e.to_string())?;
        Ok(RangePage {
            revision: response.header().map(|h| h.revision()).unwrap_or_default(),
            more: response.more(),
            kvs: response
                .kvs()
                .iter()
                .map(|kv| (kv.key().to_vec(), kv.value().to_vec()))
                .collect(),
        })
    }
}

/// Walks a flat v3 keyspace.
///
/// No directory entries are produced; the hierarchy is inferred from key
/// segments when the entries are written out. Every page after the first
/// is read at the revision of the first, so a walk sees one consistent
/// snapshot of the prefix.
pub struct V3Walker<F = Client> {
    fetcher: F,
    page_size: i64,
    cancellation: Cancellation,
}

/// Position of a walk between two page fetches
struct PageCursor<F> {
    fetcher: F,
    prefix: String,
    next_key: Option<Vec<u8>>,
    range_end: Vec<u8>,
    page_size: i64,
    revision: Option<i64>,
    cancellation: Cancellation,
}

impl V3Walker<Client> {
    pub async fn connect(endpoint: &EtcdEndpoint, options: &WalkerOptions) -> Result<Self, WalkError> {
        let connect_error = |cause: String| WalkError::Connect {
            endpoint: endpoint.url().to_string(),
            cause,
        };

        let connect_options = transport::etcd_connect_options(endpoint.tls(), options.request_timeout)
            .map_err(|e| connect_error(e.to_string()))?;
        let client = Client::connect([endpoint.url()], Some(connect_options))
            .await
            .map_err(|e| connect_error(e.to_string()))?;

        info!(endpoint = %endpoint.url(), "Connected to etcd v3");
        Ok(Self::with_fetcher(client, options))
    }
}

impl<F: RangeFetch> V3Walker<F> {
    /// A walker reading ranges through `fetcher`.
    pub fn with_fetcher(fetcher: F, options: &WalkerOptions) -> Self {
        Self {
            fetcher,
            page_size: options.page_size.max(1),
            cancellation: options.cancellation.clone(),
        }
    }
}

impl<F: RangeFetch> KeyspaceWalker for V3Walker<F> {
    fn walk(&self, prefix: &str) -> WalkStream {
        let cursor = PageCursor {
            fetcher: self.fetcher.clone(),
            prefix: prefix.to_string(),
            next_key: Some(prefix.as_bytes().to_vec()),
            range_end: prefix_range_end(prefix.as_bytes()),
            page_size: self.page_size,
            revision: None,
            cancellation: self.cancellation.clone(),
        };

        stream::try_unfold(cursor, next_page)
            .map_ok(|page| stream::iter(page.into_iter().map(Ok::<KeyEntry, WalkError>)))
            .try_flatten()
            .boxed()
    }

    fn exists<'a>(&'a self, prefix: &'a str) -> BoxFuture<'a, Result<bool, WalkError>> {
        let mut fetcher = self.fetcher.clone();
        let request = RangeRequest {
            start: prefix.as_bytes().to_vec(),
            range_end: prefix_range_end(prefix.as_bytes()),
            limit: 1,
            revision: None,
        };
        async move {
            let page = fetcher.fetch(request).await.map_err(|e| WalkError::read(prefix, e))?;
            Ok::<_, WalkError>(!page.kvs.is_empty())
        }
        .boxed()
    }

    fn protocol(&self) -> ProtocolVersion {
        ProtocolVersion::V3
    }
}

async fn next_page<F: RangeFetch>(
    mut cursor: PageCursor<F>,
) -> Result<Option<(Vec<KeyEntry>, PageCursor<F>)>, WalkError> {
    let Some(start) = cursor.next_key.take() else {
        return Ok(None);
    };
    cursor.cancellation.check()?;

    let request = RangeRequest {
        start,
        range_end: cursor.range_end.clone(),
        limit: cursor.page_size,
        revision: cursor.revision,
    };
    let page = cursor
        .fetcher
        .fetch(request)
        .await
        .map_err(|e| WalkError::read(&cursor.prefix, e))?;

    if cursor.revision.is_none() && page.revision > 0 {
        cursor.revision = Some(page.revision);
    }
    // An empty page ends the walk even when the server claims more
    if page.more {
        if let Some((last, _)) = page.kvs.last() {
            cursor.next_key = Some(key_after(last));
        }
    }
    debug!(prefix = %cursor.prefix, keys = page.kvs.len(), more = page.more, revision = page.revision, "Fetched v3 page");

    let entries = page
        .kvs
        .into_iter()
        .map(|(key, value)| KeyEntry::leaf(decode_key(&key), value))
        .collect();
    Ok(Some((entries, cursor)))
}

/// The key as a string.
///
/// Keys that are not UTF-8 come back percent-escaped behind
/// [`NON_UTF8_KEY_PREFIX`], which is distinct per raw key and is rejected
/// when mapped to a path.
fn decode_key(raw: &[u8]) -> String {
    match std::str::from_utf8(raw) {
        Ok(key) => key.to_string(),
        Err(_) => {
            let mut escaped = String::from(NON_UTF8_KEY_PREFIX);
            for &byte in raw {
                if byte.is_ascii_graphic() && byte != b'%' {
                    escaped.push(char::from(byte));
                } else {
                    escaped.push_str(&format!("%{:02X}", byte));
                }
            }
            warn!(key = %escaped, "Key is not valid UTF-8");
            escaped
        }
    }
}

/// Smallest key strictly greater than `key`.
fn key_after(key: &[u8]) -> Vec<u8> {
    let mut next = key.to_vec();
    next.push(0);
    next
}

/// Exclusive end of the range holding every key that starts with `prefix`.
///
/// Trailing `0xff` bytes are dropped and the last remaining byte is
/// incremented. An empty or all-`0xff` prefix scans to the end of the
/// keyspace, which etcd spells as a single zero byte.
pub(crate) fn prefix_range_end(prefix: &[u8]) -> Vec<u8> {
    let mut end = prefix.to_vec();
    while let Some(&last) = end.last() {
        if last < 0xff {
            if let Some(byte) = end.last_mut() {
                *byte += 1;
            }
            return end;
        }
        end.pop();
    }
    vec![0]
}
