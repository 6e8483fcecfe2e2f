//! etcd v2 walker over the HTTP keys API.

use super::{KeyspaceWalker, WalkError, WalkStream, WalkerOptions};
use crate::cancel::Cancellation;
use crate::transport;
use crate::types::{EtcdEndpoint, KeyEntry, ProtocolVersion};
use futures::future::BoxFuture;
use futures::{stream, FutureExt, StreamExt, TryStreamExt};
use serde::Deserialize;
use tracing::debug;

/// etcd v2 error code for a missing key
const KEY_NOT_FOUND: u64 = 100;

#[derive(Debug, Deserialize)]
struct KeysResponse {
    node: Node,
}

/// A node of a v2 keys response. The root of the keyspace has no key.
#[derive(Debug, Deserialize)]
struct Node {
    #[serde(default)]
    key: Option<String>,
    #[serde(default)]
    value: Option<String>,
    #[serde(default)]
    dir: bool,
    #[serde(default)]
    nodes: Vec<Node>,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    #[serde(rename = "errorCode")]
    error_code: u64,
}

/// Walks a v2 keyspace with one recursive `GET /v2/keys<prefix>`.
///
/// Directories are yielded before their children, depth first, in the
/// order the server returned them.
pub struct V2Walker {
    client: reqwest::Client,
    base_url: String,
    cancellation: Cancellation,
}

impl V2Walker {
    pub fn new(endpoint: &EtcdEndpoint, options: &WalkerOptions) -> Result<Self, WalkError> {
        let client = transport::http_client(endpoint.tls(), options.request_timeout).map_err(|e| {
            WalkError::Connect {
                endpoint: endpoint.url().to_string(),
                cause: e.to_string(),
            }
        })?;

        Ok(Self {
            client,
            base_url: endpoint.url().to_string(),
            cancellation: options.cancellation.clone(),
        })
    }

    fn keys_url(&self, prefix: &str) -> String {
        if prefix.starts_with('/') {
            format!("{}/v2/keys{}", self.base_url, prefix)
        } else {
            format!("{}/v2/keys/{}", self.base_url, prefix)
        }
    }
}

impl KeyspaceWalker for V2Walker {
    fn walk(&self, prefix: &str) -> WalkStream {
        let client = self.client.clone();
        let url = self.keys_url(prefix);
        let prefix = prefix.to_string();
        let cancellation = self.cancellation.clone();

        stream::once(async move {
            cancellation.check()?;
            debug!(url = %url, "Fetching v2 keyspace");

            let mut entries = Vec::new();
            if let Some(root) = fetch_tree(&client, &url, &prefix, true).await? {
                flatten(root, &mut entries);
            }
            debug!(prefix = %prefix, entries = entries.len(), "Fetched v2 keyspace");
            Ok::<_, WalkError>(stream::iter(
                entries.into_iter().map(Ok::<KeyEntry, WalkError>),
            ))
        })
        .try_flatten()
        .boxed()
    }

    /// A single non-recursive `GET`; the subtree is never transferred.
    fn exists<'a>(&'a self, prefix: &'a str) -> BoxFuture<'a, Result<bool, WalkError>> {
        async move {
            self.cancellation.check()?;
            let url = self.keys_url(prefix);
            Ok::<_, WalkError>(fetch_tree(&self.client, &url, prefix, false).await?.is_some())
        }
        .boxed()
    }

    fn protocol(&self) -> ProtocolVersion {
        ProtocolVersion::V2
    }
}

/// `None` when the prefix does not exist. Without `recursive` only the
/// node itself and its direct children come back.
async fn fetch_tree(
    client: &reqwest::Client,
    url: &str,
    prefix: &str,
    recursive: bool,
) -> Result<Option<Node>, WalkError> {
    let mut request = client.get(url);
    if recursive {
        request = request.query(&[("recursive", "true")]);
    }
    let response = request
        .send()
        .await
        .map_err(|e| WalkError::read(prefix, e))?;

    let status = response.status();
    let body = response.bytes().await.map_err(|e| WalkError::read(prefix, e))?;

    if status == reqwest::StatusCode::NOT_FOUND {
        if let Ok(err) = serde_json::from_slice::<ErrorResponse>(&body) {
            if err.error_code == KEY_NOT_FOUND {
                return Ok(None);
            }
        }
    }

    if !status.is_success() {
        return Err(WalkError::read(
            prefix,
            format!("HTTP {}: {}", status, String::from_utf8_lossy(&body)),
        ));
    }

    let parsed: KeysResponse = serde_json::from_slice(&body)
        .map_err(|e| WalkError::read(prefix, format!("malformed v2 response: {}", e)))?;
    Ok(Some(parsed.node))
}

fn flatten(node: Node, out: &mut Vec<KeyEntry>) {
    let Node {
        key,
        value,
        dir,
        nodes,
    } = node;

    match key {
        Some(key) if dir => out.push(KeyEntry::directory(key)),
        Some(key) => out.push(KeyEntry::leaf(key, value.unwrap_or_default())),
        None => {}
    }

    for child in nodes {
        flatten(child, out);
    }
}
