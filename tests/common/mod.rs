// Canned etcd v2 server for integration tests
// Answers /version and GETs on /v2/keys from a fixed keyspace

#![allow(dead_code)]

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{json, Value};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const NAMESPACE: &str = r#"{"kind":"Namespace","apiVersion":"v1"}"#;
pub const BUILD: &str = r#"{"kind":"Build","apiVersion":"v1"}"#;

/// A running fake etcd. Stops when dropped.
pub struct CannedEtcd {
    pub url: String,
    keyspace: Arc<Keyspace>,
    handle: JoinHandle<()>,
}

impl CannedEtcd {
    /// Every keys request served so far, as `<key>` or `<key>?recursive`.
    pub fn key_requests(&self) -> Vec<String> {
        self.keyspace.requests.lock().unwrap().clone()
    }
}

impl Drop for CannedEtcd {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

struct Keyspace {
    server_version: String,
    leaves: BTreeMap<String, String>,
    requests: Mutex<Vec<String>>,
}

/// Start an etcd 2.3 lookalike serving `entries` as leaf keys.
pub async fn spawn_v2(entries: &[(&str, &str)]) -> CannedEtcd {
    spawn_with_version("2.3.8", entries).await
}

pub async fn spawn_with_version(server_version: &str, entries: &[(&str, &str)]) -> CannedEtcd {
    let keyspace = Arc::new(Keyspace {
        server_version: server_version.to_string(),
        leaves: entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect(),
        requests: Mutex::new(Vec::new()),
    });

    let app = Router::new()
        .route("/version", get(version))
        .route("/v2/keys/{*key}", get(keys))
        .with_state(keyspace.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let url = format!("http://{}", listener.local_addr().unwrap());

    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    CannedEtcd { url, keyspace, handle }
}

async fn version(State(keyspace): State<Arc<Keyspace>>) -> Json<Value> {
    Json(json!({"etcdserver": keyspace.server_version, "etcdcluster": "2.3.0"}))
}

async fn keys(
    State(keyspace): State<Arc<Keyspace>>,
    Path(key): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> (StatusCode, Json<Value>) {
    let prefix = format!("/{}", key.trim_matches('/'));
    let prefix = if prefix == "/" { String::new() } else { prefix };
    let recursive = params.get("recursive").is_some_and(|v| v == "true");
    keyspace.requests.lock().unwrap().push(if recursive {
        format!("{}?recursive", prefix)
    } else {
        prefix.clone()
    });

    match build_node(&prefix, &keyspace.leaves) {
        Some(mut node) => {
            if !recursive {
                strip_grandchildren(&mut node);
            }
            (StatusCode::OK, Json(json!({"action": "get", "node": node})))
        }
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({"errorCode": 100, "message": "Key not found", "cause": prefix, "index": 7})),
        ),
    }
}

/// A non-recursive v2 GET lists direct children only.
fn strip_grandchildren(node: &mut Value) {
    if let Some(children) = node.get_mut("nodes").and_then(Value::as_array_mut) {
        for child in children {
            if let Some(child) = child.as_object_mut() {
                child.remove("nodes");
            }
        }
    }
}

/// The v2 node for `key`, nesting every leaf below it.
fn build_node(key: &str, leaves: &BTreeMap<String, String>) -> Option<Value> {
    if let Some(value) = leaves.get(key) {
        return Some(json!({"key": key, "value": value, "modifiedIndex": 4, "createdIndex": 4}));
    }

    let below = format!("{}/", key);
    let children: BTreeSet<String> = leaves
        .keys()
        .filter_map(|leaf| leaf.strip_prefix(&below))
        .filter_map(|rest| rest.split('/').next())
        .map(|name| format!("{}{}", below, name))
        .collect();
    if children.is_empty() {
        return None;
    }

    let nodes: Vec<Value> = children
        .iter()
        .filter_map(|child| build_node(child, leaves))
        .collect();
    Some(json!({"key": key, "dir": true, "nodes": nodes, "modifiedIndex": 3, "createdIndex": 3}))
}

/// Contents of the first archive entry whose path ends with `suffix`.
pub fn read_archive_entry(archive: &std::path::Path, suffix: &str) -> Option<Vec<u8>> {
    use std::io::Read;

    let file = std::fs::File::open(archive).unwrap();
    let mut tar = tar::Archive::new(flate2::read::GzDecoder::new(file));
    for entry in tar.entries().unwrap() {
        let mut entry = entry.unwrap();
        let path = entry.path().unwrap().to_string_lossy().into_owned();
        if path.ends_with(suffix) {
            let mut body = Vec::new();
            entry.read_to_end(&mut body).unwrap();
            return Some(body);
        }
    }
    None
}

/// Paths of every archive entry.
pub fn archive_paths(archive: &std::path::Path) -> Vec<String> {
    let file = std::fs::File::open(archive).unwrap();
    let mut tar = tar::Archive::new(flate2::read::GzDecoder::new(file));
    tar.entries()
        .unwrap()
        .map(|entry| entry.unwrap().path().unwrap().to_string_lossy().into_owned())
        .collect()
}
