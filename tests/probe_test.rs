// Integration tests for endpoint probing

mod common;

use common::{spawn_v2, spawn_with_version, NAMESPACE};
use etcd_snapshot::config::EtcdTlsConfig;
use etcd_snapshot::discovery::{probe, ProbeError};
use etcd_snapshot::keyspace::{KeyspaceWalker, V2Walker, WalkerOptions};
use etcd_snapshot::ProtocolVersion;
use futures::TryStreamExt;
use std::time::Duration;

const TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
async fn test_probe_detects_v2() {
    let etcd = spawn_v2(&[("/kubernetes.io/namespaces/default", NAMESPACE)]).await;

    let endpoint = probe(&format!("{}/", etcd.url), None, TIMEOUT).await.unwrap();

    assert_eq!(endpoint.protocol(), ProtocolVersion::V2);
    assert!(!endpoint.is_secure());
    assert_eq!(endpoint.url(), etcd.url);
    assert!(endpoint.tls().is_none());
}

#[tokio::test]
async fn test_probe_detects_v3() {
    let etcd = spawn_with_version("3.5.12", &[]).await;
    let endpoint = probe(&etcd.url, None, TIMEOUT).await.unwrap();
    assert_eq!(endpoint.protocol(), ProtocolVersion::V3);
}

#[tokio::test]
async fn test_probe_is_repeatable() {
    let etcd = spawn_v2(&[]).await;
    let first = probe(&etcd.url, None, TIMEOUT).await.unwrap();
    let second = probe(&etcd.url, None, TIMEOUT).await.unwrap();
    assert_eq!(first, second);
}

#[tokio::test]
async fn test_one_walker_serves_repeated_walks() {
    let etcd = spawn_v2(&[("/kubernetes.io/namespaces/default", NAMESPACE)]).await;
    let endpoint = probe(&etcd.url, None, TIMEOUT).await.unwrap();
    let walker = V2Walker::new(&endpoint, &WalkerOptions::default()).unwrap();

    for _ in 0..3 {
        let entries: Vec<_> = walker.walk("/kubernetes.io").try_collect().await.unwrap();
        assert_eq!(entries.len(), 3);
    }
    assert_eq!(etcd.key_requests(), vec!["/kubernetes.io?recursive"; 3]);
}

#[tokio::test]
async fn test_unsupported_server_version() {
    let etcd = spawn_with_version("0.4.9", &[]).await;
    let err = probe(&etcd.url, None, TIMEOUT).await.unwrap_err();
    assert!(matches!(err, ProbeError::UnsupportedVersion { ref version, .. } if version == "0.4.9"));
}

#[tokio::test]
async fn test_unreachable_endpoint() {
    let err = probe("http://127.0.0.1:1", None, TIMEOUT).await.unwrap_err();
    assert!(matches!(err, ProbeError::UnreachableEndpoint { .. }), "{err}");
}

#[tokio::test]
async fn test_tls_material_is_ignored_for_plain_http() {
    let etcd = spawn_v2(&[]).await;
    let tls = EtcdTlsConfig::new("/nonexistent/client.pem", "/nonexistent/client-key.pem", "/nonexistent/ca.pem");

    let endpoint = probe(&etcd.url, Some(&tls), TIMEOUT).await.unwrap();
    assert!(!endpoint.is_secure());
    assert!(endpoint.tls().is_none());
}

#[tokio::test]
async fn test_unreadable_tls_material_is_a_transport_error() {
    let tls = EtcdTlsConfig::new("/nonexistent/client.pem", "/nonexistent/client-key.pem", "/nonexistent/ca.pem");
    let err = probe("https://127.0.0.1:2379", Some(&tls), TIMEOUT).await.unwrap_err();
    assert!(matches!(err, ProbeError::TransportConfig { .. }), "{err}");
}
