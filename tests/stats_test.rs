// Integration tests for keyspace statistics

mod common;

use common::{spawn_v2, BUILD, NAMESPACE};
use etcd_snapshot::discovery::{count, count_keys_for, probe};
use etcd_snapshot::keyspace::{MemoryWalker, WalkerOptions};
use etcd_snapshot::{KubernetesDistro, ProtocolVersion, StatsResult};
use pretty_assertions::assert_eq;
use std::time::Duration;

#[tokio::test]
async fn test_v2_counts_leaves_and_directories() {
    let etcd = spawn_v2(&[
        ("/kubernetes.io/namespaces/default", "12345"),
        ("/kubernetes.io/namespaces/kube-system", "123"),
        ("/kubernetes.io/pods/default/web", "xy"),
    ])
    .await;

    let endpoint = probe(&etcd.url, None, Duration::from_secs(5)).await.unwrap();
    let stats = count_keys_for(&endpoint, KubernetesDistro::Vanilla, &WalkerOptions::default())
        .await
        .unwrap();

    // /kubernetes.io, /namespaces, /pods and /pods/default are directories
    assert_eq!(stats.directory_count, 4);
    assert_eq!(stats.leaf_count(), 3);
    assert_eq!(stats.key_count, 7);
    assert_eq!(stats.total_bytes, 10);
}

#[tokio::test]
async fn test_v2_absent_openshift_namespace_is_zero() {
    let etcd = spawn_v2(&[("/kubernetes.io/namespaces/default", NAMESPACE)]).await;

    let endpoint = probe(&etcd.url, None, Duration::from_secs(5)).await.unwrap();
    let stats = count_keys_for(&endpoint, KubernetesDistro::OpenShift, &WalkerOptions::default())
        .await
        .unwrap();

    assert_eq!(stats, StatsResult::default());
    assert!(stats.is_empty());
}

#[tokio::test]
async fn test_v2_openshift_namespace_is_counted_separately() {
    let etcd = spawn_v2(&[
        ("/kubernetes.io/namespaces/default", NAMESPACE),
        ("/openshift.io/builds", BUILD),
    ])
    .await;

    let endpoint = probe(&etcd.url, None, Duration::from_secs(5)).await.unwrap();
    let stats = count_keys_for(&endpoint, KubernetesDistro::OpenShift, &WalkerOptions::default())
        .await
        .unwrap();

    assert_eq!(stats.leaf_count(), 1);
    assert_eq!(stats.total_bytes, BUILD.len() as u64);
}

#[tokio::test]
async fn test_v3_round_trip_matches_populated_keys() {
    let populated = [
        ("/registry/namespaces/default", NAMESPACE),
        ("/registry/namespaces/kube-system", NAMESPACE),
        ("/registry/services/specs/default/kubernetes", "{}"),
    ];
    let mut walker = MemoryWalker::new(ProtocolVersion::V3);
    for (key, value) in populated {
        walker.insert(key, value);
    }
    walker.insert("/unrelated/key", "ignored");

    let stats = count(&walker, KubernetesDistro::Vanilla).await.unwrap();

    assert_eq!(stats.key_count, populated.len() as u64);
    assert_eq!(
        stats.total_bytes,
        populated.iter().map(|(_, v)| v.len() as u64).sum::<u64>()
    );
    assert_eq!(stats.directory_count, 0);
}

#[tokio::test]
async fn test_v3_absent_namespace_is_zero() {
    let walker = MemoryWalker::new(ProtocolVersion::V3).with_entry("/registry/namespaces/default", NAMESPACE);
    let stats = count(&walker, KubernetesDistro::OpenShift).await.unwrap();
    assert_eq!((stats.key_count, stats.total_bytes), (0, 0));
}
