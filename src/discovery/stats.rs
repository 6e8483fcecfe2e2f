//! Key count and byte size of a distro's namespace.

use crate::keyspace::{self, KeyspaceWalker, WalkError, WalkerOptions};
use crate::types::{EtcdEndpoint, KubernetesDistro, StatsResult};
use futures::TryStreamExt;
use tracing::{debug, instrument};

/// Totals for one prefix. A missing prefix gives an empty result.
pub async fn count_prefix(walker: &dyn KeyspaceWalker, prefix: &str) -> Result<StatsResult, WalkError> {
    walker
        .walk(prefix)
        .try_fold(StatsResult::default(), |mut stats, entry| async move {
            stats.record(&entry);
            Ok(stats)
        })
        .await
}

/// Totals over every prefix holding `distro` specific keys.
pub async fn count(walker: &dyn KeyspaceWalker, distro: KubernetesDistro) -> Result<StatsResult, WalkError> {
    let mut total = StatsResult::default();
    for prefix in distro.stats_prefixes(walker.protocol()) {
        let stats = count_prefix(walker, prefix).await?;
        debug!(prefix, keys = stats.key_count, bytes = stats.total_bytes, "Counted prefix");
        total += stats;
    }
    Ok(total)
}

/// Connect to a probed endpoint and count `distro`'s keys.
#[instrument(skip(endpoint, options), fields(endpoint = %endpoint.url()))]
pub async fn count_keys_for(
    endpoint: &EtcdEndpoint,
    distro: KubernetesDistro,
    options: &WalkerOptions,
) -> Result<StatsResult, WalkError> {
    let walker = keyspace::connect(endpoint, options).await?;
    count(walker.as_ref(), distro).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keyspace::MemoryWalker;
    use crate::types::ProtocolVersion;

    #[tokio::test]
    async fn test_count_v3_leaves() {
        let walker = MemoryWalker::new(ProtocolVersion::V3)
            .with_entry("/registry/namespaces/default", "12345")
            .with_entry("/registry/namespaces/kube-system", "123")
            .with_entry("/openshift.io/builds/b1", "xy");

        let stats = count(&walker, KubernetesDistro::Vanilla).await.unwrap();
        assert_eq!(stats.key_count, 2);
        assert_eq!(stats.total_bytes, 8);

        let stats = count(&walker, KubernetesDistro::OpenShift).await.unwrap();
        assert_eq!(stats.key_count, 1);
        assert_eq!(stats.total_bytes, 2);
    }

    #[tokio::test]
    async fn test_directories_count_without_bytes() {
        let walker = MemoryWalker::new(ProtocolVersion::V2)
            .with_entry("/kubernetes.io/namespaces/default", "12345");

        let stats = count(&walker, KubernetesDistro::Vanilla).await.unwrap();
        assert_eq!(stats.key_count, 3);
        assert_eq!(stats.directory_count, 2);
        assert_eq!(stats.leaf_count(), 1);
        assert_eq!(stats.total_bytes, 5);
    }

    #[tokio::test]
    async fn test_absent_namespace_is_zero() {
        let walker = MemoryWalker::new(ProtocolVersion::V3).with_entry("/registry/a", "1");
        let stats = count(&walker, KubernetesDistro::OpenShift).await.unwrap();
        assert_eq!(stats, StatsResult::default());
    }
}
