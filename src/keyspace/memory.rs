use super::tree::infer_directories;
use super::{KeyspaceWalker, WalkStream};
use crate::types::{KeyEntry, ProtocolVersion};
use futures::{stream, StreamExt};
use std::collections::BTreeMap;

/// Walker over an in-memory keyspace.
///
/// Serves the same entries a real store would: v2 shaped walks include
/// directory entries ahead of their children, v3 shaped walks are flat.
#[derive(Debug, Clone)]
pub struct MemoryWalker {
    protocol: ProtocolVersion,
    entries: BTreeMap<String, Vec<u8>>,
}

impl MemoryWalker {
    pub fn new(protocol: ProtocolVersion) -> Self {
        Self {
            protocol,
            entries: BTreeMap::new(),
        }
    }

    pub fn with_entry(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) {
        self.entries.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn flat(&self, prefix: &str) -> Vec<KeyEntry> {
        self.entries
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| KeyEntry::leaf(key.clone(), value.clone()))
            .collect()
    }

    fn hierarchical(&self, prefix: &str) -> Vec<KeyEntry> {
        let base = prefix.trim_end_matches('/');
        let below = format!("{}/", base);
        let in_scope = |key: &str| base.is_empty() || key == base || key.starts_with(&below);

        let leaves: Vec<(&String, &Vec<u8>)> =
            self.entries.iter().filter(|(key, _)| in_scope(key.as_str())).collect();
        let directories = infer_directories(leaves.iter().map(|(key, _)| key.as_str()));

        let mut entries: Vec<KeyEntry> = directories
            .into_iter()
            .filter(|dir| in_scope(dir.as_str()))
            .map(KeyEntry::directory)
            .chain(leaves.into_iter().map(|(key, value)| KeyEntry::leaf(key.clone(), value.clone())))
            .collect();

        // depth first: a directory sorts before everything below it
        entries.sort_by(|a, b| {
            a.key
                .split('/')
                .cmp(b.key.split('/'))
                .then(b.is_directory.cmp(&a.is_directory))
        });
        entries
    }
}

impl KeyspaceWalker for MemoryWalker {
    fn walk(&self, prefix: &str) -> WalkStream {
        let entries = match self.protocol {
            ProtocolVersion::V2 => self.hierarchical(prefix),
            ProtocolVersion::V3 => self.flat(prefix),
        };
        stream::iter(entries.into_iter().map(Ok)).boxed()
    }

    fn protocol(&self) -> ProtocolVersion {
        self.protocol
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use pretty_assertions::assert_eq;

    fn keyspace(protocol: ProtocolVersion) -> MemoryWalker {
        MemoryWalker::new(protocol)
            .with_entry("/registry/namespaces/default", "ns-default")
            .with_entry("/registry/pods/default/web-0", "pod")
            .with_entry("/registry2/other", "x")
            .with_entry("/openshift.io/builds", "build")
    }

    #[tokio::test]
    async fn test_v3_walk_is_flat_prefix_scan() {
        let walker = keyspace(ProtocolVersion::V3);
        let entries: Vec<KeyEntry> = walker.walk("/registry").try_collect().await.unwrap();

        let keys: Vec<&str> = entries.iter().map(|e| e.key.as_str()).collect();
        assert_eq!(
            keys,
            vec![
                "/registry/namespaces/default",
                "/registry/pods/default/web-0",
                "/registry2/other",
            ]
        );
        assert!(entries.iter().all(|e| !e.is_directory));
    }

    #[tokio::test]
    async fn test_v2_walk_yields_directories_first() {
        let walker = keyspace(ProtocolVersion::V2);
        let entries: Vec<KeyEntry> = walker.walk("/registry").try_collect().await.unwrap();

        assert_eq!(
            entries,
            vec![
                KeyEntry::directory("/registry"),
                KeyEntry::directory("/registry/namespaces"),
                KeyEntry::leaf("/registry/namespaces/default", "ns-default"),
                KeyEntry::directory("/registry/pods"),
                KeyEntry::directory("/registry/pods/default"),
                KeyEntry::leaf("/registry/pods/default/web-0", "pod"),
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_prefix_yields_nothing() {
        let walker = keyspace(ProtocolVersion::V2);
        let entries: Vec<KeyEntry> = walker.walk("/kubernetes.io").try_collect().await.unwrap();
        assert!(entries.is_empty());
    }

    #[tokio::test]
    async fn test_walk_is_restartable() {
        let walker = keyspace(ProtocolVersion::V3);
        let first: Vec<KeyEntry> = walker.walk("/").try_collect().await.unwrap();
        let second: Vec<KeyEntry> = walker.walk("/").try_collect().await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), walker.len());
    }
}
