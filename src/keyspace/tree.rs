//! Directory inference for flat keyspaces.
//!
//! etcd v3 has no directory nodes. The hierarchy is recovered by splitting
//! keys on `/` and treating every proper prefix as an implicit directory.

use std::collections::BTreeSet;

/// Proper `/`-prefixes of `key`, shortest first.
///
/// `/a/b/c` yields `/a` and `/a/b`. The root itself is never yielded.
pub fn implied_directories(key: &str) -> impl Iterator<Item = &str> + '_ {
    key.match_indices('/')
        .map(|(idx, _)| idx)
        .filter(|&idx| idx > 0)
        .map(move |idx| &key[..idx])
}

/// Every implicit directory of a set of keys.
pub fn infer_directories<'a, I>(keys: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = &'a str>,
{
    keys.into_iter()
        .flat_map(|key| implied_directories(key))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_implied_directories() {
        let dirs: Vec<&str> = implied_directories("/registry/namespaces/default").collect();
        assert_eq!(dirs, vec!["/registry", "/registry/namespaces"]);

        assert_eq!(implied_directories("/registry").count(), 0);
        assert_eq!(implied_directories("/").count(), 0);

        let dirs: Vec<&str> = implied_directories("/a//b").collect();
        assert_eq!(dirs, vec!["/a", "/a/"]);
    }

    #[test]
    fn test_infer_directories_deduplicates() {
        let keys = [
            "/registry/pods/default/web-0",
            "/registry/pods/default/web-1",
            "/registry/namespaces/default",
        ];
        let dirs: Vec<String> = infer_directories(keys).into_iter().collect();
        assert_eq!(
            dirs,
            vec![
                "/registry",
                "/registry/namespaces",
                "/registry/pods",
                "/registry/pods/default",
            ]
        );
    }
}
