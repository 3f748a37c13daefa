//! # Version Index
//!
//! Reads version history out of a namespace by label. Records with missing or
//! unparseable version labels are skipped rather than failing the read, and a
//! plain record without its secret partner yields a version with an empty
//! secret map.

use super::naming::{self, group_of, version_of};
use super::Version;
use crate::store::{BoundStore, PlainRecord, Scope, SecretData, SecretRecord, StoreError};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Highest version of `group` in `namespace`, or 0 if there is none
///
/// # Errors
///
/// Propagates store failures.
pub async fn current_max_version(
    store: &BoundStore<'_>,
    namespace: &str,
    group: &str,
) -> Result<u64, StoreError> {
    let records = store
        .list_plain(Scope::Namespace(namespace), &naming::group_selector(group))
        .await?;
    Ok(records
        .iter()
        .filter_map(|r| version_of(&r.labels))
        .max()
        .unwrap_or(0))
}

/// Every readable version of `group` in `namespace`, oldest first
///
/// # Errors
///
/// Propagates store failures.
pub async fn list_versions(
    store: &BoundStore<'_>,
    namespace: &str,
    group: &str,
) -> Result<Vec<Version>, StoreError> {
    let selector = naming::group_selector(group);
    let scope = Scope::Namespace(namespace);
    let (plains, secrets) = futures::try_join!(
        store.list_plain(scope, &selector),
        store.list_secret(scope, &selector)
    )?;
    Ok(join(plains, secrets))
}

/// One version of `group` in `namespace`, found by label
///
/// # Errors
///
/// Propagates store failures. A missing secret record is not an error.
pub async fn read_version(
    store: &BoundStore<'_>,
    namespace: &str,
    group: &str,
    version: u64,
) -> Result<Option<Version>, StoreError> {
    let plains = store
        .list_plain(
            Scope::Namespace(namespace),
            &naming::version_selector(group, version),
        )
        .await?;
    match first_by_name(plains) {
        Some(plain) => Ok(Some(with_companion_secret(store, plain).await?)),
        None => Ok(None),
    }
}

/// Highest version of `group` in `namespace`, if any
///
/// # Errors
///
/// Propagates store failures. A missing secret record is not an error.
pub async fn latest_version(
    store: &BoundStore<'_>,
    namespace: &str,
    group: &str,
) -> Result<Option<Version>, StoreError> {
    let plains = store
        .list_plain(Scope::Namespace(namespace), &naming::group_selector(group))
        .await?;
    let latest = plains
        .into_iter()
        .filter_map(|r| version_of(&r.labels).map(|v| (v, r)))
        // Ties on version break towards the lexically first record name
        .max_by(|(va, ra), (vb, rb)| va.cmp(vb).then_with(|| rb.name.cmp(&ra.name)))
        .map(|(_, r)| r);
    match latest {
        Some(plain) => Ok(Some(with_companion_secret(store, plain).await?)),
        None => Ok(None),
    }
}

/// The latest version of every group in `namespace`, ordered by group name
///
/// # Errors
///
/// Propagates store failures.
pub async fn latest_per_group(
    store: &BoundStore<'_>,
    namespace: &str,
) -> Result<Vec<Version>, StoreError> {
    let selector = naming::any_group_selector();
    let scope = Scope::Namespace(namespace);
    let (plains, secrets) = futures::try_join!(
        store.list_plain(scope, &selector),
        store.list_secret(scope, &selector)
    )?;

    let mut latest: BTreeMap<String, Version> = BTreeMap::new();
    for version in join(plains, secrets) {
        match latest.get(&version.name) {
            Some(current) if current.version >= version.version => {}
            _ => {
                latest.insert(version.name.clone(), version);
            }
        }
    }
    Ok(latest.into_values().collect())
}

/// Pair plain and secret records on (group, version) labels
fn join(mut plains: Vec<PlainRecord>, mut secrets: Vec<SecretRecord>) -> Vec<Version> {
    let mut secrets_by_version: BTreeMap<(String, u64), SecretRecord> = BTreeMap::new();
    secrets.sort_by(|a, b| a.name.cmp(&b.name));
    for secret in secrets {
        let Some(key) = label_key(&secret.labels) else {
            continue;
        };
        secrets_by_version.entry(key).or_insert(secret);
    }

    plains.sort_by(|a, b| a.name.cmp(&b.name));
    let mut versions: BTreeMap<(String, u64), Version> = BTreeMap::new();
    for plain in plains {
        let Some(key) = label_key(&plain.labels) else {
            debug!(
                "Skipping record {}/{} with incomplete environment group labels",
                plain.namespace, plain.name
            );
            continue;
        };
        if versions.contains_key(&key) {
            warn!(
                "Duplicate record {}/{} for environment group {} version {}, keeping the first",
                plain.namespace, plain.name, key.0, key.1
            );
            continue;
        }
        let secret = secrets_by_version
            .remove(&key)
            .map(|s| s.data)
            .unwrap_or_default();
        versions.insert(key.clone(), assemble(plain, key.1, secret));
    }
    versions.into_values().collect()
}

fn label_key(labels: &crate::store::Labels) -> Option<(String, u64)> {
    Some((group_of(labels)?.to_string(), version_of(labels)?))
}

fn first_by_name(mut plains: Vec<PlainRecord>) -> Option<PlainRecord> {
    plains.sort_by(|a, b| a.name.cmp(&b.name));
    plains.into_iter().next()
}

/// Attach the secret record carrying the plain record's group and version
/// labels, lexically first by name when several match
async fn with_companion_secret(
    store: &BoundStore<'_>,
    plain: PlainRecord,
) -> Result<Version, StoreError> {
    let Some((group, version)) = label_key(&plain.labels) else {
        return Ok(assemble(plain, 0, SecretData::new()));
    };
    let secrets = store
        .list_secret(
            Scope::Namespace(&plain.namespace),
            &naming::version_selector(&group, version),
        )
        .await?;
    let secret = match secrets.into_iter().min_by(|a, b| a.name.cmp(&b.name)) {
        Some(secret) => secret.data,
        None => {
            debug!(
                "No secret record for environment group {} version {} in {}, returning an empty secret map",
                group, version, plain.namespace
            );
            SecretData::new()
        }
    };
    Ok(assemble(plain, version, secret))
}

fn assemble(plain: PlainRecord, version: u64, secret: SecretData) -> Version {
    Version {
        name: group_of(&plain.labels).unwrap_or_default().to_string(),
        version,
        namespace: plain.namespace,
        record_name: plain.name,
        plain: plain.data,
        secret,
        created_at_utc: plain.created_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deadline::Deadline;
    use crate::store::memory::InMemoryStore;
    use crate::store::BackingStore;
    use crate::store::Labels;

    const NS: &str = "porter-env-group";

    async fn put_version(store: &InMemoryStore, group: &str, version: u64, with_secret: bool) {
        let name = naming::record_name(group, version);
        let labels = naming::version_labels(group, version);
        let plain = BTreeMap::from([("V".to_string(), version.to_string())]);
        store
            .put_plain(NS, &name, &labels, None, &plain)
            .await
            .unwrap();
        if with_secret {
            let secret = SecretData::new().with("S", format!("secret-{version}"));
            store
                .put_secret(NS, &name, &labels, None, &secret)
                .await
                .unwrap();
        }
    }

    async fn seeded() -> InMemoryStore {
        let store = InMemoryStore::new();
        store.ensure_namespace(NS).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_max_version_is_zero_for_unknown_group() {
        let store = seeded().await;
        let bound = BoundStore::new(&store, Deadline::none());
        assert_eq!(current_max_version(&bound, NS, "db").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_max_version_skips_unparseable_labels() {
        let store = seeded().await;
        put_version(&store, "db", 1, true).await;
        put_version(&store, "db", 2, true).await;

        let mut broken = naming::version_labels("db", 9);
        broken.insert(crate::constants::LABEL_GROUP_VERSION.to_string(), "nine".to_string());
        store
            .put_plain(NS, "db.nine", &broken, None, &BTreeMap::new())
            .await
            .unwrap();

        let mut unlabelled = Labels::new();
        unlabelled.insert(crate::constants::LABEL_GROUP_NAME.to_string(), "db".to_string());
        store
            .put_plain(NS, "db.x", &unlabelled, None, &BTreeMap::new())
            .await
            .unwrap();

        let bound = BoundStore::new(&store, Deadline::none());
        assert_eq!(current_max_version(&bound, NS, "db").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_list_versions_joins_and_tolerates_missing_secret() {
        let store = seeded().await;
        put_version(&store, "db", 1, true).await;
        put_version(&store, "db", 2, false).await;
        put_version(&store, "web", 1, true).await;

        let bound = BoundStore::new(&store, Deadline::none());
        let versions = list_versions(&bound, NS, "db").await.unwrap();

        assert_eq!(versions.len(), 2);
        assert_eq!(versions[0].version, 1);
        assert_eq!(versions[0].secret.get("S"), Some(&b"secret-1"[..]));
        assert_eq!(versions[1].version, 2);
        assert!(versions[1].secret.is_empty());
        assert_eq!(versions[1].plain.get("V").map(String::as_str), Some("2"));
    }

    #[tokio::test]
    async fn test_latest_version_reads_companion_secret() {
        let store = seeded().await;
        put_version(&store, "db", 1, true).await;
        put_version(&store, "db", 10, true).await;
        put_version(&store, "db", 2, true).await;

        let bound = BoundStore::new(&store, Deadline::none());
        let latest = latest_version(&bound, NS, "db").await.unwrap().unwrap();
        // Numeric, not lexical, ordering
        assert_eq!(latest.version, 10);
        assert_eq!(latest.record_name, "db.10");
        assert_eq!(latest.secret.get("S"), Some(&b"secret-10"[..]));
    }

    #[tokio::test]
    async fn test_read_version_ignores_mislabelled_secret() {
        let store = seeded().await;
        put_version(&store, "db", 1, false).await;
        store
            .put_secret(
                NS,
                "db.1",
                &naming::version_labels("other", 1),
                None,
                &SecretData::new().with("S", "wrong"),
            )
            .await
            .unwrap();

        let bound = BoundStore::new(&store, Deadline::none());
        let version = read_version(&bound, NS, "db", 1).await.unwrap().unwrap();
        assert!(version.secret.is_empty());
        assert!(read_version(&bound, NS, "db", 2).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_secret_paired_by_labels_not_name() {
        let store = seeded().await;
        let labels = naming::version_labels("db", 1);
        store
            .put_plain(NS, "db-plain-1", &labels, None, &BTreeMap::new())
            .await
            .unwrap();
        store
            .put_secret(NS, "db-secret-1", &labels, None, &SecretData::new().with("PASS", "pw"))
            .await
            .unwrap();

        let bound = BoundStore::new(&store, Deadline::none());
        let history = list_versions(&bound, NS, "db").await.unwrap();
        let latest = latest_version(&bound, NS, "db").await.unwrap().unwrap();
        let read = read_version(&bound, NS, "db", 1).await.unwrap().unwrap();

        assert_eq!(history[0].secret.get("PASS"), Some(&b"pw"[..]));
        assert_eq!(latest.secret, history[0].secret);
        assert_eq!(read.secret, history[0].secret);
        assert_eq!(read.record_name, "db-plain-1");
    }

    #[tokio::test]
    async fn test_latest_per_group_picks_highest_version() {
        let store = seeded().await;
        put_version(&store, "db", 1, true).await;
        put_version(&store, "db", 2, true).await;
        put_version(&store, "web", 1, false).await;

        let bound = BoundStore::new(&store, Deadline::none());
        let latest = latest_per_group(&bound, NS).await.unwrap();
        let summary: Vec<(&str, u64)> = latest
            .iter()
            .map(|v| (v.name.as_str(), v.version))
            .collect();
        assert_eq!(summary, vec![("db", 2), ("web", 1)]);
    }
}
