//! # Target Namespace Syncer
//!
//! Copies the latest canonical version of a group into a workload namespace.
//! A target that already holds that version is left untouched, so repeated
//! syncs write nothing. Older materializations in the target are never
//! removed.

use super::{index, naming, SyncedVersion, Version};
use crate::error::{EnvGroupError, Result};
use crate::observability::metrics;
use crate::store::{BoundStore, Scope, StoreError};
use tracing::{debug, info};

/// Materialize the latest version of `group` into `target`
///
/// An empty group name is a no-op and returns `Ok(None)`; workloads with an
/// optional group binding pass one.
///
/// # Errors
///
/// - `Invalid` if `target` is empty
/// - `NotFound` if the group has no version in `canonical`
/// - `DeadlineExceeded` or `Internal` on store failures
pub async fn sync_latest(
    store: &BoundStore<'_>,
    canonical: &str,
    group: &str,
    target: &str,
) -> Result<Option<SyncedVersion>> {
    if group.is_empty() {
        return Ok(None);
    }
    if target.is_empty() {
        return Err(EnvGroupError::Invalid(
            "target namespace must not be empty".to_string(),
        ));
    }

    let latest = index::latest_version(store, canonical, group)
        .await
        .map_err(|e| {
            EnvGroupError::from_store(
                format!("reading latest version of environment group {group}"),
                e,
            )
        })?
        .ok_or_else(|| EnvGroupError::NotFound {
            name: group.to_string(),
            version: 0,
            namespace: canonical.to_string(),
        })?;

    if target == canonical {
        debug!("Target of {} sync is the canonical namespace", group);
        metrics::increment_materializations("unchanged");
        return Ok(Some(synced(&latest, target, false)));
    }

    let selector = naming::version_selector(group, latest.version);
    let scope = Scope::Namespace(target);
    let (plains, secrets) = futures::try_join!(
        store.list_plain(scope, &selector),
        store.list_secret(scope, &selector)
    )
    .map_err(|e| {
        EnvGroupError::from_store(
            format!("checking {target} for environment group {group}"),
            e,
        )
    })?;
    // A plain record alone is a sync that stopped between its two writes
    if !plains.is_empty() && !secrets.is_empty() {
        debug!(
            "Environment group {} version {} already present in {}",
            group, latest.version, target
        );
        metrics::increment_materializations("unchanged");
        return Ok(Some(synced(&latest, target, false)));
    }

    store.ensure_namespace(target).await.map_err(|e| {
        EnvGroupError::from_store(format!("ensuring target namespace {target}"), e)
    })?;

    let labels = naming::version_labels(group, latest.version);
    let plain_created = tolerate_existing(
        store
            .put_plain(
                target,
                &latest.record_name,
                &labels,
                latest.created_at_utc,
                &latest.plain,
            )
            .await,
    )
    .map_err(|e| {
        EnvGroupError::from_store(
            format!("writing plain record {target}/{}", latest.record_name),
            e,
        )
    })?;
    let secret_created = tolerate_existing(
        store
            .put_secret(
                target,
                &latest.record_name,
                &labels,
                latest.created_at_utc,
                &latest.secret,
            )
            .await,
    )
    .map_err(|e| {
        EnvGroupError::from_store(
            format!("writing secret record {target}/{}", latest.record_name),
            e,
        )
    })?;

    let created = plain_created || secret_created;
    metrics::increment_materializations(if created { "created" } else { "unchanged" });
    info!(
        "Synced environment group {} version {} to {}",
        group, latest.version, target
    );
    Ok(Some(synced(&latest, target, created)))
}

/// `AlreadyExists` means a concurrent sync got there first
fn tolerate_existing(
    result: std::result::Result<(), StoreError>,
) -> std::result::Result<bool, StoreError> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.is_already_exists() => Ok(false),
        Err(e) => Err(e),
    }
}

fn synced(version: &Version, target: &str, created: bool) -> SyncedVersion {
    SyncedVersion {
        group: version.name.clone(),
        version: version.version,
        namespace: target.to_string(),
        record_name: version.record_name.clone(),
        created,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::deadline::Deadline;
    use crate::envgroup::writer::{create_next_version, AllocationPolicy};
    use crate::envgroup::EnvironmentGroup;
    use crate::store::memory::InMemoryStore;
    use crate::store::{BackingStore, SecretData};
    use std::collections::BTreeMap;

    const CANONICAL: &str = "porter-env-group";

    async fn seed(store: &InMemoryStore, versions: u64) {
        let bound = BoundStore::new(store, Deadline::none());
        for v in 1..=versions {
            let group = EnvironmentGroup::new("db")
                .with_plain("HOST", format!("pg{v}"))
                .with_secret("PASS", "s3cr3t");
            create_next_version(&bound, CANONICAL, &group, AllocationPolicy::default())
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_empty_group_is_a_no_op() {
        let store = InMemoryStore::new();
        let bound = BoundStore::new(&store, Deadline::none());
        assert_eq!(sync_latest(&bound, CANONICAL, "", "app").await.unwrap(), None);
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_empty_target_is_invalid() {
        let store = InMemoryStore::new();
        let bound = BoundStore::new(&store, Deadline::none());
        let err = sync_latest(&bound, CANONICAL, "db", "").await.unwrap_err();
        assert!(matches!(err, EnvGroupError::Invalid(_)));
        assert_eq!(store.calls(), 0);
    }

    #[tokio::test]
    async fn test_unknown_group_is_not_found() {
        let store = InMemoryStore::new();
        store.ensure_namespace(CANONICAL).await.unwrap();
        let bound = BoundStore::new(&store, Deadline::none());
        let err = sync_latest(&bound, CANONICAL, "db", "app").await.unwrap_err();
        assert!(matches!(err, EnvGroupError::NotFound { version: 0, .. }));
        assert!(!store.has_namespace("app"));
    }

    #[tokio::test]
    async fn test_sync_copies_latest_and_second_call_writes_nothing() {
        let store = InMemoryStore::new();
        seed(&store, 2).await;
        let bound = BoundStore::new(&store, Deadline::none());

        let first = sync_latest(&bound, CANONICAL, "db", "app").await.unwrap().unwrap();
        assert_eq!(first.record_name, "db.2");
        assert!(first.created);
        let plain = store.get_plain("app", "db.2").await.unwrap();
        assert_eq!(plain.data.get("HOST").map(String::as_str), Some("pg2"));
        assert_eq!(plain.labels, naming::version_labels("db", 2));
        let secret = store.get_secret("app", "db.2").await.unwrap();
        assert_eq!(secret.data.get("PASS"), Some(&b"s3cr3t"[..]));

        let writes = store.writes();
        let second = sync_latest(&bound, CANONICAL, "db", "app").await.unwrap().unwrap();
        assert_eq!(second.record_name, "db.2");
        assert!(!second.created);
        assert_eq!(store.writes(), writes);
    }

    #[tokio::test]
    async fn test_older_materialization_is_kept() {
        let store = InMemoryStore::new();
        seed(&store, 1).await;
        let bound = BoundStore::new(&store, Deadline::none());
        sync_latest(&bound, CANONICAL, "db", "app").await.unwrap();

        seed(&store, 1).await;
        let synced = sync_latest(&bound, CANONICAL, "db", "app").await.unwrap().unwrap();

        assert_eq!(synced.version, 2);
        assert!(store.get_plain("app", "db.1").await.is_ok());
        assert!(store.get_plain("app", "db.2").await.is_ok());
    }

    #[tokio::test]
    async fn test_half_written_target_gets_its_secret() {
        let store = InMemoryStore::new();
        seed(&store, 1).await;
        store.ensure_namespace("app").await.unwrap();
        store
            .put_plain(
                "app",
                "db.1",
                &naming::version_labels("db", 1),
                None,
                &BTreeMap::from([("HOST".to_string(), "pg1".to_string())]),
            )
            .await
            .unwrap();

        let bound = BoundStore::new(&store, Deadline::none());
        let synced = sync_latest(&bound, CANONICAL, "db", "app").await.unwrap().unwrap();
        assert!(synced.created);
        let secret = store.get_secret("app", "db.1").await.unwrap();
        assert_eq!(secret.data.get("PASS"), Some(&b"s3cr3t"[..]));
        assert_eq!(secret.labels, naming::version_labels("db", 1));

        let writes = store.writes();
        let again = sync_latest(&bound, CANONICAL, "db", "app").await.unwrap().unwrap();
        assert!(!again.created);
        assert_eq!(store.writes(), writes);
    }

    #[tokio::test]
    async fn test_existing_secret_from_concurrent_sync_counts_as_success() {
        let store = InMemoryStore::new();
        seed(&store, 1).await;
        store.ensure_namespace("app").await.unwrap();
        store
            .put_secret(
                "app",
                "db.1",
                &naming::version_labels("db", 1),
                None,
                &SecretData::new(),
            )
            .await
            .unwrap();

        let bound = BoundStore::new(&store, Deadline::none());
        let synced = sync_latest(&bound, CANONICAL, "db", "app").await.unwrap().unwrap();
        assert!(synced.created);
        let plain = store.get_plain("app", "db.1").await.unwrap();
        assert_eq!(plain.data, BTreeMap::from([("HOST".to_string(), "pg1".to_string())]));
    }
}
