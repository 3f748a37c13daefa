//! # Deletion Guard
//!
//! Removes every version of a group from every namespace, but only once no
//! workload links to it. Deletion is not atomic: a concurrent reader may see
//! some records gone and others still present.

use super::{index, links, naming, DeletionSummary};
use crate::error::{EnvGroupError, Result};
use crate::observability::metrics;
use crate::store::{BoundStore, Scope, StoreError};
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

/// Delete every plain and secret record of `group` across all namespaces
///
/// # Errors
///
/// - `Invalid` if `group` is empty
/// - `Precondition` with the number of linked workloads if any remain
/// - `DeadlineExceeded` or `Internal` on store failures
pub async fn delete_group(
    store: &BoundStore<'_>,
    canonical: &str,
    group: &str,
) -> Result<DeletionSummary> {
    naming::validate_group_name(group)?;

    let versions = index::list_versions(store, canonical, group)
        .await
        .map_err(|e| {
            EnvGroupError::from_store(format!("listing versions of environment group {group}"), e)
        })?;

    let linked = links::linked_workloads(store, group).await?;
    if !linked.is_empty() {
        metrics::increment_deletions_blocked();
        warn!(
            "Refusing to delete environment group {}: {} linked workload(s)",
            group,
            linked.len()
        );
        return Err(EnvGroupError::Precondition {
            name: group.to_string(),
            count: linked.len(),
        });
    }

    let selector = naming::group_selector(group);
    let plains = store
        .list_plain(Scope::All, &selector)
        .await
        .map_err(|e| {
            EnvGroupError::from_store(format!("listing records of environment group {group}"), e)
        })?;

    let mut removed: BTreeSet<(String, String)> = BTreeSet::new();
    let mut records_deleted = 0;
    for plain in &plains {
        records_deleted += delete_pair(store, &plain.namespace, &plain.name).await?;
        removed.insert((plain.namespace.clone(), plain.name.clone()));
    }

    // Secrets whose plain partner never got written or was removed by hand
    let secrets = store
        .list_secret(Scope::All, &selector)
        .await
        .map_err(|e| {
            EnvGroupError::from_store(format!("listing secrets of environment group {group}"), e)
        })?;
    for secret in secrets {
        if removed.contains(&(secret.namespace.clone(), secret.name.clone())) {
            continue;
        }
        debug!(
            "Deleting orphan secret record {}/{}",
            secret.namespace, secret.name
        );
        if deleted(store.delete_secret(&secret.namespace, &secret.name).await)
            .map_err(|e| delete_error(&secret.namespace, &secret.name, e))?
        {
            records_deleted += 1;
        }
    }

    info!(
        "Deleted environment group {} ({} canonical version(s), {} record(s))",
        group,
        versions.len(),
        records_deleted
    );
    Ok(DeletionSummary {
        canonical_versions: versions.len(),
        records_deleted,
    })
}

async fn delete_pair(store: &BoundStore<'_>, namespace: &str, name: &str) -> Result<usize> {
    let mut count = 0;
    if deleted(store.delete_plain(namespace, name).await)
        .map_err(|e| delete_error(namespace, name, e))?
    {
        count += 1;
    }
    if deleted(store.delete_secret(namespace, name).await)
        .map_err(|e| delete_error(namespace, name, e))?
    {
        count += 1;
    }
    Ok(count)
}

/// `NotFound` on delete is success
fn deleted(result: std::result::Result<(), StoreError>) -> std::result::Result<bool, StoreError> {
    match result {
        Ok(()) => Ok(true),
        Err(e) if e.is_not_found() => Ok(false),
        Err(e) => Err(e),
    }
}

fn delete_error(namespace: &str, name: &str, e: StoreError) -> EnvGroupError {
    EnvGroupError::from_store(format!("deleting {namespace}/{name}"), e)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::LABEL_LINKED_GROUP;
    use crate::deadline::Deadline;
    use crate::envgroup::sync::sync_latest;
    use crate::envgroup::writer::{create_next_version, AllocationPolicy};
    use crate::envgroup::EnvironmentGroup;
    use crate::store::memory::InMemoryStore;
    use crate::store::{BackingStore, Labels, SecretData, Workload, WorkloadKind};

    const CANONICAL: &str = "porter-env-group";

    async fn seed(store: &InMemoryStore, group: &str, versions: u64) {
        let bound = BoundStore::new(store, Deadline::none());
        for _ in 0..versions {
            create_next_version(
                &bound,
                CANONICAL,
                &EnvironmentGroup::new(group).with_secret("K", "v"),
                AllocationPolicy::default(),
            )
            .await
            .unwrap();
        }
    }

    fn linked_service(ns: &str, name: &str, link: &str) -> Workload {
        Workload {
            kind: WorkloadKind::Service,
            name: name.to_string(),
            namespace: ns.to_string(),
            labels: Labels::from([(LABEL_LINKED_GROUP.to_string(), link.to_string())]),
        }
    }

    #[tokio::test]
    async fn test_linked_group_is_not_deleted() {
        let store = InMemoryStore::new();
        seed(&store, "db", 2).await;
        store.upsert_workload(linked_service("app", "web", "cache,db"));
        store.upsert_workload(linked_service("app", "api", "db"));

        let bound = BoundStore::new(&store, Deadline::none());
        let err = delete_group(&bound, CANONICAL, "db").await.unwrap_err();

        assert!(matches!(err, EnvGroupError::Precondition { count: 2, .. }));
        assert!(store.get_plain(CANONICAL, "db.1").await.is_ok());
    }

    #[tokio::test]
    async fn test_deletes_every_namespace_and_leaves_other_groups() {
        let store = InMemoryStore::new();
        seed(&store, "db", 2).await;
        seed(&store, "web", 1).await;
        let bound = BoundStore::new(&store, Deadline::none());
        sync_latest(&bound, CANONICAL, "db", "app").await.unwrap();
        // Dangling link to another group does not block
        store.upsert_workload(linked_service("app", "web", "dbx"));

        let summary = delete_group(&bound, CANONICAL, "db").await.unwrap();

        assert_eq!(summary.canonical_versions, 2);
        assert_eq!(summary.records_deleted, 6);
        assert!(store.get_plain(CANONICAL, "db.1").await.unwrap_err().is_not_found());
        assert!(store.get_secret("app", "db.2").await.unwrap_err().is_not_found());
        assert!(store.get_plain(CANONICAL, "web.1").await.is_ok());
    }

    #[tokio::test]
    async fn test_orphan_secrets_are_deleted() {
        let store = InMemoryStore::new();
        store.ensure_namespace("app").await.unwrap();
        store
            .put_secret(
                "app",
                "db.7",
                &naming::version_labels("db", 7),
                None,
                &SecretData::new(),
            )
            .await
            .unwrap();

        let bound = BoundStore::new(&store, Deadline::none());
        let summary = delete_group(&bound, CANONICAL, "db").await.unwrap();

        assert_eq!(summary.canonical_versions, 0);
        assert_eq!(summary.records_deleted, 1);
        assert!(store.get_secret("app", "db.7").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_deleting_absent_group_succeeds() {
        let store = InMemoryStore::new();
        let bound = BoundStore::new(&store, Deadline::none());
        let summary = delete_group(&bound, CANONICAL, "db").await.unwrap();
        assert_eq!(summary, DeletionSummary::default());
    }
}
