//! # Reverse Link Indexer
//!
//! Workloads declare the groups they consume in the `linkedEnvironmentGroup`
//! label as a comma-separated list. Label values cannot hold sets, so the
//! list is decoded here and matched element by element.

use super::{naming, LinkedWorkload};
use crate::constants::{LABEL_LINKED_GROUP, LINKED_GROUP_SEPARATOR};
use crate::error::{EnvGroupError, Result};
use crate::store::BoundStore;
use std::collections::BTreeSet;
use tracing::debug;

/// Whether a link label value names `group` as one of its elements
#[must_use]
pub fn links_to(value: &str, group: &str) -> bool {
    value
        .split(LINKED_GROUP_SEPARATOR)
        .any(|element| element == group)
}

/// Services and scheduled jobs linked to `group`, de-duplicated and ordered
/// by (name, namespace)
///
/// # Errors
///
/// - `Invalid` if `group` is empty
/// - `DeadlineExceeded` or `Internal` on store failures
pub async fn linked_workloads(store: &BoundStore<'_>, group: &str) -> Result<Vec<LinkedWorkload>> {
    naming::validate_group_name(group)?;

    let workloads = store
        .list_workloads(&naming::linked_selector())
        .await
        .map_err(|e| {
            EnvGroupError::from_store(format!("listing workloads linked to {group}"), e)
        })?;

    let linked: BTreeSet<LinkedWorkload> = workloads
        .into_iter()
        .filter(|w| {
            w.labels
                .get(LABEL_LINKED_GROUP)
                .is_some_and(|value| links_to(value, group))
        })
        .map(|w| LinkedWorkload {
            name: w.name,
            namespace: w.namespace,
        })
        .collect();

    debug!(
        "Found {} workload(s) linked to environment group {}",
        linked.len(),
        group
    );
    Ok(linked.into_iter().collect())
}
