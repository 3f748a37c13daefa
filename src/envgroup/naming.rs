//! # Naming & Labeling
//!
//! Record names are `<group>.<version>` and exist for human inspection.
//! Every lookup goes through the labels built here, so the naming scheme can
//! change without breaking readers.

use crate::constants::{LABEL_GROUP_NAME, LABEL_GROUP_VERSION, LABEL_LINKED_GROUP};
use crate::error::{EnvGroupError, Result};
use crate::store::{LabelSelector, Labels};

#[must_use]
pub fn record_name(group: &str, version: u64) -> String {
    format!("{group}.{version}")
}

/// The only constraint the engine enforces; the store may add its own
///
/// # Errors
///
/// Returns `Invalid` if `name` is empty.
pub fn validate_group_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(EnvGroupError::Invalid(
            "environment group name must not be empty".to_string(),
        ));
    }
    Ok(())
}

/// Labels set on both records of a version
#[must_use]
pub fn version_labels(group: &str, version: u64) -> Labels {
    Labels::from([
        (LABEL_GROUP_NAME.to_string(), group.to_string()),
        (LABEL_GROUP_VERSION.to_string(), version.to_string()),
    ])
}

/// Every record of one group
#[must_use]
pub fn group_selector(group: &str) -> LabelSelector {
    LabelSelector::new().eq(LABEL_GROUP_NAME, group)
}

/// The records of one version of one group
#[must_use]
pub fn version_selector(group: &str, version: u64) -> LabelSelector {
    group_selector(group).eq(LABEL_GROUP_VERSION, version.to_string())
}

/// Every record of every group
#[must_use]
pub fn any_group_selector() -> LabelSelector {
    LabelSelector::new().exists(LABEL_GROUP_NAME)
}

/// Workloads carrying a link label, whatever its value
#[must_use]
pub fn linked_selector() -> LabelSelector {
    LabelSelector::new().exists(LABEL_LINKED_GROUP)
}

#[must_use]
pub fn group_of(labels: &Labels) -> Option<&str> {
    labels
        .get(LABEL_GROUP_NAME)
        .map(String::as_str)
        .filter(|g| !g.is_empty())
}

/// Version label as a positive integer; missing or malformed labels yield `None`
#[must_use]
pub fn version_of(labels: &Labels) -> Option<u64> {
    labels
        .get(LABEL_GROUP_VERSION)
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
}
