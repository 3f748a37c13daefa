//! # Base Group Writer
//!
//! Allocates the next version number of a group in the canonical namespace and
//! writes its plain record, then its secret record.
//!
//! There is no compare-and-set in the backing store, so concurrent writers are
//! serialized by colliding on the record name: a writer that loses the race
//! sees `AlreadyExists`, backs off and recomputes the next number. The retry
//! budget is bounded; running out returns `Conflict`.

use super::backoff::AllocationBackoff;
use super::{index, naming, EnvironmentGroup};
use crate::config::EngineConfig;
use crate::error::{EnvGroupError, Result};
use crate::observability::metrics;
use crate::store::{BoundStore, StoreError};
use tracing::{debug, info, warn};

/// Retry budget for optimistic version allocation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocationPolicy {
    /// Total attempts, including the first
    pub attempts: u32,
    pub backoff_start_ms: u64,
    pub backoff_max_ms: u64,
}

impl AllocationPolicy {
    #[must_use]
    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            attempts: config.version_allocation_attempts.max(1),
            backoff_start_ms: config.allocation_backoff_start_ms,
            backoff_max_ms: config.allocation_backoff_max_ms,
        }
    }

    fn backoff(&self) -> AllocationBackoff {
        AllocationBackoff::new(self.backoff_start_ms, self.backoff_max_ms)
    }
}

impl Default for AllocationPolicy {
    fn default() -> Self {
        Self::from_config(&EngineConfig::default())
    }
}

/// Write `group` as the next version in `canonical` and return its number
///
/// # Errors
///
/// - `Invalid` if the group name is empty or the store rejects the write
/// - `Conflict` once every allocation attempt collided with another writer
/// - `DeadlineExceeded` if the deadline passes, including during a backoff
/// - `Internal` for any other store failure, including a failed secret write
///   after the plain record was created
pub async fn create_next_version(
    store: &BoundStore<'_>,
    canonical: &str,
    group: &EnvironmentGroup,
    policy: AllocationPolicy,
) -> Result<u64> {
    naming::validate_group_name(&group.name)?;

    store.ensure_namespace(canonical).await.map_err(|e| {
        EnvGroupError::from_store(format!("ensuring canonical namespace {canonical}"), e)
    })?;

    let version = allocate(store, canonical, group, policy).await?;
    let record_name = naming::record_name(&group.name, version);
    let labels = naming::version_labels(&group.name, version);

    if let Err(e) = store
        .put_secret(
            canonical,
            &record_name,
            &labels,
            Some(group.created_at_utc),
            &group.secret,
        )
        .await
    {
        // The plain record stays behind; readers see it as a version with an
        // empty secret map
        warn!(
            "Secret record for environment group {} version {} was not written: {}",
            group.name, version, e
        );
        return Err(match e {
            StoreError::DeadlineExceeded => EnvGroupError::DeadlineExceeded,
            source => EnvGroupError::Internal {
                context: format!(
                    "writing secret record {canonical}/{record_name} after its plain record"
                ),
                source,
            },
        });
    }

    metrics::increment_versions_created();
    info!(
        "Created environment group {} version {} in {}",
        group.name, version, canonical
    );
    Ok(version)
}

/// Claim the next version number by creating its plain record
async fn allocate(
    store: &BoundStore<'_>,
    canonical: &str,
    group: &EnvironmentGroup,
    policy: AllocationPolicy,
) -> Result<u64> {
    let mut backoff = policy.backoff();

    for attempt in 1..=policy.attempts {
        let current = index::current_max_version(store, canonical, &group.name)
            .await
            .map_err(|e| {
                EnvGroupError::from_store(
                    format!("reading current version of environment group {}", group.name),
                    e,
                )
            })?;
        let next = current + 1;
        let record_name = naming::record_name(&group.name, next);
        let labels = naming::version_labels(&group.name, next);

        match store
            .put_plain(
                canonical,
                &record_name,
                &labels,
                Some(group.created_at_utc),
                &group.plain,
            )
            .await
        {
            Ok(()) => return Ok(next),
            Err(e) if e.is_already_exists() => {
                metrics::increment_version_conflicts();
                debug!(
                    "Version {} of environment group {} was taken (attempt {}/{})",
                    next, group.name, attempt, policy.attempts
                );
                if attempt < policy.attempts {
                    store
                        .deadline()
                        .sleep(backoff.next_delay())
                        .await
                        .map_err(|_elapsed| EnvGroupError::DeadlineExceeded)?;
                }
            }
            Err(e) => {
                return Err(EnvGroupError::from_store(
                    format!("writing plain record {canonical}/{record_name}"),
                    e,
                ))
            }
        }
    }

    warn!(
        "Gave up allocating a version of environment group {} after {} attempts",
        group.name, policy.attempts
    );
    Err(EnvGroupError::Conflict {
        name: group.name.clone(),
        attempts: policy.attempts,
    })
}
