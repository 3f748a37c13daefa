//! # Environment Groups
//!
//! Versioned bundles of plain and secret key/value pairs.
//!
//! ## Persistence model
//!
//! Each version is a pair of records (one plain, one secret) labelled with the
//! group name and version number. The canonical namespace holds the
//! authoritative history; workload namespaces hold materialized copies.
//!
//! ## Components
//!
//! - [`naming`]: record names, labels and selectors
//! - [`index`]: max version and version history reads
//! - [`writer`]: allocates and writes the next version in the canonical namespace
//! - [`sync`]: materializes the latest version into a target namespace
//! - [`links`]: finds workloads linked to a group
//! - [`delete`]: removes every version of a group once nothing links to it

use crate::store::SecretData;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;

pub mod backoff;
pub mod delete;
pub mod index;
pub mod links;
pub mod naming;
pub mod sync;
pub mod writer;

/// Input for writing a new version of a group
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnvironmentGroup {
    pub name: String,
    pub plain: BTreeMap<String, String>,
    pub secret: SecretData,
    /// Informational only; never used for ordering
    pub created_at_utc: DateTime<Utc>,
}

impl EnvironmentGroup {
    /// Empty group stamped with the current time
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            plain: BTreeMap::new(),
            secret: SecretData::new(),
            created_at_utc: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_plain(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.plain.insert(key.into(), value.into());
        self
    }

    #[must_use]
    pub fn with_secret(mut self, key: impl Into<String>, value: impl Into<Vec<u8>>) -> Self {
        self.secret.insert(key, value);
        self
    }
}

/// One immutable version of a group, as read from a namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    /// Group name
    pub name: String,
    /// Ordering authority, starting at 1
    pub version: u64,
    /// Namespace the records were read from
    pub namespace: String,
    /// Name of the plain record (informational; lookups go through labels)
    pub record_name: String,
    pub plain: BTreeMap<String, String>,
    /// Empty when the secret record is missing (crash between the two writes)
    pub secret: SecretData,
    pub created_at_utc: Option<DateTime<Utc>>,
}

/// Workload linked to a group
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LinkedWorkload {
    pub name: String,
    pub namespace: String,
}

/// Result of materializing a version into a target namespace
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncedVersion {
    pub group: String,
    pub version: u64,
    pub namespace: String,
    pub record_name: String,
    /// False when the target already held this version and nothing was written
    pub created: bool,
}

/// What a group deletion removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeletionSummary {
    /// Versions present in the canonical namespace before deletion
    pub canonical_versions: usize,
    /// Plain and secret records removed across all namespaces
    pub records_deleted: usize,
}
