//! # Backing Store
//!
//! Namespaced CRUD over the two record kinds the engine persists (plain and
//! secret), plus namespace provisioning and workload discovery.
//!
//! Implementations:
//! - [`kubernetes::KubeStore`]: ConfigMaps, Secrets, Namespaces, Deployments and CronJobs
//! - [`memory::InMemoryStore`]: process-local store with Kubernetes semantics
//!
//! `NotFound` and `AlreadyExists` are surfaced as distinct errors; every other
//! failure is reported verbatim. Callers decide which of them are benign.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::fmt;
use thiserror::Error;

pub mod bound;
pub mod kubernetes;
pub mod memory;
pub mod payload;
pub mod selector;

pub use bound::BoundStore;
pub use payload::SecretData;
pub use selector::{LabelSelector, Requirement};

/// Record labels
pub type Labels = BTreeMap<String, String>;

/// Where a list call looks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope<'a> {
    /// A single namespace
    Namespace(&'a str),
    /// Every namespace
    All,
}

impl fmt::Display for Scope<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Namespace(ns) => f.write_str(ns),
            Scope::All => f.write_str("<all namespaces>"),
        }
    }
}

/// Kind of object a store error refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordKind {
    Plain,
    Secret,
    Namespace,
}

impl fmt::Display for RecordKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordKind::Plain => f.write_str("plain record"),
            RecordKind::Secret => f.write_str("secret record"),
            RecordKind::Namespace => f.write_str("namespace"),
        }
    }
}

/// Plain key/value record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlainRecord {
    pub namespace: String,
    pub name: String,
    pub labels: Labels,
    pub created_at: Option<DateTime<Utc>>,
    pub data: BTreeMap<String, String>,
}

/// Opaque key/value record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretRecord {
    pub namespace: String,
    pub name: String,
    pub labels: Labels,
    pub created_at: Option<DateTime<Utc>>,
    pub data: SecretData,
}

/// Kind of workload that can link to environment groups
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum WorkloadKind {
    /// Long-running service (Deployment)
    Service,
    /// Scheduled job (CronJob)
    ScheduledJob,
}

impl fmt::Display for WorkloadKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorkloadKind::Service => f.write_str("service"),
            WorkloadKind::ScheduledJob => f.write_str("scheduled-job"),
        }
    }
}

/// Workload as seen by the link indexer
///
/// `labels` are the labels the workload's pods run with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workload {
    pub kind: WorkloadKind,
    pub name: String,
    pub namespace: String,
    pub labels: Labels,
}

/// Backing store errors
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{kind} {namespace}/{name} not found")]
    NotFound {
        kind: RecordKind,
        namespace: String,
        name: String,
    },

    #[error("{kind} {namespace}/{name} already exists")]
    AlreadyExists {
        kind: RecordKind,
        namespace: String,
        name: String,
    },

    /// The store refused a name, label or value (length, charset, ...)
    #[error("rejected by backing store: {0}")]
    Invalid(String),

    #[error("backing store call exceeded the operation deadline")]
    DeadlineExceeded,

    #[error("Kubernetes API error: {0}")]
    Kube(#[from] kube::Error),
}

impl StoreError {
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound { .. })
    }

    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, StoreError::AlreadyExists { .. })
    }
}

/// Backing store trait
///
/// Every method is a potentially blocking network call. Callers bound them
/// with a deadline through [`BoundStore`].
#[async_trait]
pub trait BackingStore: Send + Sync {
    /// Create a plain record; fails with `AlreadyExists` if `name` is taken in `namespace`
    async fn put_plain(
        &self,
        namespace: &str,
        name: &str,
        labels: &Labels,
        created_at: Option<DateTime<Utc>>,
        data: &BTreeMap<String, String>,
    ) -> Result<(), StoreError>;

    /// Create a secret record; fails with `AlreadyExists` if `name` is taken in `namespace`
    async fn put_secret(
        &self,
        namespace: &str,
        name: &str,
        labels: &Labels,
        created_at: Option<DateTime<Utc>>,
        data: &SecretData,
    ) -> Result<(), StoreError>;

    async fn get_plain(&self, namespace: &str, name: &str) -> Result<PlainRecord, StoreError>;

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<SecretRecord, StoreError>;

    async fn list_plain(
        &self,
        scope: Scope<'_>,
        selector: &LabelSelector,
    ) -> Result<Vec<PlainRecord>, StoreError>;

    async fn list_secret(
        &self,
        scope: Scope<'_>,
        selector: &LabelSelector,
    ) -> Result<Vec<SecretRecord>, StoreError>;

    /// Delete a plain record; a missing record is reported as `NotFound`
    async fn delete_plain(&self, namespace: &str, name: &str) -> Result<(), StoreError>;

    /// Delete a secret record; a missing record is reported as `NotFound`
    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), StoreError>;

    /// Create the namespace if absent; no-op if present
    async fn ensure_namespace(&self, namespace: &str) -> Result<(), StoreError>;

    /// Services and scheduled jobs, in every namespace, whose pod labels match
    async fn list_workloads(&self, selector: &LabelSelector) -> Result<Vec<Workload>, StoreError>;
}
