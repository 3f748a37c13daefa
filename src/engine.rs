//! # Environment Group Engine
//!
//! Entry point for callers (HTTP handlers, the `egctl` CLI). Every operation
//! takes a [`Deadline`] that bounds each backing-store call it makes, and
//! runs inside an `env_group` span carrying the operation name and group.
//!
//! The engine holds no state of its own besides its configuration; every
//! read goes to the backing store.
//!
//! ## Usage
//!
//! ```rust
//! use env_group_engine::prelude::*;
//! use std::sync::Arc;
//!
//! # tokio_test_block(async {
//! let engine = EnvGroupEngine::new(Arc::new(InMemoryStore::new()), EngineConfig::default());
//! let group = EnvironmentGroup::new("db").with_plain("HOST", "pg");
//! let version = engine
//!     .create_or_update_base_group(Deadline::none(), &group)
//!     .await
//!     .unwrap();
//! assert_eq!(version, 1);
//! # });
//! # fn tokio_test_block<F: std::future::Future>(f: F) -> F::Output {
//! #     tokio::runtime::Builder::new_current_thread().enable_all().build().unwrap().block_on(f)
//! # }
//! ```

use crate::config::EngineConfig;
use crate::deadline::Deadline;
use crate::envgroup::writer::{self, AllocationPolicy};
use crate::envgroup::{
    delete, index, links, naming, sync, DeletionSummary, EnvironmentGroup, LinkedWorkload,
    SyncedVersion, Version,
};
use crate::error::{EnvGroupError, Result};
use crate::observability::metrics;
use crate::store::{BackingStore, BoundStore};
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info_span, warn, Instrument};

#[derive(Clone)]
pub struct EnvGroupEngine {
    store: Arc<dyn BackingStore>,
    config: EngineConfig,
}

impl std::fmt::Debug for EnvGroupEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvGroupEngine")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl EnvGroupEngine {
    #[must_use]
    pub fn new(store: Arc<dyn BackingStore>, config: EngineConfig) -> Self {
        if config.enable_metrics {
            if let Err(e) = metrics::register_metrics() {
                warn!("Failed to register environment group metrics: {}", e);
            }
        }
        Self { store, config }
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn canonical_namespace(&self) -> &str {
        &self.config.canonical_namespace
    }

    fn bind(&self, deadline: Deadline) -> BoundStore<'_> {
        BoundStore::new(self.store.as_ref(), deadline)
    }

    /// Write `group` as its next version in the canonical namespace
    ///
    /// # Errors
    ///
    /// `Invalid`, `Conflict`, `DeadlineExceeded` or `Internal`.
    pub async fn create_or_update_base_group(
        &self,
        deadline: Deadline,
        group: &EnvironmentGroup,
    ) -> Result<u64> {
        let store = self.bind(deadline);
        let policy = AllocationPolicy::from_config(&self.config);
        instrument(
            "create_or_update_base_group",
            &group.name,
            writer::create_next_version(&store, self.canonical_namespace(), group, policy),
        )
        .await
    }

    /// Latest canonical version of `name`; `None` if the group has no versions
    ///
    /// # Errors
    ///
    /// `Invalid`, `DeadlineExceeded` or `Internal`.
    pub async fn latest_base_group(
        &self,
        deadline: Deadline,
        name: &str,
    ) -> Result<Option<Version>> {
        let store = self.bind(deadline);
        let canonical = self.canonical_namespace();
        instrument("latest_base_group", name, async {
            naming::validate_group_name(name)?;
            index::latest_version(&store, canonical, name)
                .await
                .map_err(|e| {
                    EnvGroupError::from_store(
                        format!("reading latest version of environment group {name}"),
                        e,
                    )
                })
        })
        .await
    }

    /// Every canonical version of `name`, oldest first
    ///
    /// # Errors
    ///
    /// `Invalid`, `DeadlineExceeded` or `Internal`.
    pub async fn base_group_versions(&self, deadline: Deadline, name: &str) -> Result<Vec<Version>> {
        let store = self.bind(deadline);
        let canonical = self.canonical_namespace();
        instrument("base_group_versions", name, async {
            naming::validate_group_name(name)?;
            index::list_versions(&store, canonical, name)
                .await
                .map_err(|e| {
                    EnvGroupError::from_store(
                        format!("listing versions of environment group {name}"),
                        e,
                    )
                })
        })
        .await
    }

    /// One version of `name` as stored in `namespace`
    ///
    /// # Errors
    ///
    /// - `Invalid` if `name` or `namespace` is empty or `version` is 0
    /// - `NotFound` if `namespace` holds no such version
    /// - `DeadlineExceeded` or `Internal` on store failures
    pub async fn version_in_namespace(
        &self,
        deadline: Deadline,
        name: &str,
        version: u64,
        namespace: &str,
    ) -> Result<Version> {
        let store = self.bind(deadline);
        instrument("version_in_namespace", name, async {
            naming::validate_group_name(name)?;
            if namespace.is_empty() {
                return Err(EnvGroupError::Invalid(
                    "namespace must not be empty".to_string(),
                ));
            }
            if version == 0 {
                return Err(EnvGroupError::Invalid(
                    "version numbers start at 1".to_string(),
                ));
            }
            index::read_version(&store, namespace, name, version)
                .await
                .map_err(|e| {
                    EnvGroupError::from_store(
                        format!("reading environment group {name} version {version} in {namespace}"),
                        e,
                    )
                })?
                .ok_or_else(|| EnvGroupError::NotFound {
                    name: name.to_string(),
                    version,
                    namespace: namespace.to_string(),
                })
        })
        .await
    }

    /// Latest canonical version of every group, ordered by group name
    ///
    /// # Errors
    ///
    /// `DeadlineExceeded` or `Internal`.
    pub async fn list_base_groups(&self, deadline: Deadline) -> Result<Vec<Version>> {
        let store = self.bind(deadline);
        let canonical = self.canonical_namespace();
        instrument("list_base_groups", "", async {
            index::latest_per_group(&store, canonical)
                .await
                .map_err(|e| EnvGroupError::from_store("listing environment groups", e))
        })
        .await
    }

    /// Workloads whose link label names `name`
    ///
    /// # Errors
    ///
    /// `Invalid`, `DeadlineExceeded` or `Internal`.
    pub async fn linked_applications(
        &self,
        deadline: Deadline,
        name: &str,
    ) -> Result<Vec<LinkedWorkload>> {
        let store = self.bind(deadline);
        instrument(
            "linked_applications",
            name,
            links::linked_workloads(&store, name),
        )
        .await
    }

    /// Delete every version of `name` in every namespace
    ///
    /// # Errors
    ///
    /// `Invalid`, `Precondition` while workloads link to the group,
    /// `DeadlineExceeded` or `Internal`.
    pub async fn delete_group(&self, deadline: Deadline, name: &str) -> Result<DeletionSummary> {
        let store = self.bind(deadline);
        instrument(
            "delete_group",
            name,
            delete::delete_group(&store, self.canonical_namespace(), name),
        )
        .await
    }

    /// Materialize the latest version of `group` into `target`
    ///
    /// Returns `Ok(None)` without touching the store when `group` is empty.
    ///
    /// # Errors
    ///
    /// `Invalid`, `NotFound` when the group has no versions,
    /// `DeadlineExceeded` or `Internal`.
    pub async fn sync_latest_version_to_namespace(
        &self,
        deadline: Deadline,
        group: &str,
        target: &str,
    ) -> Result<Option<SyncedVersion>> {
        let store = self.bind(deadline);
        instrument(
            "sync_latest_version_to_namespace",
            group,
            sync::sync_latest(&store, self.canonical_namespace(), group, target),
        )
        .await
    }
}

/// Run one operation inside its span, recording count, duration and failures
async fn instrument<T, F>(operation: &'static str, group: &str, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    metrics::increment_operations(operation);
    let span = info_span!("env_group", operation, group = %group);
    let start = Instant::now();

    let result = fut.instrument(span.clone()).await;

    metrics::observe_operation_duration(operation, start.elapsed().as_secs_f64());
    if let Err(e) = &result {
        metrics::increment_operation_errors(operation, e.kind());
        span.in_scope(|| debug!("Operation failed ({}): {}", e.kind(), e));
    }
    result
}
