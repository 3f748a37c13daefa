//! # In-Memory Store
//!
//! Process-local [`BackingStore`] with the same semantics the Kubernetes API gives:
//! names are unique per kind and namespace, and objects cannot be created in a
//! namespace that does not exist.
//!
//! Counts every call and every mutation so callers can assert that an operation
//! did (or did not) touch the store. Optional per-call latency makes
//! interleavings and deadlines observable.
//!
//! This is ephemeral - data does not persist across restarts.
//! Thread-safe using `Arc<Mutex>`; the lock is never held across an await.

use super::{
    BackingStore, LabelSelector, Labels, PlainRecord, RecordKind, Scope, SecretData,
    SecretRecord, StoreError, Workload, WorkloadKind,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

type Key = (String, String);

#[derive(Debug, Default)]
struct State {
    namespaces: BTreeSet<String>,
    plain: BTreeMap<Key, PlainRecord>,
    secret: BTreeMap<Key, SecretRecord>,
    workloads: BTreeMap<(WorkloadKind, String, String), Workload>,
}

#[derive(Debug, Default)]
struct Counters {
    calls: AtomicU64,
    writes: AtomicU64,
}

/// In-memory backing store
#[derive(Clone, Debug, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
    counters: Arc<Counters>,
    latency: Option<Duration>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every call sleeps for `latency` before touching state
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Number of trait calls made so far (reads and writes)
    #[must_use]
    pub fn calls(&self) -> u64 {
        self.counters.calls.load(Ordering::SeqCst)
    }

    /// Number of mutations made so far (creates, deletes, namespace creations)
    #[must_use]
    pub fn writes(&self) -> u64 {
        self.counters.writes.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn has_namespace(&self, namespace: &str) -> bool {
        self.lock().namespaces.contains(namespace)
    }

    /// Add or replace a workload, creating its namespace if needed
    ///
    /// Seeding helpers do not count as calls or writes.
    pub fn upsert_workload(&self, workload: Workload) {
        let mut state = self.lock();
        state.namespaces.insert(workload.namespace.clone());
        state.workloads.insert(
            (
                workload.kind,
                workload.namespace.clone(),
                workload.name.clone(),
            ),
            workload,
        );
    }

    /// Replace the pod labels of an existing workload; returns false if it does not exist
    pub fn set_workload_labels(
        &self,
        kind: WorkloadKind,
        namespace: &str,
        name: &str,
        labels: Labels,
    ) -> bool {
        let mut state = self.lock();
        match state
            .workloads
            .get_mut(&(kind, namespace.to_string(), name.to_string()))
        {
            Some(workload) => {
                workload.labels = labels;
                true
            }
            None => false,
        }
    }

    pub fn remove_workload(&self, kind: WorkloadKind, namespace: &str, name: &str) -> bool {
        self.lock()
            .workloads
            .remove(&(kind, namespace.to_string(), name.to_string()))
            .is_some()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        // A panic in another holder cannot leave State half-updated: every
        // mutation below is a single map operation.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn enter(&self) {
        self.counters.calls.fetch_add(1, Ordering::SeqCst);
        match self.latency {
            Some(latency) => tokio::time::sleep(latency).await,
            // Give concurrent callers a chance to interleave between calls
            None => tokio::task::yield_now().await,
        }
    }

    fn record_write(&self) {
        self.counters.writes.fetch_add(1, Ordering::SeqCst);
    }
}

fn in_scope(scope: Scope<'_>, namespace: &str) -> bool {
    match scope {
        Scope::Namespace(ns) => ns == namespace,
        Scope::All => true,
    }
}

fn key(namespace: &str, name: &str) -> Key {
    (namespace.to_string(), name.to_string())
}

fn missing_namespace(namespace: &str) -> StoreError {
    StoreError::NotFound {
        kind: RecordKind::Namespace,
        namespace: namespace.to_string(),
        name: namespace.to_string(),
    }
}

#[async_trait]
impl BackingStore for InMemoryStore {
    async fn put_plain(
        &self,
        namespace: &str,
        name: &str,
        labels: &Labels,
        created_at: Option<DateTime<Utc>>,
        data: &BTreeMap<String, String>,
    ) -> Result<(), StoreError> {
        self.enter().await;
        let mut state = self.lock();
        if !state.namespaces.contains(namespace) {
            return Err(missing_namespace(namespace));
        }
        let key = key(namespace, name);
        if state.plain.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                kind: RecordKind::Plain,
                namespace: namespace.to_string(),
                name: name.to_string(),
            });
        }
        state.plain.insert(
            key,
            PlainRecord {
                namespace: namespace.to_string(),
                name: name.to_string(),
                labels: labels.clone(),
                created_at,
                data: data.clone(),
            },
        );
        self.record_write();
        Ok(())
    }

    async fn put_secret(
        &self,
        namespace: &str,
        name: &str,
        labels: &Labels,
        created_at: Option<DateTime<Utc>>,
        data: &SecretData,
    ) -> Result<(), StoreError> {
        self.enter().await;
        let mut state = self.lock();
        if !state.namespaces.contains(namespace) {
            return Err(missing_namespace(namespace));
        }
        let key = key(namespace, name);
        if state.secret.contains_key(&key) {
            return Err(StoreError::AlreadyExists {
                kind: RecordKind::Secret,
                namespace: namespace.to_string(),
                name: name.to_string(),
            });
        }
        state.secret.insert(
            key,
            SecretRecord {
                namespace: namespace.to_string(),
                name: name.to_string(),
                labels: labels.clone(),
                created_at,
                data: data.clone(),
            },
        );
        self.record_write();
        Ok(())
    }

    async fn get_plain(&self, namespace: &str, name: &str) -> Result<PlainRecord, StoreError> {
        self.enter().await;
        self.lock()
            .plain
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: RecordKind::Plain,
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<SecretRecord, StoreError> {
        self.enter().await;
        self.lock()
            .secret
            .get(&key(namespace, name))
            .cloned()
            .ok_or_else(|| StoreError::NotFound {
                kind: RecordKind::Secret,
                namespace: namespace.to_string(),
                name: name.to_string(),
            })
    }

    async fn list_plain(
        &self,
        scope: Scope<'_>,
        selector: &LabelSelector,
    ) -> Result<Vec<PlainRecord>, StoreError> {
        self.enter().await;
        Ok(self
            .lock()
            .plain
            .values()
            .filter(|r| in_scope(scope, &r.namespace) && selector.matches(&r.labels))
            .cloned()
            .collect())
    }

    async fn list_secret(
        &self,
        scope: Scope<'_>,
        selector: &LabelSelector,
    ) -> Result<Vec<SecretRecord>, StoreError> {
        self.enter().await;
        Ok(self
            .lock()
            .secret
            .values()
            .filter(|r| in_scope(scope, &r.namespace) && selector.matches(&r.labels))
            .cloned()
            .collect())
    }

    async fn delete_plain(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.enter().await;
        if self.lock().plain.remove(&key(namespace, name)).is_none() {
            return Err(StoreError::NotFound {
                kind: RecordKind::Plain,
                namespace: namespace.to_string(),
                name: name.to_string(),
            });
        }
        self.record_write();
        Ok(())
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.enter().await;
        if self.lock().secret.remove(&key(namespace, name)).is_none() {
            return Err(StoreError::NotFound {
                kind: RecordKind::Secret,
                namespace: namespace.to_string(),
                name: name.to_string(),
            });
        }
        self.record_write();
        Ok(())
    }

    async fn ensure_namespace(&self, namespace: &str) -> Result<(), StoreError> {
        self.enter().await;
        if namespace.is_empty() {
            return Err(StoreError::Invalid("namespace name must not be empty".to_string()));
        }
        if self.lock().namespaces.insert(namespace.to_string()) {
            self.record_write();
        }
        Ok(())
    }

    async fn list_workloads(&self, selector: &LabelSelector) -> Result<Vec<Workload>, StoreError> {
        self.enter().await;
        Ok(self
            .lock()
            .workloads
            .values()
            .filter(|w| selector.matches(&w.labels))
            .cloned()
            .collect())
    }
}
