//! # Bound Store
//!
//! Borrowed view of a [`BackingStore`] that applies one operation's
//! [`Deadline`] to every call and counts calls for metrics.

use super::{
    BackingStore, LabelSelector, Labels, PlainRecord, Scope, SecretData, SecretRecord,
    StoreError, Workload,
};
use crate::deadline::Deadline;
use crate::observability::metrics;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::future::Future;

/// Store handle scoped to one engine operation
#[derive(Clone, Copy)]
pub struct BoundStore<'a> {
    store: &'a dyn BackingStore,
    deadline: Deadline,
}

impl std::fmt::Debug for BoundStore<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundStore")
            .field("deadline", &self.deadline)
            .finish_non_exhaustive()
    }
}

impl<'a> BoundStore<'a> {
    #[must_use]
    pub fn new(store: &'a dyn BackingStore, deadline: Deadline) -> Self {
        Self { store, deadline }
    }

    #[must_use]
    pub fn deadline(&self) -> Deadline {
        self.deadline
    }

    async fn call<T, F>(&self, call: &'static str, fut: F) -> Result<T, StoreError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        metrics::increment_store_calls(call);
        match self.deadline.bound(fut).await {
            Ok(result) => result,
            Err(_elapsed) => Err(StoreError::DeadlineExceeded),
        }
    }

    pub async fn put_plain(
        &self,
        namespace: &str,
        name: &str,
        labels: &Labels,
        created_at: Option<DateTime<Utc>>,
        data: &BTreeMap<String, String>,
    ) -> Result<(), StoreError> {
        self.call(
            "put_plain",
            self.store
                .put_plain(namespace, name, labels, created_at, data),
        )
        .await
    }

    pub async fn put_secret(
        &self,
        namespace: &str,
        name: &str,
        labels: &Labels,
        created_at: Option<DateTime<Utc>>,
        data: &SecretData,
    ) -> Result<(), StoreError> {
        self.call(
            "put_secret",
            self.store
                .put_secret(namespace, name, labels, created_at, data),
        )
        .await
    }

    pub async fn list_plain(
        &self,
        scope: Scope<'_>,
        selector: &LabelSelector,
    ) -> Result<Vec<PlainRecord>, StoreError> {
        self.call("list_plain", self.store.list_plain(scope, selector))
            .await
    }

    pub async fn list_secret(
        &self,
        scope: Scope<'_>,
        selector: &LabelSelector,
    ) -> Result<Vec<SecretRecord>, StoreError> {
        self.call("list_secret", self.store.list_secret(scope, selector))
            .await
    }

    pub async fn delete_plain(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.call("delete_plain", self.store.delete_plain(namespace, name))
            .await
    }

    pub async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.call("delete_secret", self.store.delete_secret(namespace, name))
            .await
    }

    pub async fn ensure_namespace(&self, namespace: &str) -> Result<(), StoreError> {
        self.call("ensure_namespace", self.store.ensure_namespace(namespace))
            .await
    }

    pub async fn list_workloads(
        &self,
        selector: &LabelSelector,
    ) -> Result<Vec<Workload>, StoreError> {
        self.call("list_workloads", self.store.list_workloads(selector))
            .await
    }
}
