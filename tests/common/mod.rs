//! Common test utilities for engine integration tests
//!
//! Builds an engine over an in-memory store and seeds workloads.

#![allow(dead_code, reason = "Not every test binary uses every helper")]

use env_group_engine::constants::LABEL_LINKED_GROUP;
use env_group_engine::prelude::*;
use env_group_engine::store::{Labels, Workload, WorkloadKind};
use std::collections::BTreeMap;
use std::sync::Arc;

pub const CANONICAL: &str = "porter-env-group";

/// Engine over a fresh in-memory store, with the store handle for assertions
pub fn engine() -> (Arc<InMemoryStore>, EnvGroupEngine) {
    engine_with(InMemoryStore::new(), EngineConfig::default())
}

pub fn engine_with(store: InMemoryStore, config: EngineConfig) -> (Arc<InMemoryStore>, EnvGroupEngine) {
    let store = Arc::new(store);
    let engine = EnvGroupEngine::new(Arc::clone(&store) as Arc<dyn BackingStore>, config);
    (store, engine)
}

pub fn group(name: &str, plain: &[(&str, &str)], secret: &[(&str, &str)]) -> EnvironmentGroup {
    let mut group = EnvironmentGroup::new(name);
    for (k, v) in plain {
        group = group.with_plain(*k, *v);
    }
    for (k, v) in secret {
        group = group.with_secret(*k, v.as_bytes().to_vec());
    }
    group
}

pub fn plain_map(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
        .collect()
}

/// Service whose pod template carries `linkedEnvironmentGroup = link`
pub fn linked_service(namespace: &str, name: &str, link: &str) -> Workload {
    Workload {
        kind: WorkloadKind::Service,
        name: name.to_string(),
        namespace: namespace.to_string(),
        labels: Labels::from([
            ("app".to_string(), name.to_string()),
            (LABEL_LINKED_GROUP.to_string(), link.to_string()),
        ]),
    }
}

pub fn linked_job(namespace: &str, name: &str, link: &str) -> Workload {
    Workload {
        kind: WorkloadKind::ScheduledJob,
        ..linked_service(namespace, name, link)
    }
}
