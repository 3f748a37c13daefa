//! Environment Group Engine
//!
//! Versioned bundles of plain configuration and secrets for Kubernetes
//! workloads. The authoritative history of every group lives in one
//! canonical namespace; the latest version is copied on demand into the
//! namespaces where workloads run. Workloads declare the groups they use
//! through a label, and a group cannot be deleted while any workload still
//! links to it.
//!
//! [`engine::EnvGroupEngine`] is the entry point. It works against any
//! [`store::BackingStore`]: [`store::kubernetes::KubeStore`] for a cluster, or
//! [`store::memory::InMemoryStore`] for tests and embedding.

pub mod config;
pub mod constants;
pub mod deadline;
pub mod engine;
pub mod envgroup;
pub mod error;
pub mod observability;
pub mod prelude;
pub mod store;
