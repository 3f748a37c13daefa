//! # Metrics
//!
//! Prometheus metrics for the environment group engine.
//!
//! ## Metrics Exposed
//!
//! - `env_group_operations_total{operation}` - Engine operations started
//! - `env_group_operation_errors_total{operation,kind}` - Failed operations by error kind
//! - `env_group_operation_duration_seconds{operation}` - Duration of engine operations
//! - `env_group_store_calls_total{call}` - Backing-store calls
//! - `env_group_versions_created_total` - Versions written to the canonical namespace
//! - `env_group_version_conflicts_total` - Version allocation collisions
//! - `env_group_materializations_total{outcome}` - Syncs into target namespaces
//! - `env_group_deletions_blocked_total` - Deletions refused because of linked workloads

use anyhow::Result;
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::sync::LazyLock;

pub(crate) static REGISTRY: LazyLock<Registry> = LazyLock::new(Registry::new);

static OPERATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "env_group_operations_total",
            "Total number of environment group engine operations",
        ),
        &["operation"],
    )
    .expect("Failed to create OPERATIONS_TOTAL metric - this should never happen")
});

static OPERATION_ERRORS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "env_group_operation_errors_total",
            "Total number of failed engine operations by error kind",
        ),
        &["operation", "kind"],
    )
    .expect("Failed to create OPERATION_ERRORS_TOTAL metric - this should never happen")
});

static OPERATION_DURATION: LazyLock<HistogramVec> = LazyLock::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "env_group_operation_duration_seconds",
            "Duration of engine operations in seconds",
        )
        .buckets(vec![0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 30.0]),
        &["operation"],
    )
    .expect("Failed to create OPERATION_DURATION metric - this should never happen")
});

static STORE_CALLS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "env_group_store_calls_total",
            "Total number of backing-store calls",
        ),
        &["call"],
    )
    .expect("Failed to create STORE_CALLS_TOTAL metric - this should never happen")
});

static VERSIONS_CREATED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "env_group_versions_created_total",
        "Total number of environment group versions created",
    )
    .expect("Failed to create VERSIONS_CREATED_TOTAL metric - this should never happen")
});

static VERSION_CONFLICTS_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "env_group_version_conflicts_total",
        "Total number of version allocation collisions between concurrent writers",
    )
    .expect("Failed to create VERSION_CONFLICTS_TOTAL metric - this should never happen")
});

static MATERIALIZATIONS_TOTAL: LazyLock<IntCounterVec> = LazyLock::new(|| {
    IntCounterVec::new(
        Opts::new(
            "env_group_materializations_total",
            "Total number of syncs into target namespaces by outcome",
        ),
        &["outcome"],
    )
    .expect("Failed to create MATERIALIZATIONS_TOTAL metric - this should never happen")
});

static DELETIONS_BLOCKED_TOTAL: LazyLock<IntCounter> = LazyLock::new(|| {
    IntCounter::new(
        "env_group_deletions_blocked_total",
        "Total number of group deletions refused because workloads still link to the group",
    )
    .expect("Failed to create DELETIONS_BLOCKED_TOTAL metric - this should never happen")
});

/// Register every collector with the crate registry; calling it again is a no-op
///
/// # Errors
///
/// Returns an error if the registry rejects a collector for any reason other
/// than it already being registered, such as a descriptor clash.
pub fn register_metrics() -> Result<()> {
    register(Box::new(OPERATIONS_TOTAL.clone()))?;
    register(Box::new(OPERATION_ERRORS_TOTAL.clone()))?;
    register(Box::new(OPERATION_DURATION.clone()))?;
    register(Box::new(STORE_CALLS_TOTAL.clone()))?;
    register(Box::new(VERSIONS_CREATED_TOTAL.clone()))?;
    register(Box::new(VERSION_CONFLICTS_TOTAL.clone()))?;
    register(Box::new(MATERIALIZATIONS_TOTAL.clone()))?;
    register(Box::new(DELETIONS_BLOCKED_TOTAL.clone()))?;
    Ok(())
}

fn register(collector: Box<dyn prometheus::core::Collector>) -> Result<()> {
    match REGISTRY.register(collector) {
        Ok(()) | Err(prometheus::Error::AlreadyReg) => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Registered metrics in the Prometheus text exposition format
///
/// # Errors
///
/// Returns an error if encoding the gathered families fails or the output is
/// not valid UTF-8.
pub fn render_metrics() -> Result<String> {
    let mut buffer = Vec::new();
    TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}

pub fn increment_operations(operation: &str) {
    OPERATIONS_TOTAL.with_label_values(&[operation]).inc();
}

pub fn increment_operation_errors(operation: &str, kind: &str) {
    OPERATION_ERRORS_TOTAL
        .with_label_values(&[operation, kind])
        .inc();
}

pub fn observe_operation_duration(operation: &str, duration: f64) {
    OPERATION_DURATION
        .with_label_values(&[operation])
        .observe(duration);
}

pub fn increment_store_calls(call: &str) {
    STORE_CALLS_TOTAL.with_label_values(&[call]).inc();
}

pub fn increment_versions_created() {
    VERSIONS_CREATED_TOTAL.inc();
}

pub fn increment_version_conflicts() {
    VERSION_CONFLICTS_TOTAL.inc();
}

/// `outcome` is `created` or `unchanged`
pub fn increment_materializations(outcome: &str) {
    MATERIALIZATIONS_TOTAL.with_label_values(&[outcome]).inc();
}

pub fn increment_deletions_blocked() {
    DELETIONS_BLOCKED_TOTAL.inc();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_metrics_is_idempotent() {
        register_metrics().unwrap();
        register_metrics().unwrap();
    }

    #[test]
    fn test_render_includes_registered_metrics() {
        register_metrics().unwrap();
        increment_versions_created();
        increment_store_calls("list_plain");
        increment_operation_errors("delete_group", "precondition");

        let text = render_metrics().unwrap();
        assert!(text.contains("env_group_versions_created_total"));
        assert!(text.contains("env_group_store_calls_total{call=\"list_plain\"}"));
        assert!(text.contains("kind=\"precondition\""));
    }
}
