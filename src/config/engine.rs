//! # Engine Configuration
//!
//! Engine-level settings loaded from environment variables.

use crate::constants::{
    DEFAULT_ALLOCATION_BACKOFF_MAX_MS, DEFAULT_ALLOCATION_BACKOFF_START_MS,
    DEFAULT_CANONICAL_NAMESPACE, DEFAULT_OPERATION_TIMEOUT_SECS,
    DEFAULT_VERSION_ALLOCATION_ATTEMPTS,
};
use std::time::Duration;

/// Engine configuration
///
/// All settings have sensible defaults and can be overridden via environment variables.
/// Embedders and tests adjust individual fields with the `with_*` methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Namespace holding the authoritative version history of every group
    pub canonical_namespace: String,
    /// Attempts at allocating the next version before giving up with `Conflict`
    pub version_allocation_attempts: u32,
    /// First delay between allocation attempts (milliseconds)
    pub allocation_backoff_start_ms: u64,
    /// Maximum delay between allocation attempts (milliseconds)
    pub allocation_backoff_max_ms: u64,
    /// Default deadline for one operation (seconds), used by the CLI
    pub operation_timeout_secs: u64,
    /// Global log level (ERROR, WARN, INFO, DEBUG, TRACE)
    pub log_level: String,
    /// Log format (json, text)
    pub log_format: String,
    /// Enable color in text format logs
    pub log_enable_color: bool,
    /// Register Prometheus collectors
    pub enable_metrics: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            canonical_namespace: DEFAULT_CANONICAL_NAMESPACE.to_string(),
            version_allocation_attempts: DEFAULT_VERSION_ALLOCATION_ATTEMPTS,
            allocation_backoff_start_ms: DEFAULT_ALLOCATION_BACKOFF_START_MS,
            allocation_backoff_max_ms: DEFAULT_ALLOCATION_BACKOFF_MAX_MS,
            operation_timeout_secs: DEFAULT_OPERATION_TIMEOUT_SECS,
            log_level: "INFO".to_string(),
            log_format: "text".to_string(),
            log_enable_color: false,
            enable_metrics: true,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables with defaults
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            canonical_namespace: env_var_or_default_str(
                "ENV_GROUP_CANONICAL_NAMESPACE",
                DEFAULT_CANONICAL_NAMESPACE,
            ),
            version_allocation_attempts: env_var_or_default(
                "ENV_GROUP_VERSION_ALLOCATION_ATTEMPTS",
                DEFAULT_VERSION_ALLOCATION_ATTEMPTS,
            )
            .max(1),
            allocation_backoff_start_ms: env_var_or_default(
                "ENV_GROUP_ALLOCATION_BACKOFF_START_MS",
                DEFAULT_ALLOCATION_BACKOFF_START_MS,
            ),
            allocation_backoff_max_ms: env_var_or_default(
                "ENV_GROUP_ALLOCATION_BACKOFF_MAX_MS",
                DEFAULT_ALLOCATION_BACKOFF_MAX_MS,
            ),
            operation_timeout_secs: env_var_or_default(
                "ENV_GROUP_OPERATION_TIMEOUT_SECS",
                DEFAULT_OPERATION_TIMEOUT_SECS,
            ),
            log_level: env_var_or_default_str("LOG_LEVEL", "INFO"),
            log_format: env_var_or_default_str("LOG_FORMAT", "text"),
            log_enable_color: env_var_or_default_bool("LOG_ENABLE_COLOR", false),
            enable_metrics: env_var_or_default_bool("ENABLE_METRICS", true),
        }
    }

    #[must_use]
    pub fn with_canonical_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.canonical_namespace = namespace.into();
        self
    }

    /// Values below one are raised to one; a writer always gets one attempt.
    #[must_use]
    pub fn with_version_allocation_attempts(mut self, attempts: u32) -> Self {
        self.version_allocation_attempts = attempts.max(1);
        self
    }

    #[must_use]
    pub fn with_allocation_backoff_ms(mut self, start_ms: u64, max_ms: u64) -> Self {
        self.allocation_backoff_start_ms = start_ms;
        self.allocation_backoff_max_ms = max_ms.max(start_ms);
        self
    }

    #[must_use]
    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout_secs = timeout.as_secs();
        self
    }

    /// Get default operation deadline duration
    #[must_use]
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }
}

/// Read environment variable or return default value
fn env_var_or_default<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// Read environment variable as boolean or return default
fn env_var_or_default_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| parse_bool(&v))
        .unwrap_or(default)
}

/// Read environment variable as string or return default
fn env_var_or_default_str(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_lowercase().as_str(),
        "true" | "1" | "yes" | "on"
    )
}
