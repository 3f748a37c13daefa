//! # Errors
//!
//! Error categories the engine reports to its callers.
//!
//! Messages identify groups by name, version and namespace only; payload
//! values never appear in an error.

use crate::store::StoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EnvGroupError {
    /// A required argument was empty or malformed, or the store rejected a name/value
    #[error("invalid argument: {0}")]
    Invalid(String),

    /// A point lookup found nothing
    #[error("environment group {name} version {version} not found in namespace {namespace}")]
    NotFound {
        name: String,
        version: u64,
        namespace: String,
    },

    /// Optimistic version allocation lost every race it was allowed to retry
    #[error(
        "could not allocate a new version of environment group {name} after {attempts} attempts"
    )]
    Conflict { name: String, attempts: u32 },

    /// Deletion refused while workloads still link to the group
    #[error("environment group {name} is linked to {count} workload(s)")]
    Precondition { name: String, count: usize },

    #[error("operation exceeded its deadline")]
    DeadlineExceeded,

    /// Unexpected backing-store failure
    #[error("{context}")]
    Internal {
        context: String,
        #[source]
        source: StoreError,
    },
}

pub type Result<T, E = EnvGroupError> = std::result::Result<T, E>;

impl EnvGroupError {
    /// Map a backing-store error, keeping store-side validation failures and
    /// deadline expiry in their own categories
    pub fn from_store(context: impl Into<String>, source: StoreError) -> Self {
        match source {
            StoreError::Invalid(reason) => EnvGroupError::Invalid(reason),
            StoreError::DeadlineExceeded => EnvGroupError::DeadlineExceeded,
            source => EnvGroupError::Internal {
                context: context.into(),
                source,
            },
        }
    }

    /// Short category name, used as a metrics label
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            EnvGroupError::Invalid(_) => "invalid",
            EnvGroupError::NotFound { .. } => "not_found",
            EnvGroupError::Conflict { .. } => "conflict",
            EnvGroupError::Precondition { .. } => "precondition",
            EnvGroupError::DeadlineExceeded => "deadline_exceeded",
            EnvGroupError::Internal { .. } => "internal",
        }
    }

    /// Whether the caller may retry the same request after a backoff
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            EnvGroupError::Conflict { .. } | EnvGroupError::DeadlineExceeded
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::RecordKind;

    #[test]
    fn test_store_invalid_maps_to_invalid() {
        let err = EnvGroupError::from_store(
            "creating db.1",
            StoreError::Invalid("name too long".to_string()),
        );
        assert!(matches!(err, EnvGroupError::Invalid(ref r) if r == "name too long"));
        assert_eq!(err.kind(), "invalid");
    }

    #[test]
    fn test_unexpected_store_error_maps_to_internal() {
        let err = EnvGroupError::from_store(
            "listing versions of db",
            StoreError::NotFound {
                kind: RecordKind::Namespace,
                namespace: "x".to_string(),
                name: "x".to_string(),
            },
        );
        assert_eq!(err.kind(), "internal");
        assert_eq!(err.to_string(), "listing versions of db");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_precondition_message_includes_count() {
        let err = EnvGroupError::Precondition {
            name: "db".to_string(),
            count: 3,
        };
        assert_eq!(err.to_string(), "environment group db is linked to 3 workload(s)");
        assert!(!err.is_retryable());
    }
}
