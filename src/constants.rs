//! # Constants
//!
//! Label schema and defaults shared by the engine, the stores and the CLI.
//!
//! Defaults can be overridden through [`crate::config::EngineConfig`].

/// Label carrying the logical group name on every plain and secret record
pub const LABEL_GROUP_NAME: &str = "environmentGroupName";

/// Label carrying the decimal version number on every plain and secret record
pub const LABEL_GROUP_VERSION: &str = "environmentGroupVersion";

/// Label set on workload pod templates to link them to one or more groups
pub const LABEL_LINKED_GROUP: &str = "linkedEnvironmentGroup";

/// Separator between group names inside a [`LABEL_LINKED_GROUP`] value
pub const LINKED_GROUP_SEPARATOR: char = ',';

/// Annotation holding the informational creation timestamp (RFC 3339)
pub const ANNOTATION_CREATED_AT: &str = "environmentGroupCreatedAtUtc";

/// Reserved namespace holding the authoritative version history
pub const DEFAULT_CANONICAL_NAMESPACE: &str = "porter-env-group";

/// How many times a writer re-reads the max version after losing a name collision
pub const DEFAULT_VERSION_ALLOCATION_ATTEMPTS: u32 = 5;

/// First delay between version allocation attempts (milliseconds)
pub const DEFAULT_ALLOCATION_BACKOFF_START_MS: u64 = 10;

/// Cap on the delay between version allocation attempts (milliseconds)
pub const DEFAULT_ALLOCATION_BACKOFF_MAX_MS: u64 = 250;

/// Deadline applied by the CLI to a single engine operation (seconds)
pub const DEFAULT_OPERATION_TIMEOUT_SECS: u64 = 30;
