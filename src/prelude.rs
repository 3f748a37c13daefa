//! Commonly used types
//!
//! ```rust
//! use env_group_engine::prelude::*;
//! ```

pub use crate::config::EngineConfig;
pub use crate::deadline::Deadline;
pub use crate::engine::EnvGroupEngine;
pub use crate::envgroup::{
    DeletionSummary, EnvironmentGroup, LinkedWorkload, SyncedVersion, Version,
};
pub use crate::error::{EnvGroupError, Result};
pub use crate::store::kubernetes::KubeStore;
pub use crate::store::memory::InMemoryStore;
pub use crate::store::{BackingStore, SecretData};
