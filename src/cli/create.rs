//! # Create Command
//!
//! Writes a new version of an environment group to the canonical namespace.

use anyhow::{Context, Result};
use env_group_engine::prelude::*;

pub async fn create_command(
    engine: &EnvGroupEngine,
    deadline: Deadline,
    name: String,
    plain: Vec<(String, String)>,
    secret: Vec<(String, String)>,
) -> Result<()> {
    let mut group = EnvironmentGroup::new(name);
    for (key, value) in plain {
        group = group.with_plain(key, value);
    }
    for (key, value) in secret {
        group = group.with_secret(key, value);
    }

    let version = engine
        .create_or_update_base_group(deadline, &group)
        .await
        .with_context(|| format!("Failed to create a new version of '{}'", group.name))?;

    println!(
        "Created environment group '{}' version {} in namespace '{}'",
        group.name,
        version,
        engine.canonical_namespace()
    );
    Ok(())
}
