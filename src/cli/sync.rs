//! # Sync Command
//!
//! Copies the latest version of an environment group into a namespace.

use crate::output::{self, SyncView, ViewOptions};
use anyhow::{Context, Result};
use env_group_engine::prelude::*;

pub async fn sync_command(
    engine: &EnvGroupEngine,
    deadline: Deadline,
    name: &str,
    target_namespace: &str,
    view: ViewOptions,
) -> Result<()> {
    let synced = engine
        .sync_latest_version_to_namespace(deadline, name, target_namespace)
        .await
        .with_context(|| format!("Failed to sync '{name}' to namespace '{target_namespace}'"))?;

    // Only reachable with an empty group name
    let Some(synced) = synced else {
        println!("Nothing to sync.");
        return Ok(());
    };

    match output::structured(&SyncView::from(&synced), view.format)? {
        Some(text) => println!("{text}"),
        None if synced.created => println!(
            "Synced '{}' version {} to namespace '{}' as {}",
            synced.group, synced.version, synced.namespace, synced.record_name
        ),
        None => println!(
            "'{}' version {} is already present in namespace '{}' as {}",
            synced.group, synced.version, synced.namespace, synced.record_name
        ),
    }
    Ok(())
}
