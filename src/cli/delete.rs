//! # Delete Command
//!
//! Deletes an environment group from every namespace once no workload links
//! to it.

use crate::output::{self, DeletionView, ViewOptions};
use anyhow::{bail, Context, Result};
use env_group_engine::prelude::*;

pub async fn delete_command(
    engine: &EnvGroupEngine,
    deadline: Deadline,
    name: &str,
    view: ViewOptions,
) -> Result<()> {
    let summary = match engine.delete_group(deadline, name).await {
        Ok(summary) => summary,
        Err(EnvGroupError::Precondition { count, .. }) => {
            bail!(
                "Environment group '{name}' is still linked to {count} workload(s).\n\
                 Run 'egctl linked {name}' to see them, and remove the \
                 linkedEnvironmentGroup label before deleting."
            );
        }
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to delete environment group '{name}'"))
        }
    };

    let deletion = DeletionView {
        name: name.to_string(),
        canonical_versions: summary.canonical_versions,
        records_deleted: summary.records_deleted,
    };
    match output::structured(&deletion, view.format)? {
        Some(text) => println!("{text}"),
        None => println!(
            "Deleted environment group '{name}' ({} version(s), {} record(s) across all namespaces)",
            summary.canonical_versions, summary.records_deleted
        ),
    }
    Ok(())
}
