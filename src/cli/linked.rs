//! # Linked Command
//!
//! Lists workloads whose `linkedEnvironmentGroup` label names a group.

use crate::output::{self, LinkedView, ViewOptions};
use anyhow::{Context, Result};
use env_group_engine::prelude::*;

pub async fn linked_command(
    engine: &EnvGroupEngine,
    deadline: Deadline,
    name: &str,
    view: ViewOptions,
) -> Result<()> {
    let workloads = engine
        .linked_applications(deadline, name)
        .await
        .with_context(|| format!("Failed to list workloads linked to '{name}'"))?;

    let views: Vec<LinkedView> = workloads.iter().map(LinkedView::from).collect();
    match output::structured(&views, view.format)? {
        Some(text) => println!("{text}"),
        None if workloads.is_empty() => println!("No workloads are linked to '{name}'."),
        None => print!("{}", output::linked_table(&workloads)),
    }
    Ok(())
}
