//! # Read Commands
//!
//! `latest`, `history`, `get` and `list`.

use crate::output::{self, VersionView, ViewOptions};
use anyhow::{Context, Result};
use env_group_engine::prelude::*;

pub async fn latest_command(
    engine: &EnvGroupEngine,
    deadline: Deadline,
    name: &str,
    view: ViewOptions,
) -> Result<()> {
    let latest = engine
        .latest_base_group(deadline, name)
        .await
        .with_context(|| format!("Failed to read environment group '{name}'"))?;

    match latest {
        Some(version) => print_version(&version, view),
        None => {
            println!("Environment group '{name}' has no versions.");
            Ok(())
        }
    }
}

pub async fn history_command(
    engine: &EnvGroupEngine,
    deadline: Deadline,
    name: &str,
    view: ViewOptions,
) -> Result<()> {
    let versions = engine
        .base_group_versions(deadline, name)
        .await
        .with_context(|| format!("Failed to read the history of '{name}'"))?;

    if versions.is_empty() {
        println!("Environment group '{name}' has no versions.");
        return Ok(());
    }
    print_versions(&versions, view)
}

pub async fn get_command(
    engine: &EnvGroupEngine,
    deadline: Deadline,
    name: &str,
    version: u64,
    namespace: Option<String>,
    view: ViewOptions,
) -> Result<()> {
    let namespace = namespace.unwrap_or_else(|| engine.canonical_namespace().to_string());
    let found = engine
        .version_in_namespace(deadline, name, version, &namespace)
        .await
        .with_context(|| {
            format!("Failed to read '{name}' version {version} in namespace '{namespace}'")
        })?;
    print_version(&found, view)
}

pub async fn list_command(
    engine: &EnvGroupEngine,
    deadline: Deadline,
    view: ViewOptions,
) -> Result<()> {
    let groups = engine
        .list_base_groups(deadline)
        .await
        .context("Failed to list environment groups")?;

    if groups.is_empty() {
        println!(
            "No environment groups found in namespace '{}'.",
            engine.canonical_namespace()
        );
        return Ok(());
    }
    print_versions(&groups, view)
}

fn print_version(version: &Version, view: ViewOptions) -> Result<()> {
    match output::structured(&VersionView::new(version, view.show_secrets), view.format)? {
        Some(text) => println!("{text}"),
        None => print!("{}", output::version_table(version)),
    }
    Ok(())
}

fn print_versions(versions: &[Version], view: ViewOptions) -> Result<()> {
    let views: Vec<VersionView> = versions
        .iter()
        .map(|v| VersionView::new(v, view.show_secrets))
        .collect();
    match output::structured(&views, view.format)? {
        Some(text) => println!("{text}"),
        None => print!("{}", output::versions_table(versions)),
    }
    Ok(())
}
