//! # EGCTL CLI
//!
//! Operator command-line interface for environment groups stored in a
//! Kubernetes cluster.
//!
//! ## Usage
//!
//! ```bash
//! # Write a new version of a group
//! egctl create db --plain HOST=pg --secret PASS=s3cr3t
//!
//! # Show the latest version, or the whole history
//! egctl latest db
//! egctl history db
//!
//! # Show one version as materialized in a workload namespace
//! egctl get db 2 --namespace app-ns
//!
//! # List the latest version of every group
//! egctl list
//!
//! # Show workloads linked to a group
//! egctl linked db
//!
//! # Copy the latest version into a namespace
//! egctl sync db app-ns
//!
//! # Delete a group (refused while workloads link to it)
//! egctl delete db
//!
//! # Structured output, including base64 secret values
//! egctl latest db --output json --show-secrets
//! ```

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use env_group_engine::observability::init_logging;
use env_group_engine::prelude::*;
use kube::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

mod create;
mod delete;
mod linked;
mod output;
mod read;
mod sync;

use output::OutputFormat;

/// Environment group CLI
#[derive(Parser)]
#[command(name = "egctl")]
#[command(
    version,
    long_version = concat!(
        env!("CARGO_PKG_VERSION"),
        " (",
        env!("BUILD_GIT_HASH"),
        ", built ",
        env!("BUILD_DATETIME"),
        ")"
    ),
    about = "Manage versioned environment groups in Kubernetes",
    long_about = None,
    after_help = "\
Examples:
  egctl create db --plain HOST=pg --secret PASS=s3cr3t
  egctl history db --output yaml
  egctl sync db app-ns
"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(short, long, value_enum, global = true, default_value = "table")]
    output: OutputFormat,

    /// Include secret values (base64) in json/yaml output
    #[arg(long, global = true)]
    show_secrets: bool,

    /// Canonical namespace (overrides ENV_GROUP_CANONICAL_NAMESPACE)
    #[arg(long, global = true)]
    canonical_namespace: Option<String>,

    /// Deadline for the operation in seconds (overrides ENV_GROUP_OPERATION_TIMEOUT_SECS)
    #[arg(long, global = true)]
    timeout: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a new version of an environment group
    Create {
        /// Environment group name
        #[arg(value_name = "NAME")]
        name: String,

        /// Plain variable as KEY=VALUE (repeatable)
        #[arg(long = "plain", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        plain: Vec<(String, String)>,

        /// Secret variable as KEY=VALUE (repeatable)
        #[arg(long = "secret", value_name = "KEY=VALUE", value_parser = parse_key_value)]
        secret: Vec<(String, String)>,
    },
    /// Show the latest version of an environment group
    Latest {
        #[arg(value_name = "NAME")]
        name: String,
    },
    /// Show every version of an environment group
    History {
        #[arg(value_name = "NAME")]
        name: String,
    },
    /// Show one version of an environment group in a namespace
    Get {
        #[arg(value_name = "NAME")]
        name: String,

        #[arg(value_name = "VERSION")]
        version: u64,

        /// Namespace to read from (default: the canonical namespace)
        #[arg(short, long)]
        namespace: Option<String>,
    },
    /// List the latest version of every environment group
    List,
    /// Show workloads linked to an environment group
    Linked {
        #[arg(value_name = "NAME")]
        name: String,
    },
    /// Delete every version of an environment group in every namespace
    /// Refused while any workload is linked to the group
    Delete {
        #[arg(value_name = "NAME")]
        name: String,
    },
    /// Copy the latest version of an environment group into a namespace
    Sync {
        #[arg(value_name = "NAME")]
        name: String,

        #[arg(value_name = "TARGET_NAMESPACE")]
        target_namespace: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Required for rustls 0.23+ when no default provider is set via features
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_provider| anyhow!("Failed to install rustls crypto provider"))?;

    let cli = Cli::parse();

    let mut config = EngineConfig::from_env();
    if let Some(namespace) = cli.canonical_namespace {
        config = config.with_canonical_namespace(namespace);
    }
    if let Some(secs) = cli.timeout {
        config = config.with_operation_timeout(Duration::from_secs(secs));
    }
    init_logging(&config);
    debug!(
        "egctl {} ({}, built {})",
        env!("CARGO_PKG_VERSION"),
        env!("BUILD_GIT_HASH"),
        env!("BUILD_DATETIME")
    );

    let client = Client::try_default()
        .await
        .context("Failed to create Kubernetes client. Ensure kubeconfig is configured.")?;

    let deadline = Deadline::after(config.operation_timeout());
    let engine = EnvGroupEngine::new(Arc::new(KubeStore::new(client)), config);
    let view = output::ViewOptions {
        format: cli.output,
        show_secrets: cli.show_secrets,
    };

    match cli.command {
        Commands::Create {
            name,
            plain,
            secret,
        } => create::create_command(&engine, deadline, name, plain, secret).await,
        Commands::Latest { name } => read::latest_command(&engine, deadline, &name, view).await,
        Commands::History { name } => read::history_command(&engine, deadline, &name, view).await,
        Commands::Get {
            name,
            version,
            namespace,
        } => read::get_command(&engine, deadline, &name, version, namespace, view).await,
        Commands::List => read::list_command(&engine, deadline, view).await,
        Commands::Linked { name } => linked::linked_command(&engine, deadline, &name, view).await,
        Commands::Delete { name } => delete::delete_command(&engine, deadline, &name, view).await,
        Commands::Sync {
            name,
            target_namespace,
        } => sync::sync_command(&engine, deadline, &name, &target_namespace, view).await,
    }
}

/// Parse a `KEY=VALUE` argument; the value may itself contain `=`
fn parse_key_value(arg: &str) -> std::result::Result<(String, String), String> {
    match arg.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected KEY=VALUE, got '{arg}'")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_key_value() {
        assert_eq!(
            parse_key_value("HOST=pg").unwrap(),
            ("HOST".to_string(), "pg".to_string())
        );
        assert_eq!(
            parse_key_value("URL=postgres://u:p@h/db?a=b").unwrap(),
            ("URL".to_string(), "postgres://u:p@h/db?a=b".to_string())
        );
        assert_eq!(
            parse_key_value("EMPTY=").unwrap(),
            ("EMPTY".to_string(), String::new())
        );
        assert!(parse_key_value("novalue").is_err());
        assert!(parse_key_value("=value").is_err());
    }

    #[test]
    fn test_create_collects_repeated_pairs() {
        let cli = Cli::try_parse_from([
            "egctl", "create", "db", "--plain", "A=1", "--plain", "B=2", "--secret", "S=x",
        ])
        .unwrap();
        match cli.command {
            Commands::Create {
                name,
                plain,
                secret,
            } => {
                assert_eq!(name, "db");
                assert_eq!(plain.len(), 2);
                assert_eq!(secret, vec![("S".to_string(), "x".to_string())]);
            }
            _ => panic!("expected create"),
        }
    }

    #[test]
    fn test_global_output_flag_after_subcommand() {
        let cli = Cli::try_parse_from(["egctl", "latest", "db", "--output", "json", "--show-secrets"])
            .unwrap();
        assert!(matches!(cli.output, OutputFormat::Json));
        assert!(cli.show_secrets);
    }
}
