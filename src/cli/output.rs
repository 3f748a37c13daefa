//! # Output
//!
//! Table, JSON and YAML rendering. Secret values are only ever printed in
//! structured output, base64-encoded, and only with `--show-secrets`.

use anyhow::Result;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use clap::ValueEnum;
use env_group_engine::prelude::*;
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Yaml,
}

#[derive(Clone, Copy, Debug)]
pub struct ViewOptions {
    pub format: OutputFormat,
    pub show_secrets: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VersionView {
    pub name: String,
    pub version: u64,
    pub namespace: String,
    pub record_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at_utc: Option<String>,
    pub plain: BTreeMap<String, String>,
    pub secret_keys: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<BTreeMap<String, String>>,
}

impl VersionView {
    pub fn new(version: &Version, show_secrets: bool) -> Self {
        Self {
            name: version.name.clone(),
            version: version.version,
            namespace: version.namespace.clone(),
            record_name: version.record_name.clone(),
            created_at_utc: version.created_at_utc.map(|t| t.to_rfc3339()),
            plain: version.plain.clone(),
            secret_keys: version.secret.keys().map(str::to_string).collect(),
            secret: show_secrets.then(|| {
                version
                    .secret
                    .iter()
                    .map(|(k, v)| (k.to_string(), STANDARD.encode(v)))
                    .collect()
            }),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LinkedView {
    pub name: String,
    pub namespace: String,
}

impl From<&LinkedWorkload> for LinkedView {
    fn from(workload: &LinkedWorkload) -> Self {
        Self {
            name: workload.name.clone(),
            namespace: workload.namespace.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncView {
    pub group: String,
    pub version: u64,
    pub namespace: String,
    pub record_name: String,
    pub created: bool,
}

impl From<&SyncedVersion> for SyncView {
    fn from(synced: &SyncedVersion) -> Self {
        Self {
            group: synced.group.clone(),
            version: synced.version,
            namespace: synced.namespace.clone(),
            record_name: synced.record_name.clone(),
            created: synced.created,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionView {
    pub name: String,
    pub canonical_versions: usize,
    pub records_deleted: usize,
}

/// Serialize `value` as JSON or YAML; `None` for table output
pub fn structured<T: Serialize>(value: &T, format: OutputFormat) -> Result<Option<String>> {
    match format {
        OutputFormat::Table => Ok(None),
        OutputFormat::Json => Ok(Some(serde_json::to_string_pretty(value)?)),
        OutputFormat::Yaml => Ok(Some(serde_yaml::to_string(value)?)),
    }
}

/// Detail view of one version; secret values are never shown in a table
pub fn version_table(version: &Version) -> String {
    let mut out = String::new();
    out.push_str(&format!("Name:       {}\n", version.name));
    out.push_str(&format!("Version:    {}\n", version.version));
    out.push_str(&format!("Namespace:  {}\n", version.namespace));
    out.push_str(&format!("Record:     {}\n", version.record_name));
    if let Some(created) = version.created_at_utc {
        out.push_str(&format!("Created:    {}\n", created.to_rfc3339()));
    }
    out.push_str("\nPlain variables:\n");
    if version.plain.is_empty() {
        out.push_str("  <none>\n");
    }
    for (key, value) in &version.plain {
        out.push_str(&format!("  {key}={value}\n"));
    }
    out.push_str("\nSecret variables:\n");
    if version.secret.is_empty() {
        out.push_str("  <none>\n");
    }
    for key in version.secret.keys() {
        out.push_str(&format!("  {key}=********\n"));
    }
    out
}

/// One row per version
pub fn versions_table(versions: &[Version]) -> String {
    let mut out = format!(
        "{:<30} {:<10} {:<28} {:<8} {:<8}\n",
        "NAME", "VERSION", "CREATED", "PLAIN", "SECRET"
    );
    out.push_str(&"-".repeat(88));
    out.push('\n');
    for v in versions {
        let created = v
            .created_at_utc
            .map_or_else(|| "-".to_string(), |t| t.to_rfc3339());
        out.push_str(&format!(
            "{:<30} {:<10} {:<28} {:<8} {:<8}\n",
            v.name,
            v.version,
            created,
            v.plain.len(),
            v.secret.len()
        ));
    }
    out
}

pub fn linked_table(workloads: &[LinkedWorkload]) -> String {
    let mut out = format!("{:<40} {:<30}\n", "NAME", "NAMESPACE");
    out.push_str(&"-".repeat(71));
    out.push('\n');
    for w in workloads {
        out.push_str(&format!("{:<40} {:<30}\n", w.name, w.namespace));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Version {
        Version {
            name: "db".to_string(),
            version: 2,
            namespace: "porter-env-group".to_string(),
            record_name: "db.2".to_string(),
            plain: BTreeMap::from([("HOST".to_string(), "pg".to_string())]),
            secret: SecretData::new().with("PASS", "s3cr3t"),
            created_at_utc: None,
        }
    }

    #[test]
    fn test_secret_values_hidden_by_default() {
        let view = VersionView::new(&sample(), false);
        let json = structured(&view, OutputFormat::Json).unwrap().unwrap();
        assert!(json.contains("\"secretKeys\""));
        assert!(json.contains("PASS"));
        assert!(!json.contains("s3cr3t"));
        assert!(!json.contains("czNjcjN0"));
    }

    #[test]
    fn test_secret_values_base64_with_show_secrets() {
        let view = VersionView::new(&sample(), true);
        let yaml = structured(&view, OutputFormat::Yaml).unwrap().unwrap();
        assert!(yaml.contains("PASS: czNjcjN0"));
        assert!(!yaml.contains("s3cr3t"));
    }

    #[test]
    fn test_table_masks_secrets() {
        let table = version_table(&sample());
        assert!(table.contains("HOST=pg"));
        assert!(table.contains("PASS=********"));
        assert!(!table.contains("s3cr3t"));
        assert!(structured(&VersionView::new(&sample(), true), OutputFormat::Table)
            .unwrap()
            .is_none());
    }
}
