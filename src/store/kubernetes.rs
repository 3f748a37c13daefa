//! # Kubernetes Store
//!
//! [`BackingStore`] on top of the Kubernetes API:
//! - plain records are `ConfigMap`s
//! - secret records are `Opaque` `Secret`s
//! - services are `apps/v1 Deployment`s, scheduled jobs are `batch/v1 CronJob`s
//!
//! API status codes map onto store errors: 404 is `NotFound`, 409 is
//! `AlreadyExists`, 400/422 are `Invalid`. Everything else is passed through.

use super::{
    BackingStore, LabelSelector, Labels, PlainRecord, RecordKind, Scope, SecretData,
    SecretRecord, StoreError, Workload, WorkloadKind,
};
use crate::constants::ANNOTATION_CREATED_AT;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::apps::v1::Deployment;
use k8s_openapi::api::batch::v1::CronJob;
use k8s_openapi::api::core::v1::{ConfigMap, Namespace, Secret};
use k8s_openapi::apimachinery::pkg::apis::meta::v1::ObjectMeta;
use k8s_openapi::ByteString;
use kube::api::{Api, DeleteParams, ListParams, PostParams};
use kube::Client;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Kubernetes-backed store
#[derive(Clone)]
pub struct KubeStore {
    client: Client,
}

impl std::fmt::Debug for KubeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KubeStore").finish_non_exhaustive()
    }
}

impl KubeStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    fn config_maps(&self, scope: Scope<'_>) -> Api<ConfigMap> {
        match scope {
            Scope::Namespace(ns) => Api::namespaced(self.client.clone(), ns),
            Scope::All => Api::all(self.client.clone()),
        }
    }

    fn secrets(&self, scope: Scope<'_>) -> Api<Secret> {
        match scope {
            Scope::Namespace(ns) => Api::namespaced(self.client.clone(), ns),
            Scope::All => Api::all(self.client.clone()),
        }
    }
}

/// Map a Kubernetes API error onto the store's error categories
fn map_kube_error(err: kube::Error, kind: RecordKind, namespace: &str, name: &str) -> StoreError {
    match err {
        kube::Error::Api(api_err) if api_err.code == 404 => StoreError::NotFound {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        },
        kube::Error::Api(api_err) if api_err.code == 409 => StoreError::AlreadyExists {
            kind,
            namespace: namespace.to_string(),
            name: name.to_string(),
        },
        kube::Error::Api(api_err) if api_err.code == 400 || api_err.code == 422 => {
            StoreError::Invalid(format!("{kind} {namespace}/{name}: {}", api_err.message))
        }
        other => StoreError::Kube(other),
    }
}

fn record_meta(
    namespace: &str,
    name: &str,
    labels: &Labels,
    created_at: Option<DateTime<Utc>>,
) -> ObjectMeta {
    ObjectMeta {
        name: Some(name.to_string()),
        namespace: Some(namespace.to_string()),
        labels: Some(labels.clone()),
        annotations: created_at.map(|ts| {
            BTreeMap::from([(ANNOTATION_CREATED_AT.to_string(), ts.to_rfc3339())])
        }),
        ..ObjectMeta::default()
    }
}

fn created_at_from(meta: &ObjectMeta) -> Option<DateTime<Utc>> {
    meta.annotations
        .as_ref()
        .and_then(|a| a.get(ANNOTATION_CREATED_AT))
        .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
        .map(|ts| ts.with_timezone(&Utc))
}

fn plain_from(cm: ConfigMap) -> PlainRecord {
    let created_at = created_at_from(&cm.metadata);
    PlainRecord {
        namespace: cm.metadata.namespace.unwrap_or_default(),
        name: cm.metadata.name.unwrap_or_default(),
        labels: cm.metadata.labels.unwrap_or_default(),
        created_at,
        data: cm.data.unwrap_or_default(),
    }
}

fn secret_from(secret: Secret) -> SecretRecord {
    let created_at = created_at_from(&secret.metadata);
    let mut data: SecretData = secret
        .data
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, v.0))
        .collect();
    // stringData is write-only on the API server, but tolerate it from fakes
    for (k, v) in secret.string_data.unwrap_or_default() {
        data.insert(k, v.into_bytes());
    }
    SecretRecord {
        namespace: secret.metadata.namespace.unwrap_or_default(),
        name: secret.metadata.name.unwrap_or_default(),
        labels: secret.metadata.labels.unwrap_or_default(),
        created_at,
        data,
    }
}

/// Labels the workload's pods carry: object labels overlaid with pod-template labels
fn pod_labels(object: Option<&ObjectMeta>, template: Option<&ObjectMeta>) -> Labels {
    let mut labels = object
        .and_then(|m| m.labels.clone())
        .unwrap_or_default();
    if let Some(template_labels) = template.and_then(|m| m.labels.as_ref()) {
        labels.extend(template_labels.clone());
    }
    labels
}

fn workload_from_deployment(deployment: &Deployment) -> Workload {
    let template = deployment
        .spec
        .as_ref()
        .and_then(|s| s.template.metadata.as_ref());
    Workload {
        kind: WorkloadKind::Service,
        name: deployment.metadata.name.clone().unwrap_or_default(),
        namespace: deployment.metadata.namespace.clone().unwrap_or_default(),
        labels: pod_labels(Some(&deployment.metadata), template),
    }
}

fn workload_from_cron_job(cron_job: &CronJob) -> Workload {
    let template = cron_job
        .spec
        .as_ref()
        .and_then(|s| s.job_template.spec.as_ref())
        .and_then(|s| s.template.metadata.as_ref());
    Workload {
        kind: WorkloadKind::ScheduledJob,
        name: cron_job.metadata.name.clone().unwrap_or_default(),
        namespace: cron_job.metadata.namespace.clone().unwrap_or_default(),
        labels: pod_labels(Some(&cron_job.metadata), template),
    }
}

#[async_trait]
impl BackingStore for KubeStore {
    async fn put_plain(
        &self,
        namespace: &str,
        name: &str,
        labels: &Labels,
        created_at: Option<DateTime<Utc>>,
        data: &BTreeMap<String, String>,
    ) -> Result<(), StoreError> {
        let cm = ConfigMap {
            metadata: record_meta(namespace, name, labels, created_at),
            data: Some(data.clone()),
            ..ConfigMap::default()
        };
        self.config_maps(Scope::Namespace(namespace))
            .create(&PostParams::default(), &cm)
            .await
            .map_err(|e| map_kube_error(e, RecordKind::Plain, namespace, name))?;
        debug!("Created ConfigMap {}/{}", namespace, name);
        Ok(())
    }

    async fn put_secret(
        &self,
        namespace: &str,
        name: &str,
        labels: &Labels,
        created_at: Option<DateTime<Utc>>,
        data: &SecretData,
    ) -> Result<(), StoreError> {
        let secret = Secret {
            metadata: record_meta(namespace, name, labels, created_at),
            type_: Some("Opaque".to_string()),
            data: Some(
                data.iter()
                    .map(|(k, v)| (k.to_string(), ByteString(v.to_vec())))
                    .collect(),
            ),
            ..Secret::default()
        };
        self.secrets(Scope::Namespace(namespace))
            .create(&PostParams::default(), &secret)
            .await
            .map_err(|e| map_kube_error(e, RecordKind::Secret, namespace, name))?;
        debug!("Created Secret {}/{}", namespace, name);
        Ok(())
    }

    async fn get_plain(&self, namespace: &str, name: &str) -> Result<PlainRecord, StoreError> {
        self.config_maps(Scope::Namespace(namespace))
            .get(name)
            .await
            .map(plain_from)
            .map_err(|e| map_kube_error(e, RecordKind::Plain, namespace, name))
    }

    async fn get_secret(&self, namespace: &str, name: &str) -> Result<SecretRecord, StoreError> {
        self.secrets(Scope::Namespace(namespace))
            .get(name)
            .await
            .map(secret_from)
            .map_err(|e| map_kube_error(e, RecordKind::Secret, namespace, name))
    }

    async fn list_plain(
        &self,
        scope: Scope<'_>,
        selector: &LabelSelector,
    ) -> Result<Vec<PlainRecord>, StoreError> {
        let params = ListParams::default().labels(&selector.to_string());
        let list = self.config_maps(scope).list(&params).await?;
        Ok(list.items.into_iter().map(plain_from).collect())
    }

    async fn list_secret(
        &self,
        scope: Scope<'_>,
        selector: &LabelSelector,
    ) -> Result<Vec<SecretRecord>, StoreError> {
        let params = ListParams::default().labels(&selector.to_string());
        let list = self.secrets(scope).list(&params).await?;
        Ok(list.items.into_iter().map(secret_from).collect())
    }

    async fn delete_plain(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.config_maps(Scope::Namespace(namespace))
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| map_kube_error(e, RecordKind::Plain, namespace, name))?;
        debug!("Deleted ConfigMap {}/{}", namespace, name);
        Ok(())
    }

    async fn delete_secret(&self, namespace: &str, name: &str) -> Result<(), StoreError> {
        self.secrets(Scope::Namespace(namespace))
            .delete(name, &DeleteParams::default())
            .await
            .map_err(|e| map_kube_error(e, RecordKind::Secret, namespace, name))?;
        debug!("Deleted Secret {}/{}", namespace, name);
        Ok(())
    }

    async fn ensure_namespace(&self, namespace: &str) -> Result<(), StoreError> {
        let api: Api<Namespace> = Api::all(self.client.clone());
        match api.get(namespace).await {
            Ok(_) => return Ok(()),
            Err(kube::Error::Api(api_err)) if api_err.code == 404 => {}
            Err(e) => return Err(map_kube_error(e, RecordKind::Namespace, namespace, namespace)),
        }

        let ns = Namespace {
            metadata: ObjectMeta {
                name: Some(namespace.to_string()),
                ..ObjectMeta::default()
            },
            ..Namespace::default()
        };
        match api.create(&PostParams::default(), &ns).await {
            Ok(_) => {
                info!("Created namespace {}", namespace);
                Ok(())
            }
            // Lost a race with another creator - the namespace exists, which is all we need
            Err(kube::Error::Api(api_err)) if api_err.code == 409 => Ok(()),
            Err(e) => Err(map_kube_error(e, RecordKind::Namespace, namespace, namespace)),
        }
    }

    async fn list_workloads(&self, selector: &LabelSelector) -> Result<Vec<Workload>, StoreError> {
        // Link labels live on pod templates, which server-side selectors cannot
        // see, so selection happens here.
        let deployments: Api<Deployment> = Api::all(self.client.clone());
        let cron_jobs: Api<CronJob> = Api::all(self.client.clone());
        let params = ListParams::default();

        let (deployments, cron_jobs) =
            futures::try_join!(deployments.list(&params), cron_jobs.list(&params))?;

        let workloads = deployments
            .items
            .iter()
            .map(workload_from_deployment)
            .chain(cron_jobs.items.iter().map(workload_from_cron_job))
            .filter(|w| selector.matches(&w.labels))
            .collect();
        Ok(workloads)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::api::apps::v1::DeploymentSpec;
    use k8s_openapi::api::batch::v1::{CronJobSpec, JobSpec, JobTemplateSpec};
    use k8s_openapi::api::core::v1::PodTemplateSpec;

    fn meta_with_labels(name: &str, namespace: &str, labels: &[(&str, &str)]) -> ObjectMeta {
        ObjectMeta {
            name: Some(name.to_string()),
            namespace: Some(namespace.to_string()),
            labels: Some(
                labels
                    .iter()
                    .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                    .collect(),
            ),
            ..ObjectMeta::default()
        }
    }

    #[test]
    fn test_record_meta_carries_labels_and_timestamp() {
        let labels: Labels = [("environmentGroupName".to_string(), "db".to_string())].into();
        let ts = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let meta = record_meta("porter-env-group", "db.1", &labels, Some(ts));

        assert_eq!(meta.name.as_deref(), Some("db.1"));
        assert_eq!(meta.labels.as_ref(), Some(&labels));
        assert_eq!(created_at_from(&meta), Some(ts));
    }

    #[test]
    fn test_secret_conversion_keeps_bytes() {
        let secret = Secret {
            metadata: meta_with_labels("db.1", "ns", &[]),
            data: Some(BTreeMap::from([(
                "PASS".to_string(),
                ByteString(b"s3cr3t".to_vec()),
            )])),
            ..Secret::default()
        };
        let record = secret_from(secret);
        assert_eq!(record.data.get("PASS"), Some(&b"s3cr3t"[..]));
        assert_eq!(record.created_at, None);
    }

    #[test]
    fn test_deployment_uses_pod_template_labels() {
        let deployment = Deployment {
            metadata: meta_with_labels("api", "app-ns", &[("app", "api")]),
            spec: Some(DeploymentSpec {
                template: PodTemplateSpec {
                    metadata: Some(meta_with_labels(
                        "",
                        "",
                        &[("linkedEnvironmentGroup", "db,cache")],
                    )),
                    spec: None,
                },
                ..DeploymentSpec::default()
            }),
            ..Deployment::default()
        };

        let workload = workload_from_deployment(&deployment);
        assert_eq!(workload.kind, WorkloadKind::Service);
        assert_eq!(workload.namespace, "app-ns");
        assert_eq!(
            workload.labels.get("linkedEnvironmentGroup").map(String::as_str),
            Some("db,cache")
        );
        assert_eq!(workload.labels.get("app").map(String::as_str), Some("api"));
    }

    #[test]
    fn test_cron_job_uses_job_pod_template_labels() {
        let cron_job = CronJob {
            metadata: meta_with_labels("nightly", "app-ns", &[]),
            spec: Some(CronJobSpec {
                schedule: "0 0 * * *".to_string(),
                job_template: JobTemplateSpec {
                    metadata: None,
                    spec: Some(JobSpec {
                        template: PodTemplateSpec {
                            metadata: Some(meta_with_labels(
                                "",
                                "",
                                &[("linkedEnvironmentGroup", "db")],
                            )),
                            spec: None,
                        },
                        ..JobSpec::default()
                    }),
                },
                ..CronJobSpec::default()
            }),
            ..CronJob::default()
        };

        let workload = workload_from_cron_job(&cron_job);
        assert_eq!(workload.kind, WorkloadKind::ScheduledJob);
        assert!(LabelSelector::new()
            .eq("linkedEnvironmentGroup", "db")
            .matches(&workload.labels));
    }
}
