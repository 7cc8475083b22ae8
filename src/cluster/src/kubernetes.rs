//! Kubernetes-backed [`ClusterClient`].

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use k8s_openapi::api::apps::v1::{Deployment, ReplicaSet, StatefulSet};
use k8s_openapi::api::core::v1::PodTemplateSpec;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::{LabelSelector, ObjectMeta};
use kube::api::{Api, ListParams};
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Client, Config};

use crate::client::ClusterClient;
use crate::error::ClusterError;
use crate::model::{Revision, Workload, WorkloadKind};

const API_TIMEOUT: Duration = Duration::from_secs(30);

/// Lists `apps/v1` workloads through the Kubernetes API.
pub struct KubeClusterClient {
    client: Client,
}

impl KubeClusterClient {
    /// Connect using a kubeconfig file and, optionally, a named context.
    pub async fn from_kubeconfig(path: &Path, context: Option<&str>) -> Result<Self, ClusterError> {
        let kubeconfig_error = |message: String| ClusterError::Kubeconfig {
            path: path.to_path_buf(),
            message,
        };

        let kubeconfig = Kubeconfig::read_from(path).map_err(|e| kubeconfig_error(e.to_string()))?;
        let options = KubeConfigOptions {
            context: context.map(str::to_owned),
            ..KubeConfigOptions::default()
        };
        let mut config = Config::from_custom_kubeconfig(kubeconfig, &options)
            .await
            .map_err(|e| kubeconfig_error(e.to_string()))?;
        config.connect_timeout = Some(API_TIMEOUT);
        config.read_timeout = Some(API_TIMEOUT);

        let client = Client::try_from(config).map_err(|e| ClusterError::Client(e.to_string()))?;
        Ok(Self { client })
    }

    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

fn api_error(resource: &'static str, namespace: &str, error: kube::Error) -> ClusterError {
    ClusterError::Api {
        resource,
        namespace: namespace.to_string(),
        message: error.to_string(),
    }
}

#[async_trait]
impl ClusterClient for KubeClusterClient {
    async fn list_deployments(&self, namespace: &str) -> Result<Vec<Workload>, ClusterError> {
        let api: Api<Deployment> = Api::namespaced(self.client.clone(), namespace);
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|e| api_error("deployments", namespace, e))?;

        Ok(list
            .items
            .iter()
            .map(|deployment| {
                let spec = deployment.spec.as_ref();
                Workload {
                    kind: WorkloadKind::Deployment,
                    name: object_name(&deployment.metadata),
                    images: spec.map(|s| template_images(&s.template)).unwrap_or_default(),
                    created_at: creation_time(&deployment.metadata),
                    selector: spec.and_then(|s| render_selector(&s.selector)),
                }
            })
            .collect())
    }

    async fn list_replica_sets(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<Revision>, ClusterError> {
        let api: Api<ReplicaSet> = Api::namespaced(self.client.clone(), namespace);
        let list = api
            .list(&ListParams::default().labels(selector))
            .await
            .map_err(|e| api_error("replicasets", namespace, e))?;

        Ok(list
            .items
            .iter()
            .map(|replica_set| Revision {
                images: replica_set
                    .spec
                    .as_ref()
                    .and_then(|s| s.template.as_ref())
                    .map(template_images)
                    .unwrap_or_default(),
                created_at: creation_time(&replica_set.metadata),
            })
            .collect())
    }

    async fn list_stateful_sets(&self, namespace: &str) -> Result<Vec<Workload>, ClusterError> {
        let api: Api<StatefulSet> = Api::namespaced(self.client.clone(), namespace);
        let list = api
            .list(&ListParams::default())
            .await
            .map_err(|e| api_error("statefulsets", namespace, e))?;

        Ok(list
            .items
            .iter()
            .map(|stateful_set| Workload {
                kind: WorkloadKind::StatefulSet,
                name: object_name(&stateful_set.metadata),
                images: stateful_set
                    .spec
                    .as_ref()
                    .map(|s| template_images(&s.template))
                    .unwrap_or_default(),
                created_at: creation_time(&stateful_set.metadata),
                selector: None,
            })
            .collect())
    }
}

fn object_name(meta: &ObjectMeta) -> String {
    meta.name.clone().unwrap_or_default()
}

fn creation_time(meta: &ObjectMeta) -> DateTime<Utc> {
    meta.creation_timestamp
        .as_ref()
        .map(|time| time.0)
        .unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
}

fn template_images(template: &PodTemplateSpec) -> Vec<String> {
    template
        .spec
        .as_ref()
        .map(|pod| {
            pod.containers
                .iter()
                .filter_map(|container| container.image.clone())
                .collect()
        })
        .unwrap_or_default()
}

/// Renders a label selector as a list-query string
/// (`app=web,tier in (a,b),!legacy`).
///
/// Returns `None` for an empty selector or an unknown operator: neither
/// identifies a workload's own revisions.
pub fn render_selector(selector: &LabelSelector) -> Option<String> {
    let mut terms = Vec::new();

    if let Some(labels) = &selector.match_labels {
        terms.extend(labels.iter().map(|(key, value)| format!("{key}={value}")));
    }

    for requirement in selector.match_expressions.iter().flatten() {
        let values = requirement
            .values
            .as_deref()
            .unwrap_or_default()
            .join(",");
        let term = match requirement.operator.as_str() {
            "In" => format!("{} in ({values})", requirement.key),
            "NotIn" => format!("{} notin ({values})", requirement.key),
            "Exists" => requirement.key.clone(),
            "DoesNotExist" => format!("!{}", requirement.key),
            other => {
                tracing::warn!(
                    key = %requirement.key,
                    operator = %other,
                    "Unsupported label selector operator"
                );
                return None;
            }
        };
        terms.push(term);
    }

    if terms.is_empty() {
        None
    } else {
        Some(terms.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k8s_openapi::apimachinery::pkg::apis::meta::v1::LabelSelectorRequirement;
    use std::collections::BTreeMap;

    fn requirement(key: &str, operator: &str, values: Option<Vec<&str>>) -> LabelSelectorRequirement {
        LabelSelectorRequirement {
            key: key.to_string(),
            operator: operator.to_string(),
            values: values.map(|v| v.into_iter().map(str::to_owned).collect()),
        }
    }

    #[test]
    fn test_render_match_labels() {
        let selector = LabelSelector {
            match_labels: Some(BTreeMap::from([
                ("app".to_string(), "web".to_string()),
                ("tier".to_string(), "frontend".to_string()),
            ])),
            match_expressions: None,
        };

        assert_eq!(
            render_selector(&selector).as_deref(),
            Some("app=web,tier=frontend")
        );
    }

    #[test]
    fn test_render_match_expressions() {
        let selector = LabelSelector {
            match_labels: Some(BTreeMap::from([("app".to_string(), "api".to_string())])),
            match_expressions: Some(vec![
                requirement("env", "In", Some(vec!["dev", "qa"])),
                requirement("track", "NotIn", Some(vec!["canary"])),
                requirement("owner", "Exists", None),
                requirement("legacy", "DoesNotExist", None),
            ]),
        };

        assert_eq!(
            render_selector(&selector).as_deref(),
            Some("app=api,env in (dev,qa),track notin (canary),owner,!legacy")
        );
    }

    #[test]
    fn test_empty_selector_is_rejected() {
        assert_eq!(render_selector(&LabelSelector::default()), None);
    }

    #[test]
    fn test_unknown_operator_is_rejected() {
        let selector = LabelSelector {
            match_labels: None,
            match_expressions: Some(vec![requirement("app", "Like", Some(vec!["web"]))]),
        };
        assert_eq!(render_selector(&selector), None);
    }

    #[test]
    fn test_missing_creation_time_falls_back_to_epoch() {
        assert_eq!(creation_time(&ObjectMeta::default()), DateTime::<Utc>::UNIX_EPOCH);
    }
}
