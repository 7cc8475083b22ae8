//! In-memory cluster for tests (feature `testing`).

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;

use crate::client::ClusterClient;
use crate::error::ClusterError;
use crate::model::{Revision, Workload};

#[derive(Default)]
struct Namespace {
    deployments: Vec<Workload>,
    replica_sets: Vec<(String, Revision)>,
    stateful_sets: Vec<Workload>,
    fail_deployments: bool,
    fail_stateful_sets: bool,
    failing_selectors: HashSet<String>,
}

/// [`ClusterClient`] serving workloads registered per namespace.
#[derive(Default)]
pub struct InMemoryCluster {
    namespaces: HashMap<String, Namespace>,
}

impl InMemoryCluster {
    pub fn new() -> Self {
        Self::default()
    }

    fn namespace(&mut self, namespace: &str) -> &mut Namespace {
        self.namespaces.entry(namespace.to_string()).or_default()
    }

    pub fn with_deployment(mut self, namespace: &str, workload: Workload) -> Self {
        self.namespace(namespace).deployments.push(workload);
        self
    }

    /// Registers a ReplicaSet returned for the exact `selector` string.
    pub fn with_replica_set(mut self, namespace: &str, selector: &str, revision: Revision) -> Self {
        self.namespace(namespace)
            .replica_sets
            .push((selector.to_string(), revision));
        self
    }

    pub fn with_stateful_set(mut self, namespace: &str, workload: Workload) -> Self {
        self.namespace(namespace).stateful_sets.push(workload);
        self
    }

    pub fn fail_deployment_listing(mut self, namespace: &str) -> Self {
        self.namespace(namespace).fail_deployments = true;
        self
    }

    pub fn fail_stateful_set_listing(mut self, namespace: &str) -> Self {
        self.namespace(namespace).fail_stateful_sets = true;
        self
    }

    pub fn fail_replica_set_listing(mut self, namespace: &str, selector: &str) -> Self {
        self.namespace(namespace)
            .failing_selectors
            .insert(selector.to_string());
        self
    }

    fn injected(resource: &'static str, namespace: &str) -> ClusterError {
        ClusterError::Api {
            resource,
            namespace: namespace.to_string(),
            message: "injected failure".to_string(),
        }
    }
}

#[async_trait]
impl ClusterClient for InMemoryCluster {
    async fn list_deployments(&self, namespace: &str) -> Result<Vec<Workload>, ClusterError> {
        match self.namespaces.get(namespace) {
            Some(ns) if ns.fail_deployments => Err(Self::injected("deployments", namespace)),
            Some(ns) => Ok(ns.deployments.clone()),
            None => Ok(Vec::new()),
        }
    }

    async fn list_replica_sets(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<Revision>, ClusterError> {
        match self.namespaces.get(namespace) {
            Some(ns) if ns.failing_selectors.contains(selector) => {
                Err(Self::injected("replicasets", namespace))
            }
            Some(ns) => Ok(ns
                .replica_sets
                .iter()
                .filter(|(s, _)| s == selector)
                .map(|(_, revision)| revision.clone())
                .collect()),
            None => Ok(Vec::new()),
        }
    }

    async fn list_stateful_sets(&self, namespace: &str) -> Result<Vec<Workload>, ClusterError> {
        match self.namespaces.get(namespace) {
            Some(ns) if ns.fail_stateful_sets => Err(Self::injected("statefulsets", namespace)),
            Some(ns) => Ok(ns.stateful_sets.clone()),
            None => Ok(Vec::new()),
        }
    }
}
