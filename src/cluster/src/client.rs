use async_trait::async_trait;

use crate::error::ClusterError;
use crate::model::{Revision, Workload};

/// Read access to the workloads of one cluster.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    async fn list_deployments(&self, namespace: &str) -> Result<Vec<Workload>, ClusterError>;

    /// Revisions (ReplicaSets) matching a rendered label selector.
    async fn list_replica_sets(
        &self,
        namespace: &str,
        selector: &str,
    ) -> Result<Vec<Revision>, ClusterError>;

    async fn list_stateful_sets(&self, namespace: &str) -> Result<Vec<Workload>, ClusterError>;
}
