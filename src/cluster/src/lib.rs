//! Cluster access for harbor-reaper: which images do live workloads run,
//! and which did their recent revisions run.

pub mod client;
pub mod error;
pub mod kubernetes;
pub mod model;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use client::ClusterClient;
pub use error::ClusterError;
pub use kubernetes::KubeClusterClient;
pub use model::{Revision, Workload, WorkloadKind};
