use async_trait::async_trait;

use crate::error::RegistryError;
use crate::model::{Artifact, Project, Repository};

/// Read and delete access to a container registry.
///
/// Repository arguments are full names as returned by
/// [`RegistryClient::list_repositories`] (`project/repo`).
#[async_trait]
pub trait RegistryClient: Send + Sync {
    /// Registry host without scheme, used to build `host/repo:tag` references.
    fn host(&self) -> &str;

    async fn list_projects(&self) -> Result<Vec<Project>, RegistryError>;

    async fn list_repositories(&self, project: &str) -> Result<Vec<Repository>, RegistryError>;

    async fn list_artifacts(
        &self,
        project: &str,
        repository: &str,
    ) -> Result<Vec<Artifact>, RegistryError>;

    async fn delete_artifact(
        &self,
        project: &str,
        repository: &str,
        digest: &str,
    ) -> Result<(), RegistryError>;
}
