//! In-memory registry for tests.
//!
//! Available with the `testing` feature. Projects, repositories and
//! artifacts are returned in insertion order; failures can be injected per
//! scope and every listing/delete call is recorded.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::client::RegistryClient;
use crate::error::RegistryError;
use crate::model::{Artifact, Project, Repository};

/// A recorded `delete_artifact` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteCall {
    pub project: String,
    pub repository: String,
    pub digest: String,
}

#[derive(Default)]
struct State {
    projects: Vec<Project>,
    repositories: HashMap<String, Vec<Repository>>,
    artifacts: HashMap<String, Vec<Artifact>>,
    fail_projects: bool,
    failing_projects: HashSet<String>,
    failing_repositories: HashSet<String>,
    failing_digests: HashSet<String>,
    listed_repositories: Vec<String>,
    delete_calls: Vec<DeleteCall>,
}

/// Deterministic [`RegistryClient`] backed by in-memory state.
pub struct InMemoryRegistry {
    host: String,
    state: Mutex<State>,
}

impl InMemoryRegistry {
    pub fn new(host: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            state: Mutex::new(State::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, State> {
        // A panicking test thread must not hide the state from the others
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Adds a project with no repositories.
    pub fn with_project(self, project: &str) -> Self {
        {
            let mut state = self.state();
            if !state.projects.iter().any(|p| p.name == project) {
                let id = state.projects.len() as i64 + 1;
                state.projects.push(Project::new(id, project));
                state.repositories.insert(project.to_string(), Vec::new());
            }
        }
        self
    }

    /// Adds an artifact to `repository` (full name, `project/repo`),
    /// creating the project and repository as needed.
    pub fn with_artifact(self, project: &str, repository: &str, artifact: Artifact) -> Self {
        let this = self.with_project(project);
        {
            let mut state = this.state();
            let repositories = state.repositories.entry(project.to_string()).or_default();
            if !repositories.iter().any(|r| r.name == repository) {
                repositories.push(Repository::new(repository));
            }
            state
                .artifacts
                .entry(repository.to_string())
                .or_default()
                .push(artifact);
        }
        this
    }

    /// Makes `list_projects` fail.
    pub fn fail_project_listing(self) -> Self {
        self.state().fail_projects = true;
        self
    }

    /// Makes `list_repositories(project)` fail.
    pub fn fail_repository_listing(self, project: &str) -> Self {
        self.state().failing_projects.insert(project.to_string());
        self
    }

    /// Makes `list_artifacts(_, repository)` fail.
    pub fn fail_artifact_listing(self, repository: &str) -> Self {
        self.state()
            .failing_repositories
            .insert(repository.to_string());
        self
    }

    /// Makes deleting `digest` fail.
    pub fn fail_delete(self, digest: &str) -> Self {
        self.state().failing_digests.insert(digest.to_string());
        self
    }

    /// Repositories whose artifacts were listed, in call order.
    pub fn listed_repositories(&self) -> Vec<String> {
        self.state().listed_repositories.clone()
    }

    /// Every delete call, successful or not, in call order.
    pub fn delete_calls(&self) -> Vec<DeleteCall> {
        self.state().delete_calls.clone()
    }

    /// Artifacts currently stored for `repository`.
    pub fn artifacts(&self, repository: &str) -> Vec<Artifact> {
        self.state()
            .artifacts
            .get(repository)
            .cloned()
            .unwrap_or_default()
    }

    fn unavailable(url: String) -> RegistryError {
        RegistryError::Status {
            url,
            status: 503,
            body: "injected failure".to_string(),
        }
    }
}

#[async_trait]
impl RegistryClient for InMemoryRegistry {
    fn host(&self) -> &str {
        &self.host
    }

    async fn list_projects(&self) -> Result<Vec<Project>, RegistryError> {
        let state = self.state();
        if state.fail_projects {
            return Err(Self::unavailable("memory://projects".to_string()));
        }
        Ok(state.projects.clone())
    }

    async fn list_repositories(&self, project: &str) -> Result<Vec<Repository>, RegistryError> {
        let state = self.state();
        if state.failing_projects.contains(project) {
            return Err(Self::unavailable(format!(
                "memory://projects/{project}/repositories"
            )));
        }
        Ok(state.repositories.get(project).cloned().unwrap_or_default())
    }

    async fn list_artifacts(
        &self,
        _project: &str,
        repository: &str,
    ) -> Result<Vec<Artifact>, RegistryError> {
        let mut state = self.state();
        state.listed_repositories.push(repository.to_string());
        if state.failing_repositories.contains(repository) {
            return Err(Self::unavailable(format!(
                "memory://repositories/{repository}/artifacts"
            )));
        }
        Ok(state.artifacts.get(repository).cloned().unwrap_or_default())
    }

    async fn delete_artifact(
        &self,
        project: &str,
        repository: &str,
        digest: &str,
    ) -> Result<(), RegistryError> {
        let mut state = self.state();
        state.delete_calls.push(DeleteCall {
            project: project.to_string(),
            repository: repository.to_string(),
            digest: digest.to_string(),
        });
        if state.failing_digests.contains(digest) {
            return Err(Self::unavailable(format!(
                "memory://repositories/{repository}/artifacts/{digest}"
            )));
        }

        let artifacts = state.artifacts.entry(repository.to_string()).or_default();
        let before = artifacts.len();
        artifacts.retain(|artifact| artifact.digest != digest);
        if artifacts.len() == before {
            return Err(RegistryError::Status {
                url: format!("memory://repositories/{repository}/artifacts/{digest}"),
                status: 404,
                body: "artifact not found".to_string(),
            });
        }
        Ok(())
    }
}
