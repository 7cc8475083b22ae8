//! Retention Enforcement Engine
//!
//! Walks the registry depth-first (projects, repositories, artifacts), asks
//! a [`RetentionPolicy`] for decisions and applies them.
//!
//! ## Safety Guarantees
//!
//! - Dry-run mode classifies exactly as a live run but issues no deletes
//! - Repositories a policy does not select are never listed
//! - A failed delete is recorded and the run continues
//! - Live deletes are paced by a fixed interval

use std::sync::Arc;

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, error, info, warn};

use registry::{Project, RegistryClient, RegistryError};

use super::config::RetentionConfig;
use super::metrics::{MetricsSummary, RetentionMetrics};
use super::policy::{Action, Decision, RepositoryScope, RetentionPolicy};
use crate::audit::{AuditRecord, AuditStatus, ReportLayout};

/// Failures that abort a run.
#[derive(Debug, Error)]
pub enum EnforcerError {
    #[error("failed to list projects: {0}")]
    ListProjects(#[source] RegistryError),
}

/// Result of a complete cleanup run
#[derive(Debug, Clone)]
pub struct CleanupRun {
    pub policy: &'static str,
    pub layout: ReportLayout,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
    /// One per evaluated artifact, in evaluation order
    pub records: Vec<AuditRecord>,
    pub summary: MetricsSummary,
    /// Scopes skipped because a listing failed
    pub errors: Vec<String>,
}

/// Applies retention policies to a registry.
pub struct RetentionEnforcer {
    registry: Arc<dyn RegistryClient>,
    config: RetentionConfig,
    metrics: RetentionMetrics,
}

impl RetentionEnforcer {
    pub fn new(registry: Arc<dyn RegistryClient>, config: RetentionConfig) -> Self {
        Self::with_metrics(registry, config, RetentionMetrics::new())
    }

    pub fn with_metrics(
        registry: Arc<dyn RegistryClient>,
        config: RetentionConfig,
        metrics: RetentionMetrics,
    ) -> Self {
        Self {
            registry,
            config,
            metrics,
        }
    }

    pub fn metrics(&self) -> &RetentionMetrics {
        &self.metrics
    }

    /// Runs `policy` over every whitelisted project.
    ///
    /// Only a failure to list projects aborts the run; failures to list a
    /// project's repositories or a repository's artifacts skip that scope.
    /// The returned summary covers this run only; [`Self::metrics`] keeps
    /// accumulating across runs.
    pub async fn enforce(&self, policy: &dyn RetentionPolicy) -> Result<CleanupRun, EnforcerError> {
        let started_at = Utc::now();
        let baseline = self.metrics.summary(self.config.dry_run);

        info!(
            policy = policy.name(),
            host = %self.registry.host(),
            dry_run = self.config.dry_run,
            "Starting cleanup run"
        );

        let projects = self
            .registry
            .list_projects()
            .await
            .map_err(EnforcerError::ListProjects)?;

        let mut records = Vec::new();
        let mut errors = Vec::new();

        for project in &projects {
            if !self.config.project_allowed(&project.name) {
                info!(project = %project.name, "Skipping project (not in whitelist)");
                self.metrics.record_projects_skipped(1);
                continue;
            }

            if let Err(e) = self
                .enforce_project(policy, project, &mut records, &mut errors)
                .await
            {
                warn!(
                    project = %project.name,
                    error = %e,
                    "Failed to list repositories, skipping project"
                );
                self.metrics.record_projects_failed(1);
                errors.push(format!(
                    "Failed to list repositories for project {}: {}",
                    project.name, e
                ));
            }
        }

        let completed_at = Utc::now();
        let summary = self.metrics.summary(self.config.dry_run).since(&baseline);

        info!(
            policy = policy.name(),
            records = records.len(),
            deleted = summary.artifacts_deleted,
            delete_failures = summary.delete_failures,
            duration_ms = (completed_at - started_at).num_milliseconds(),
            "Cleanup run completed"
        );

        Ok(CleanupRun {
            policy: policy.name(),
            layout: policy.report_layout(),
            started_at,
            completed_at,
            records,
            summary,
            errors,
        })
    }

    async fn enforce_project(
        &self,
        policy: &dyn RetentionPolicy,
        project: &Project,
        records: &mut Vec<AuditRecord>,
        errors: &mut Vec<String>,
    ) -> Result<(), RegistryError> {
        let repositories = self.registry.list_repositories(&project.name).await?;
        self.metrics.record_projects_scanned(1);
        info!(
            project = %project.name,
            repositories = repositories.len(),
            "Processing project"
        );

        for repository in &repositories {
            if !policy.selects_repository(&repository.name) {
                debug!(repository = %repository.name, "Repository not selected by policy");
                self.metrics.record_repositories_skipped(1);
                continue;
            }

            let scope = RepositoryScope {
                host: self.registry.host(),
                project: &project.name,
                repository: &repository.name,
            };
            if let Err(e) = self.enforce_repository(policy, &scope, records).await {
                warn!(
                    project = %project.name,
                    repository = %repository.name,
                    error = %e,
                    "Failed to list artifacts, skipping repository"
                );
                self.metrics.record_repositories_failed(1);
                errors.push(format!(
                    "Failed to list artifacts for repository {}: {}",
                    repository.name, e
                ));
            }
        }
        Ok(())
    }

    async fn enforce_repository(
        &self,
        policy: &dyn RetentionPolicy,
        scope: &RepositoryScope<'_>,
        records: &mut Vec<AuditRecord>,
    ) -> Result<(), RegistryError> {
        let artifacts = self
            .registry
            .list_artifacts(scope.project, scope.repository)
            .await?;
        self.metrics.record_repositories_scanned(1);

        let listed = artifacts.len();
        let decisions = policy.evaluate(scope, artifacts);
        self.metrics
            .record_artifacts_untagged(listed.saturating_sub(decisions.len()));
        self.metrics.record_artifacts_evaluated(decisions.len());

        info!(
            repository = %scope.repository,
            artifacts = listed,
            evaluated = decisions.len(),
            "Processing repository"
        );

        for decision in decisions {
            let record = self.apply(scope, decision).await;
            records.push(record);
        }
        Ok(())
    }

    /// Executes one decision and builds its audit record.
    async fn apply(&self, scope: &RepositoryScope<'_>, decision: Decision) -> AuditRecord {
        let Decision {
            artifact,
            image,
            action,
            mut note,
            contexts,
        } = decision;

        let status = match action {
            Action::Keep => {
                info!(image = %image, "KEPT");
                self.metrics.record_artifacts_kept(1);
                AuditStatus::Kept
            }
            Action::Delete if self.config.dry_run => {
                info!(image = %image, digest = %artifact.digest, "[DRY-RUN] Would delete artifact");
                self.metrics.record_artifacts_deleted(1);
                AuditStatus::ToBeDeleted
            }
            Action::Delete => {
                let result = self
                    .registry
                    .delete_artifact(scope.project, scope.repository, &artifact.digest)
                    .await;
                let status = match result {
                    Ok(()) => {
                        info!(image = %image, digest = %artifact.digest, "Deleted artifact");
                        self.metrics.record_artifacts_deleted(1);
                        AuditStatus::Deleted
                    }
                    Err(e) => {
                        error!(
                            image = %image,
                            digest = %artifact.digest,
                            error = %e,
                            "Failed to delete artifact"
                        );
                        self.metrics.record_delete_failures(1);
                        note = format!("{note}; delete failed: {e}");
                        AuditStatus::DeleteFailed
                    }
                };
                if !self.config.delete_interval.is_zero() {
                    tokio::time::sleep(self.config.delete_interval).await;
                }
                status
            }
        };

        let (environments, namespaces): (Vec<String>, Vec<String>) = contexts
            .into_iter()
            .map(|c| (c.environment, c.namespace))
            .unzip();

        AuditRecord {
            project: scope.project.to_string(),
            repository: scope.repository.to_string(),
            digest: artifact.digest,
            image,
            status,
            notes: note,
            environments,
            namespaces,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retention::config::{DEFAULT_SNAPSHOT_PATTERN, SnapshotMatcher};
    use crate::retention::policy::KeepNewestPolicy;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};
    use mockall::mock;
    use registry::{Artifact, Repository};

    mock! {
        pub Registry {}

        #[async_trait]
        impl RegistryClient for Registry {
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
    }

    fn unavailable() -> RegistryError {
        RegistryError::Status {
            url: "https://harbor.test/api/v2.0".to_string(),
            status: 503,
            body: "unavailable".to_string(),
        }
    }

    fn artifacts() -> Vec<Artifact> {
        let base = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        vec![
            Artifact::new("sha256:1", base + Duration::hours(1), ["v1"]),
            Artifact::new("sha256:3", base + Duration::hours(3), ["v3"]),
            Artifact::new("sha256:2", base + Duration::hours(2), ["v2"]),
            Artifact::new("sha256:0", base, Vec::<String>::new()),
        ]
    }

    /// One project `dev` with one repository `dev/app`.
    fn registry_with_one_repository() -> MockRegistry {
        let mut registry = MockRegistry::new();
        registry
            .expect_host()
            .return_const("harbor.test".to_string());
        registry
            .expect_list_projects()
            .returning(|| Ok(vec![Project::new(1, "dev")]));
        registry
            .expect_list_repositories()
            .returning(|_| Ok(vec![Repository::new("dev/app")]));
        registry
            .expect_list_artifacts()
            .returning(|_, _| Ok(artifacts()));
        registry
    }

    fn config(dry_run: bool) -> RetentionConfig {
        let mut config =
            RetentionConfig::new(2, 1, SnapshotMatcher::new(DEFAULT_SNAPSHOT_PATTERN).unwrap());
        config.dry_run = dry_run;
        config.delete_interval = std::time::Duration::ZERO;
        config
    }

    fn policy() -> KeepNewestPolicy {
        KeepNewestPolicy::from_config(&config(true)).unwrap()
    }

    #[tokio::test]
    async fn test_dry_run_never_deletes() {
        let mut registry = registry_with_one_repository();
        registry.expect_delete_artifact().never();
        let enforcer = RetentionEnforcer::new(Arc::new(registry), config(true));

        let run = enforcer.enforce(&policy()).await.unwrap();

        let statuses: Vec<(&str, AuditStatus)> = run
            .records
            .iter()
            .map(|r| (r.image.as_str(), r.status))
            .collect();
        assert_eq!(
            statuses,
            vec![
                ("harbor.test/dev/app:v3", AuditStatus::Kept),
                ("harbor.test/dev/app:v2", AuditStatus::Kept),
                ("harbor.test/dev/app:v1", AuditStatus::ToBeDeleted),
            ]
        );
        assert_eq!(run.summary.artifacts_deleted, 1);
        assert_eq!(run.summary.artifacts_untagged, 1);
        assert_eq!(run.layout, ReportLayout::TimeBased);
    }

    #[tokio::test]
    async fn test_live_run_deletes_by_digest() {
        let mut registry = registry_with_one_repository();
        registry
            .expect_delete_artifact()
            .times(1)
            .returning(|project, repository, digest| {
                assert_eq!((project, repository, digest), ("dev", "dev/app", "sha256:1"));
                Ok(())
            });
        let enforcer = RetentionEnforcer::new(Arc::new(registry), config(false));

        let run = enforcer.enforce(&policy()).await.unwrap();

        assert_eq!(run.records[2].status, AuditStatus::Deleted);
        assert_eq!(run.records[2].digest, "sha256:1");
        assert_eq!(run.summary.artifacts_deleted, 1);
        assert_eq!(run.summary.delete_failures, 0);
    }

    #[tokio::test]
    async fn test_failed_delete_is_recorded_and_not_counted() {
        let mut registry = registry_with_one_repository();
        registry
            .expect_delete_artifact()
            .times(1)
            .returning(|_, _, _| Err(unavailable()));
        let enforcer = RetentionEnforcer::new(Arc::new(registry), config(false));

        let run = enforcer.enforce(&policy()).await.unwrap();

        let failed = &run.records[2];
        assert_eq!(failed.status, AuditStatus::DeleteFailed);
        assert!(failed.notes.starts_with("Expired"));
        assert!(failed.notes.contains("503"));
        assert_eq!(run.summary.artifacts_deleted, 0);
        assert_eq!(run.summary.delete_failures, 1);
    }

    #[tokio::test]
    async fn test_repeated_runs_report_their_own_counts() {
        let mut registry = registry_with_one_repository();
        registry.expect_delete_artifact().never();
        let enforcer = RetentionEnforcer::new(Arc::new(registry), config(true));

        let first = enforcer.enforce(&policy()).await.unwrap();
        let second = enforcer.enforce(&policy()).await.unwrap();

        assert_eq!(second.summary, first.summary);
        assert_eq!(second.summary.artifacts_evaluated, 3);
        assert_eq!(enforcer.metrics().artifacts_evaluated(), 6);
    }

    #[tokio::test]
    async fn test_project_listing_failure_is_fatal() {
        let mut registry = MockRegistry::new();
        registry
            .expect_host()
            .return_const("harbor.test".to_string());
        registry
            .expect_list_projects()
            .returning(|| Err(unavailable()));
        registry.expect_list_repositories().never();
        let enforcer = RetentionEnforcer::new(Arc::new(registry), config(true));

        let err = enforcer.enforce(&policy()).await.unwrap_err();

        assert!(matches!(err, EnforcerError::ListProjects(_)));
    }

    #[tokio::test]
    async fn test_whitelist_skips_projects_before_listing() {
        let mut registry = MockRegistry::new();
        registry
            .expect_host()
            .return_const("harbor.test".to_string());
        registry
            .expect_list_projects()
            .returning(|| Ok(vec![Project::new(1, "dev"), Project::new(2, "prod")]));
        registry
            .expect_list_repositories()
            .times(1)
            .returning(|project| {
                assert_eq!(project, "prod");
                Ok(Vec::new())
            });
        let mut config = config(true);
        config.project_whitelist.insert("prod".to_string());
        let enforcer = RetentionEnforcer::new(Arc::new(registry), config);

        let run = enforcer.enforce(&policy()).await.unwrap();

        assert!(run.records.is_empty());
        assert_eq!(run.summary.projects_skipped, 1);
        assert_eq!(run.summary.projects_scanned, 1);
    }

    #[tokio::test]
    async fn test_listing_failures_skip_only_their_scope() {
        let mut registry = MockRegistry::new();
        registry
            .expect_host()
            .return_const("harbor.test".to_string());
        registry
            .expect_list_projects()
            .returning(|| Ok(vec![Project::new(1, "broken"), Project::new(2, "dev")]));
        registry
            .expect_list_repositories()
            .returning(|project| match project {
                "broken" => Err(unavailable()),
                _ => Ok(vec![Repository::new("dev/flaky"), Repository::new("dev/app")]),
            });
        registry
            .expect_list_artifacts()
            .returning(|_, repository| match repository {
                "dev/flaky" => Err(unavailable()),
                _ => Ok(artifacts()),
            });
        let enforcer = RetentionEnforcer::new(Arc::new(registry), config(true));

        let run = enforcer.enforce(&policy()).await.unwrap();

        assert_eq!(run.records.len(), 3);
        assert!(run.records.iter().all(|r| r.repository == "dev/app"));
        assert_eq!(run.errors.len(), 2);
        assert_eq!(run.summary.projects_failed, 1);
        assert_eq!(run.summary.repositories_failed, 1);
        assert_eq!(run.summary.repositories_scanned, 1);
    }
}
