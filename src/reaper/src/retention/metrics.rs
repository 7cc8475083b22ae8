//! Cleanup run metrics.
//!
//! Thread-safe counters shared between the enforcer and its caller.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::info;

/// Thread-safe counters for a cleanup run
#[derive(Debug, Clone, Default)]
pub struct RetentionMetrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    projects_scanned: AtomicUsize,
    /// Not in the project whitelist
    projects_skipped: AtomicUsize,
    /// Repository listing failed
    projects_failed: AtomicUsize,
    repositories_scanned: AtomicUsize,
    /// Not selected by the policy
    repositories_skipped: AtomicUsize,
    /// Artifact listing failed
    repositories_failed: AtomicUsize,
    artifacts_evaluated: AtomicUsize,
    artifacts_untagged: AtomicUsize,
    artifacts_kept: AtomicUsize,
    /// Deleted, or marked for deletion in a dry run
    artifacts_deleted: AtomicUsize,
    delete_failures: AtomicUsize,
}

macro_rules! counter {
    ($record:ident, $get:ident, $field:ident) => {
        pub fn $record(&self, count: usize) {
            self.inner.$field.fetch_add(count, Ordering::Relaxed);
        }

        pub fn $get(&self) -> usize {
            self.inner.$field.load(Ordering::Relaxed)
        }
    };
}

impl RetentionMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    counter!(record_projects_scanned, projects_scanned, projects_scanned);
    counter!(record_projects_skipped, projects_skipped, projects_skipped);
    counter!(record_projects_failed, projects_failed, projects_failed);
    counter!(record_repositories_scanned, repositories_scanned, repositories_scanned);
    counter!(record_repositories_skipped, repositories_skipped, repositories_skipped);
    counter!(record_repositories_failed, repositories_failed, repositories_failed);
    counter!(record_artifacts_evaluated, artifacts_evaluated, artifacts_evaluated);
    counter!(record_artifacts_untagged, artifacts_untagged, artifacts_untagged);
    counter!(record_artifacts_kept, artifacts_kept, artifacts_kept);
    counter!(record_artifacts_deleted, artifacts_deleted, artifacts_deleted);
    counter!(record_delete_failures, delete_failures, delete_failures);

    /// Point-in-time copy of every counter.
    pub fn summary(&self, dry_run: bool) -> MetricsSummary {
        MetricsSummary {
            dry_run,
            projects_scanned: self.projects_scanned(),
            projects_skipped: self.projects_skipped(),
            projects_failed: self.projects_failed(),
            repositories_scanned: self.repositories_scanned(),
            repositories_skipped: self.repositories_skipped(),
            repositories_failed: self.repositories_failed(),
            artifacts_evaluated: self.artifacts_evaluated(),
            artifacts_untagged: self.artifacts_untagged(),
            artifacts_kept: self.artifacts_kept(),
            artifacts_deleted: self.artifacts_deleted(),
            delete_failures: self.delete_failures(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetricsSummary {
    pub dry_run: bool,
    pub projects_scanned: usize,
    pub projects_skipped: usize,
    pub projects_failed: usize,
    pub repositories_scanned: usize,
    pub repositories_skipped: usize,
    pub repositories_failed: usize,
    pub artifacts_evaluated: usize,
    pub artifacts_untagged: usize,
    pub artifacts_kept: usize,
    pub artifacts_deleted: usize,
    pub delete_failures: usize,
}

impl MetricsSummary {
    /// Label of the deleted counter: nothing is deleted in a dry run.
    pub fn deleted_label(&self) -> &'static str {
        if self.dry_run {
            "To be deleted"
        } else {
            "Deleted"
        }
    }

    /// Counts accumulated since `earlier` was taken.
    pub fn since(&self, earlier: &MetricsSummary) -> MetricsSummary {
        MetricsSummary {
            dry_run: self.dry_run,
            projects_scanned: self.projects_scanned.saturating_sub(earlier.projects_scanned),
            projects_skipped: self.projects_skipped.saturating_sub(earlier.projects_skipped),
            projects_failed: self.projects_failed.saturating_sub(earlier.projects_failed),
            repositories_scanned: self
                .repositories_scanned
                .saturating_sub(earlier.repositories_scanned),
            repositories_skipped: self
                .repositories_skipped
                .saturating_sub(earlier.repositories_skipped),
            repositories_failed: self
                .repositories_failed
                .saturating_sub(earlier.repositories_failed),
            artifacts_evaluated: self
                .artifacts_evaluated
                .saturating_sub(earlier.artifacts_evaluated),
            artifacts_untagged: self
                .artifacts_untagged
                .saturating_sub(earlier.artifacts_untagged),
            artifacts_kept: self.artifacts_kept.saturating_sub(earlier.artifacts_kept),
            artifacts_deleted: self.artifacts_deleted.saturating_sub(earlier.artifacts_deleted),
            delete_failures: self.delete_failures.saturating_sub(earlier.delete_failures),
        }
    }

    pub fn log(&self) {
        info!(
            dry_run = self.dry_run,
            projects_scanned = self.projects_scanned,
            projects_skipped = self.projects_skipped,
            repositories_scanned = self.repositories_scanned,
            repositories_skipped = self.repositories_skipped,
            artifacts_evaluated = self.artifacts_evaluated,
            artifacts_kept = self.artifacts_kept,
            artifacts_deleted = self.artifacts_deleted,
            delete_failures = self.delete_failures,
            "Cleanup run summary"
        );
    }
}
