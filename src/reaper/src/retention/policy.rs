//! Retention policies: per-repository keep/delete classification.
//!
//! A policy is a pure function over one repository's artifact listing. The
//! [`RetentionEnforcer`](super::enforcer::RetentionEnforcer) decides what
//! to list, applies the decisions and records the audit trail.

use std::cmp::Ordering;

use registry::Artifact;

use super::config::{RetentionConfig, RetentionConfigError, SnapshotMatcher};
use crate::audit::ReportLayout;
use crate::reference::image_reference;
use crate::safelist::ImageContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Keep,
    Delete,
}

/// Classification of one tagged artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    pub artifact: Artifact,
    /// Reference reported for the artifact
    pub image: String,
    pub action: Action,
    pub note: String,
    /// Where the image runs, when known
    pub contexts: Vec<ImageContext>,
}

impl Decision {
    fn new(artifact: Artifact, image: String, action: Action, note: String) -> Self {
        Self {
            artifact,
            image,
            action,
            note,
            contexts: Vec::new(),
        }
    }
}

/// The repository a listing belongs to.
#[derive(Debug, Clone, Copy)]
pub struct RepositoryScope<'a> {
    /// Registry host, without scheme
    pub host: &'a str,
    pub project: &'a str,
    /// Full repository name, `project/repo`
    pub repository: &'a str,
}

pub trait RetentionPolicy: Send + Sync {
    fn name(&self) -> &'static str;

    fn report_layout(&self) -> ReportLayout;

    /// Whether a repository is evaluated. Unselected repositories are never
    /// listed.
    fn selects_repository(&self, _repository: &str) -> bool {
        true
    }

    /// Classifies every tagged artifact; untagged ones get no decision.
    fn evaluate(&self, scope: &RepositoryScope<'_>, artifacts: Vec<Artifact>) -> Vec<Decision>;
}

/// Newest-first ordering; equal push times fall back to digest order.
pub fn newest_first(a: &Artifact, b: &Artifact) -> Ordering {
    b.push_time
        .cmp(&a.push_time)
        .then_with(|| a.digest.cmp(&b.digest))
}

/// Time-based policy: keep the newest `keep_last_n` tagged artifacts, at most
/// `max_snapshots` of them snapshots.
///
/// Snapshots over the cap are deleted even inside the window, and the freed
/// slot is not handed to an older artifact.
#[derive(Debug, Clone)]
pub struct KeepNewestPolicy {
    keep_last_n: usize,
    max_snapshots: usize,
    snapshot: SnapshotMatcher,
}

impl KeepNewestPolicy {
    pub fn new(
        keep_last_n: usize,
        max_snapshots: usize,
        snapshot: SnapshotMatcher,
    ) -> Result<Self, RetentionConfigError> {
        if keep_last_n == 0 {
            return Err(RetentionConfigError::InvalidKeepLast);
        }
        Ok(Self {
            keep_last_n,
            max_snapshots,
            snapshot,
        })
    }

    pub fn from_config(config: &RetentionConfig) -> Result<Self, RetentionConfigError> {
        Self::new(
            config.keep_last_n,
            config.max_snapshots,
            config.snapshot.clone(),
        )
    }
}

impl RetentionPolicy for KeepNewestPolicy {
    fn name(&self) -> &'static str {
        "keep-newest"
    }

    fn report_layout(&self) -> ReportLayout {
        ReportLayout::TimeBased
    }

    fn evaluate(&self, scope: &RepositoryScope<'_>, artifacts: Vec<Artifact>) -> Vec<Decision> {
        let mut tagged: Vec<Artifact> = artifacts.into_iter().filter(Artifact::is_tagged).collect();
        tagged.sort_by(newest_first);

        let mut snapshots_kept = 0;
        let mut decisions = Vec::with_capacity(tagged.len());
        for (position, artifact) in tagged.into_iter().enumerate() {
            let tag = artifact.primary_tag().unwrap_or_default().to_string();
            let image = image_reference(scope.host, scope.repository, &tag);

            let (action, note) = if position >= self.keep_last_n {
                (
                    Action::Delete,
                    format!("Expired: older than the newest {}", self.keep_last_n),
                )
            } else if self.snapshot.is_snapshot(&tag) {
                if snapshots_kept < self.max_snapshots {
                    snapshots_kept += 1;
                    (
                        Action::Keep,
                        format!(
                            "Kept as one of the newest {} (snapshot {}/{})",
                            self.keep_last_n, snapshots_kept, self.max_snapshots
                        ),
                    )
                } else {
                    (
                        Action::Delete,
                        format!("Snapshot limit of {} reached", self.max_snapshots),
                    )
                }
            } else {
                (
                    Action::Keep,
                    format!("Kept as one of the newest {}", self.keep_last_n),
                )
            };

            decisions.push(Decision::new(artifact, image, action, note));
        }
        decisions
    }
}
