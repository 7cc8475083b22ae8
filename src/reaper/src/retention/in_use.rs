//! Manifest-based policy: keep what cluster workloads use.

use std::collections::BTreeSet;

use registry::Artifact;

use super::policy::{Action, Decision, RepositoryScope, RetentionPolicy};
use crate::audit::ReportLayout;
use crate::reference::{image_reference, repository_of};
use crate::safelist::SafeList;

pub const IN_USE_NOTE: &str = "in use by cluster workloads";
pub const NOT_IN_MANIFEST_NOTE: &str = "not found in manifest";

/// Repositories referenced by the safe list under `host`.
pub fn in_use_repositories(safe: &SafeList, host: &str) -> BTreeSet<String> {
    safe.images()
        .filter_map(|image| repository_of(image, host))
        .map(str::to_string)
        .collect()
}

/// Only repositories holding a safe image are touched. Within them, an
/// artifact survives when any of its tags is in the safe list; everything
/// else tagged is deleted.
#[derive(Debug, Clone)]
pub struct InUsePolicy {
    safe: SafeList,
    repositories: BTreeSet<String>,
}

impl InUsePolicy {
    pub fn new(safe: SafeList, host: &str) -> Self {
        let repositories = in_use_repositories(&safe, host);
        Self { safe, repositories }
    }

    pub fn repositories(&self) -> &BTreeSet<String> {
        &self.repositories
    }
}

impl RetentionPolicy for InUsePolicy {
    fn name(&self) -> &'static str {
        "in-use"
    }

    fn report_layout(&self) -> ReportLayout {
        ReportLayout::InUse
    }

    fn selects_repository(&self, repository: &str) -> bool {
        self.repositories.contains(repository)
    }

    fn evaluate(&self, scope: &RepositoryScope<'_>, artifacts: Vec<Artifact>) -> Vec<Decision> {
        artifacts
            .into_iter()
            .filter(Artifact::is_tagged)
            .map(|artifact| {
                let in_use = artifact
                    .tag_names()
                    .map(|tag| image_reference(scope.host, scope.repository, tag))
                    .find(|image| self.safe.contains(image));

                match in_use {
                    Some(image) => Decision {
                        contexts: self.safe.contexts(&image).to_vec(),
                        image,
                        artifact,
                        action: Action::Keep,
                        note: IN_USE_NOTE.to_string(),
                    },
                    None => Decision {
                        image: image_reference(
                            scope.host,
                            scope.repository,
                            artifact.primary_tag().unwrap_or_default(),
                        ),
                        artifact,
                        action: Action::Delete,
                        note: NOT_IN_MANIFEST_NOTE.to_string(),
                        contexts: Vec::new(),
                    },
                }
            })
            .collect()
    }
}
