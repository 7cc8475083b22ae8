//! Retention engine parameters.

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use regex::Regex;
use thiserror::Error;

use common::config::RetentionSettings;

pub const DEFAULT_SNAPSHOT_PATTERN: &str = "(?i)snapshot";

/// Decides whether a tag names a snapshot build.
#[derive(Clone)]
pub struct SnapshotMatcher {
    regex: Regex,
}

impl SnapshotMatcher {
    pub fn new(pattern: &str) -> Result<Self, RetentionConfigError> {
        let regex =
            Regex::new(pattern).map_err(|source| RetentionConfigError::InvalidSnapshotPattern {
                pattern: pattern.to_string(),
                source,
            })?;
        Ok(Self { regex })
    }

    pub fn is_snapshot(&self, tag: &str) -> bool {
        self.regex.is_match(tag)
    }

    pub fn pattern(&self) -> &str {
        self.regex.as_str()
    }
}

impl fmt::Debug for SnapshotMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SnapshotMatcher").field(&self.pattern()).finish()
    }
}

/// Parameters of a cleanup run.
#[derive(Debug, Clone)]
pub struct RetentionConfig {
    /// Newest artifacts retained per repository (time-based policy)
    pub keep_last_n: usize,

    /// Snapshot-tagged artifacts retained within the `keep_last_n` window
    pub max_snapshots: usize,

    pub snapshot: SnapshotMatcher,

    /// Projects to scan; empty scans every project
    pub project_whitelist: BTreeSet<String>,

    /// Log decisions without issuing delete calls.
    pub dry_run: bool,

    /// Pause after each live delete call.
    pub delete_interval: Duration,
}

impl RetentionConfig {
    /// Dry-run config over every project.
    pub fn new(keep_last_n: usize, max_snapshots: usize, snapshot: SnapshotMatcher) -> Self {
        Self {
            keep_last_n,
            max_snapshots,
            snapshot,
            project_whitelist: BTreeSet::new(),
            dry_run: true,
            delete_interval: Duration::from_millis(200),
        }
    }

    pub fn from_settings(
        settings: &RetentionSettings,
        dry_run: bool,
    ) -> Result<Self, RetentionConfigError> {
        let config = Self {
            keep_last_n: settings.keep_last,
            max_snapshots: settings.max_snapshots,
            snapshot: SnapshotMatcher::new(&settings.snapshot_pattern)?,
            project_whitelist: settings
                .project_whitelist
                .iter()
                .map(|name| name.trim())
                .filter(|name| !name.is_empty())
                .map(str::to_string)
                .collect(),
            dry_run,
            delete_interval: settings.delete_interval,
        };
        Ok(config)
    }

    /// Whether the project is scanned at all.
    pub fn project_allowed(&self, project: &str) -> bool {
        self.project_whitelist.is_empty() || self.project_whitelist.contains(project)
    }
}

#[derive(Debug, Error)]
pub enum RetentionConfigError {
    #[error("invalid snapshot pattern {pattern:?}: {source}")]
    InvalidSnapshotPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("keep_last must be at least 1")]
    InvalidKeepLast,
}
