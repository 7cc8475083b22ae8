//! Retention decision engine.
//!
//! Two policies classify each tagged artifact of a repository as keep or
//! delete:
//!
//! - `policy::KeepNewestPolicy`: newest `keep_last_n` artifacts, with a cap
//!   on snapshot builds among them
//! - `in_use::InUsePolicy`: images listed in the discovery manifest
//!
//! The `enforcer` applies a policy to the registry (dry run or live) and
//! produces the audit records of the run.

pub mod config;
pub mod enforcer;
pub mod in_use;
pub mod metrics;
pub mod policy;

pub use config::{RetentionConfig, RetentionConfigError, SnapshotMatcher};
pub use enforcer::{CleanupRun, EnforcerError, RetentionEnforcer};
pub use in_use::{InUsePolicy, in_use_repositories};
pub use metrics::{MetricsSummary, RetentionMetrics};
pub use policy::{Action, Decision, KeepNewestPolicy, RepositoryScope, RetentionPolicy};
