//! Core of harbor-reaper.
//!
//! - [`discovery`]: collect images used by cluster workloads
//! - [`safelist`]: merge them and persist the manifest
//! - [`retention`]: decide and apply registry cleanup
//! - [`audit`]: per-artifact report of a cleanup run

pub mod audit;
pub mod discovery;
pub mod pattern;
pub mod reference;
pub mod retention;
pub mod safelist;

pub use audit::{AuditRecord, AuditStatus, ReportLayout, write_audit_report};
pub use discovery::{EnvironmentScan, ImageHistoryExtractor, ScanReport, WorkloadScanner};
pub use retention::{
    CleanupRun, EnforcerError, InUsePolicy, KeepNewestPolicy, RetentionConfig, RetentionEnforcer,
    RetentionPolicy,
};
pub use safelist::{ImageContext, ManifestError, SafeImageRecord, SafeList, SafeListAggregator};
