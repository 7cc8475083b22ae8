//! Audit trail: one record per evaluated artifact, written as CSV.

use std::fmt;
use std::fs::File;
use std::path::Path;

use csv::WriterBuilder;
use tracing::info;

use crate::safelist::ManifestError;

/// Outcome of one artifact decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditStatus {
    Kept,
    Deleted,
    /// Would have been deleted; dry run
    ToBeDeleted,
    DeleteFailed,
}

impl AuditStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditStatus::Kept => "KEPT",
            AuditStatus::Deleted => "DELETED",
            AuditStatus::ToBeDeleted => "TO_BE_DELETED",
            AuditStatus::DeleteFailed => "DELETE_FAILED",
        }
    }

    /// Classified for deletion, whatever happened next.
    pub fn is_delete(&self) -> bool {
        !matches!(self, AuditStatus::Kept)
    }
}

impl fmt::Display for AuditStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditRecord {
    pub project: String,
    /// Full repository name, `project/repo`
    pub repository: String,
    pub digest: String,
    /// `host/repository:tag`
    pub image: String,
    pub status: AuditStatus,
    pub notes: String,
    /// Where the image runs; manifest policy only
    pub environments: Vec<String>,
    pub namespaces: Vec<String>,
}

/// Column set of an audit report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportLayout {
    /// `Image, Status, Notes`
    TimeBased,
    /// `Image, Status, Used In Environments, Used In Namespaces, Notes`
    InUse,
}

impl ReportLayout {
    pub fn header(&self) -> &'static [&'static str] {
        match self {
            ReportLayout::TimeBased => &["Image", "Status", "Notes"],
            ReportLayout::InUse => &[
                "Image",
                "Status",
                "Used In Environments",
                "Used In Namespaces",
                "Notes",
            ],
        }
    }
}

fn joined(values: &[String]) -> String {
    if values.is_empty() {
        "-".to_string()
    } else {
        values.join(",")
    }
}

/// Writes `records` in emission order, replacing any existing file.
pub fn write_audit_report(
    path: &Path,
    layout: ReportLayout,
    records: &[AuditRecord],
) -> Result<(), ManifestError> {
    let file = File::create(path).map_err(|e| ManifestError::io(path, e))?;
    let mut writer = WriterBuilder::new().from_writer(file);

    writer
        .write_record(layout.header())
        .map_err(|e| ManifestError::csv(path, e))?;
    for record in records {
        let result = match layout {
            ReportLayout::TimeBased => writer.write_record([
                record.image.as_str(),
                record.status.as_str(),
                record.notes.as_str(),
            ]),
            ReportLayout::InUse => writer.write_record([
                record.image.as_str(),
                record.status.as_str(),
                joined(&record.environments).as_str(),
                joined(&record.namespaces).as_str(),
                record.notes.as_str(),
            ]),
        };
        result.map_err(|e| ManifestError::csv(path, e))?;
    }
    writer.flush().map_err(|e| ManifestError::io(path, e))?;

    info!(path = %path.display(), records = records.len(), "Audit report written");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn record(image: &str, status: AuditStatus, notes: &str) -> AuditRecord {
        AuditRecord {
            project: "dev".to_string(),
            repository: "dev/app1".to_string(),
            digest: "sha256:1".to_string(),
            image: image.to_string(),
            status,
            notes: notes.to_string(),
            environments: Vec::new(),
            namespaces: Vec::new(),
        }
    }

    #[test]
    fn test_status_labels() {
        assert_eq!(AuditStatus::Kept.to_string(), "KEPT");
        assert_eq!(AuditStatus::Deleted.to_string(), "DELETED");
        assert_eq!(AuditStatus::ToBeDeleted.to_string(), "TO_BE_DELETED");
        assert_eq!(AuditStatus::DeleteFailed.to_string(), "DELETE_FAILED");
        assert!(!AuditStatus::Kept.is_delete());
        assert!(AuditStatus::DeleteFailed.is_delete());
    }

    #[test]
    fn test_time_based_report() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.csv");
        let records = vec![
            record("h/dev/app1:v2", AuditStatus::Kept, "newest"),
            record("h/dev/app1:v1", AuditStatus::ToBeDeleted, "expired, beyond keep"),
        ];

        write_audit_report(&path, ReportLayout::TimeBased, &records).unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "Image,Status,Notes\n\
             h/dev/app1:v2,KEPT,newest\n\
             h/dev/app1:v1,TO_BE_DELETED,\"expired, beyond keep\"\n"
        );
    }

    #[test]
    fn test_in_use_report() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("audit.csv");
        let mut kept = record("h/dev/app1:v1", AuditStatus::Kept, "in use");
        kept.environments = vec!["dev".to_string(), "prod".to_string()];
        kept.namespaces = vec!["apps".to_string(), "web".to_string()];
        let deleted = record("h/dev/app1:v0", AuditStatus::Deleted, "not found in manifest");

        write_audit_report(&path, ReportLayout::InUse, &[kept, deleted]).unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "Image,Status,Used In Environments,Used In Namespaces,Notes\n\
             h/dev/app1:v1,KEPT,\"dev,prod\",\"apps,web\",in use\n\
             h/dev/app1:v0,DELETED,-,-,not found in manifest\n"
        );
    }
}
