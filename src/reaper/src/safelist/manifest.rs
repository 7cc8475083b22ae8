//! Manifest file: the CSV hand-off between the scan and clean stages.
//!
//! Columns are `image,environment,namespace` with a header row.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use csv::{ReaderBuilder, Trim, WriterBuilder};
use thiserror::Error;
use tracing::{debug, info};

use super::{SafeImageRecord, SafeList, SafeListAggregator};

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid CSV in {path}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
}

impl ManifestError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn csv(path: &Path, source: csv::Error) -> Self {
        Self::Csv {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// Writes manifest rows, replacing any existing file.
pub fn write_manifest(path: &Path, rows: &[SafeImageRecord]) -> Result<(), ManifestError> {
    let file = File::create(path).map_err(|e| ManifestError::io(path, e))?;
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(file);

    for row in rows {
        writer
            .serialize(row)
            .map_err(|e| ManifestError::csv(path, e))?;
    }
    if rows.is_empty() {
        // serde writes the header with the first row only
        writer
            .write_record(["image", "environment", "namespace"])
            .map_err(|e| ManifestError::csv(path, e))?;
    }
    writer.flush().map_err(|e| ManifestError::io(path, e))?;

    info!(path = %path.display(), rows = rows.len(), "Manifest written");
    Ok(())
}

/// Reads manifest rows.
///
/// The first row is treated as the header. Fields are trimmed; rows with
/// fewer than three columns or an empty image are skipped.
pub fn read_manifest(path: &Path) -> Result<Vec<SafeImageRecord>, ManifestError> {
    let file = File::open(path).map_err(|e| ManifestError::io(path, e))?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(file);

    let mut rows = Vec::new();
    for (line, result) in reader.records().enumerate() {
        let record = result.map_err(|e| ManifestError::csv(path, e))?;
        match (record.get(0), record.get(1), record.get(2)) {
            (Some(image), Some(environment), Some(namespace)) if !image.is_empty() => {
                rows.push(SafeImageRecord {
                    image: image.to_string(),
                    environment: environment.to_string(),
                    namespace: namespace.to_string(),
                });
            }
            _ => debug!(path = %path.display(), line = line + 2, "Skipping malformed manifest row"),
        }
    }

    Ok(rows)
}

/// Reads the manifest into the safe list used by the cleanup stage.
pub fn load_safe_list(path: &Path) -> Result<SafeList, ManifestError> {
    let rows = read_manifest(path)?;
    let safe = SafeListAggregator::from_manifest_rows(rows);
    info!(path = %path.display(), images = safe.len(), "Manifest loaded");
    Ok(safe)
}
