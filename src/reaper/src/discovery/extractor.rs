use std::collections::HashSet;

use chrono::{DateTime, Utc};

use cluster::{Revision, Workload};

use crate::safelist::{ImageContext, SafeImageRecord};

/// Picks the images a workload may roll back to.
///
/// Images from the current spec and every revision are ordered newest
/// first; the first `keep` distinct images are safe. Equal timestamps keep
/// input order, current spec first.
#[derive(Debug, Clone, Copy)]
pub struct ImageHistoryExtractor {
    keep: usize,
}

impl ImageHistoryExtractor {
    /// `keep` is clamped to 1 so the current image is always protected.
    pub fn new(keep: usize) -> Self {
        Self { keep: keep.max(1) }
    }

    pub fn keep(&self) -> usize {
        self.keep
    }

    pub fn extract(
        &self,
        workload: &Workload,
        history: &[Revision],
        context: &ImageContext,
    ) -> Vec<SafeImageRecord> {
        let mut candidates: Vec<(&str, DateTime<Utc>)> = workload
            .images
            .iter()
            .map(|image| (image.as_str(), workload.created_at))
            .collect();
        for revision in history {
            candidates.extend(
                revision
                    .images
                    .iter()
                    .map(|image| (image.as_str(), revision.created_at)),
            );
        }

        // Stable: equal timestamps stay in input order
        candidates.sort_by(|a, b| b.1.cmp(&a.1));

        let mut seen = HashSet::new();
        let mut records = Vec::new();
        for (image, _) in candidates {
            if records.len() >= self.keep {
                break;
            }
            if image.is_empty() || !seen.insert(image) {
                continue;
            }
            records.push(SafeImageRecord::new(image, context));
        }
        records
    }
}
