use std::collections::{BTreeMap, HashMap};

use super::{ImageContext, SafeImageRecord};

/// Merges safe images discovered across environments and namespaces.
///
/// The first record seen for an image is the one persisted; every context
/// the image is seen in is kept for reporting. Records come back in
/// first-seen order, so identical input yields an identical manifest.
#[derive(Debug, Default)]
pub struct SafeListAggregator {
    records: Vec<SafeImageRecord>,
    index: HashMap<String, usize>,
    contexts: HashMap<String, Vec<ImageContext>>,
}

impl SafeListAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a record; returns `true` when its image was not known yet.
    pub fn add(&mut self, record: SafeImageRecord) -> bool {
        let context = record.context();
        let contexts = self.contexts.entry(record.image.clone()).or_default();
        if !contexts.contains(&context) {
            contexts.push(context);
        }

        if self.index.contains_key(&record.image) {
            return false;
        }
        self.index.insert(record.image.clone(), self.records.len());
        self.records.push(record);
        true
    }

    pub fn extend(&mut self, records: impl IntoIterator<Item = SafeImageRecord>) {
        for record in records {
            self.add(record);
        }
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, image: &str) -> bool {
        self.index.contains_key(image)
    }

    /// The persisted record for `image`.
    pub fn record(&self, image: &str) -> Option<&SafeImageRecord> {
        self.index.get(image).map(|&i| &self.records[i])
    }

    /// Every context `image` was discovered in, in discovery order.
    pub fn contexts(&self, image: &str) -> &[ImageContext] {
        self.contexts.get(image).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Manifest rows, one per image, in first-seen order.
    pub fn to_manifest_rows(&self) -> Vec<SafeImageRecord> {
        self.records.clone()
    }

    /// Rebuilds the safe list from manifest rows.
    ///
    /// Unlike discovery, every row contributes a context, so an image listed
    /// once per environment keeps all of them.
    pub fn from_manifest_rows(rows: impl IntoIterator<Item = SafeImageRecord>) -> SafeList {
        let mut images: BTreeMap<String, Vec<ImageContext>> = BTreeMap::new();
        for row in rows {
            let context = row.context();
            let contexts = images.entry(row.image).or_default();
            if !contexts.contains(&context) {
                contexts.push(context);
            }
        }
        SafeList { images }
    }
}

/// Images protected from deletion, with where each one runs.
///
/// Every image carries at least one context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SafeList {
    images: BTreeMap<String, Vec<ImageContext>>,
}

impl SafeList {
    pub fn contains(&self, image: &str) -> bool {
        self.images.contains_key(image)
    }

    pub fn contexts(&self, image: &str) -> &[ImageContext] {
        self.images.get(image).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Protected images in lexical order.
    pub fn images(&self) -> impl Iterator<Item = &str> {
        self.images.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.images.len()
    }

    pub fn is_empty(&self) -> bool {
        self.images.is_empty()
    }
}
