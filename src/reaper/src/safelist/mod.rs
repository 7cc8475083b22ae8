//! The safe list: images in use by cluster workloads.
//!
//! Discovery feeds [`SafeImageRecord`]s into a [`SafeListAggregator`], which
//! is persisted as the manifest file. The cleanup stage reads the manifest
//! back into a [`SafeList`].

pub mod aggregator;
pub mod manifest;

use serde::{Deserialize, Serialize};

pub use aggregator::{SafeList, SafeListAggregator};
pub use manifest::{ManifestError, load_safe_list, read_manifest, write_manifest};

/// Where an image was found running.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ImageContext {
    pub environment: String,
    pub namespace: String,
}

impl ImageContext {
    pub fn new(environment: impl Into<String>, namespace: impl Into<String>) -> Self {
        Self {
            environment: environment.into(),
            namespace: namespace.into(),
        }
    }
}

/// An image that must survive cleanup, with the context it was found in.
///
/// Field order matches the manifest columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafeImageRecord {
    pub image: String,
    pub environment: String,
    pub namespace: String,
}

impl SafeImageRecord {
    pub fn new(image: impl Into<String>, context: &ImageContext) -> Self {
        Self {
            image: image.into(),
            environment: context.environment.clone(),
            namespace: context.namespace.clone(),
        }
    }

    pub fn context(&self) -> ImageContext {
        ImageContext::new(&self.environment, &self.namespace)
    }
}
