//! Discovery stage: which images do cluster workloads run or roll back to.

pub mod extractor;
pub mod scanner;

pub use extractor::ImageHistoryExtractor;
pub use scanner::{EnvironmentScan, ScanReport, WorkloadScanner};
