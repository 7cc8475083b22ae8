use std::ops::AddAssign;
use std::sync::Arc;

use tracing::{debug, info, warn};

use cluster::{ClusterClient, Workload};
use common::config::EnvironmentConfig;

use super::extractor::ImageHistoryExtractor;
use crate::pattern::WorkloadFilter;
use crate::safelist::{ImageContext, SafeListAggregator};

/// What to scan in one environment.
#[derive(Debug, Clone)]
pub struct EnvironmentScan {
    pub name: String,
    pub namespaces: Vec<String>,
    pub extractor: ImageHistoryExtractor,
    pub filter: WorkloadFilter,
}

impl From<&EnvironmentConfig> for EnvironmentScan {
    fn from(config: &EnvironmentConfig) -> Self {
        Self {
            name: config.name.clone(),
            namespaces: config.namespaces.clone(),
            extractor: ImageHistoryExtractor::new(config.keep),
            filter: WorkloadFilter::new(
                config.workload_whitelist.clone(),
                config.workload_blacklist.clone(),
            ),
        }
    }
}

/// Counters of a discovery pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub namespaces_scanned: usize,
    /// Workload listings that failed (one per kind and namespace)
    pub listings_failed: usize,
    pub workloads_processed: usize,
    /// Filtered out by the whitelist/blacklist
    pub workloads_skipped: usize,
    /// Revision history unavailable
    pub workloads_failed: usize,
    /// Safe image records produced, before cross-workload deduplication
    pub records: usize,
}

impl AddAssign for ScanReport {
    fn add_assign(&mut self, other: Self) {
        self.namespaces_scanned += other.namespaces_scanned;
        self.listings_failed += other.listings_failed;
        self.workloads_processed += other.workloads_processed;
        self.workloads_skipped += other.workloads_skipped;
        self.workloads_failed += other.workloads_failed;
        self.records += other.records;
    }
}

/// Collects safe images from the workloads of one cluster.
pub struct WorkloadScanner {
    client: Arc<dyn ClusterClient>,
}

impl WorkloadScanner {
    pub fn new(client: Arc<dyn ClusterClient>) -> Self {
        Self { client }
    }

    /// Scans every namespace of `environment` into `aggregator`.
    ///
    /// Listing failures are logged and skip only the affected namespace or
    /// workload.
    pub async fn scan(
        &self,
        environment: &EnvironmentScan,
        aggregator: &mut SafeListAggregator,
    ) -> ScanReport {
        info!(
            environment = %environment.name,
            namespaces = environment.namespaces.len(),
            keep = environment.extractor.keep(),
            "Scanning environment"
        );

        let mut report = ScanReport::default();
        for namespace in &environment.namespaces {
            let context = ImageContext::new(&environment.name, namespace);
            report += self.scan_namespace(environment, &context, aggregator).await;
        }

        info!(
            environment = %environment.name,
            workloads = report.workloads_processed,
            skipped = report.workloads_skipped,
            failed = report.workloads_failed,
            "Environment scanned"
        );
        report
    }

    async fn scan_namespace(
        &self,
        environment: &EnvironmentScan,
        context: &ImageContext,
        aggregator: &mut SafeListAggregator,
    ) -> ScanReport {
        let namespace = context.namespace.as_str();
        let mut report = ScanReport {
            namespaces_scanned: 1,
            ..ScanReport::default()
        };

        match self.client.list_deployments(namespace).await {
            Ok(deployments) => {
                for deployment in deployments {
                    if !self.admit(environment, &deployment, &mut report) {
                        continue;
                    }
                    let history = match &deployment.selector {
                        Some(selector) => {
                            match self.client.list_replica_sets(namespace, selector).await {
                                Ok(history) => history,
                                Err(e) => {
                                    warn!(
                                        environment = %environment.name,
                                        namespace = %namespace,
                                        workload = %deployment.name,
                                        error = %e,
                                        "Failed to list revisions, skipping workload"
                                    );
                                    report.workloads_failed += 1;
                                    continue;
                                }
                            }
                        }
                        None => {
                            debug!(
                                namespace = %namespace,
                                workload = %deployment.name,
                                "Deployment has no usable selector, using current spec only"
                            );
                            Vec::new()
                        }
                    };
                    let records = environment.extractor.extract(&deployment, &history, context);
                    report.records += records.len();
                    report.workloads_processed += 1;
                    aggregator.extend(records);
                }
            }
            Err(e) => {
                warn!(
                    environment = %environment.name,
                    namespace = %namespace,
                    error = %e,
                    "Failed to list deployments"
                );
                report.listings_failed += 1;
            }
        }

        match self.client.list_stateful_sets(namespace).await {
            Ok(stateful_sets) => {
                for stateful_set in stateful_sets {
                    if !self.admit(environment, &stateful_set, &mut report) {
                        continue;
                    }
                    let records = environment.extractor.extract(&stateful_set, &[], context);
                    report.records += records.len();
                    report.workloads_processed += 1;
                    aggregator.extend(records);
                }
            }
            Err(e) => {
                warn!(
                    environment = %environment.name,
                    namespace = %namespace,
                    error = %e,
                    "Failed to list statefulsets"
                );
                report.listings_failed += 1;
            }
        }

        report
    }

    fn admit(
        &self,
        environment: &EnvironmentScan,
        workload: &Workload,
        report: &mut ScanReport,
    ) -> bool {
        if environment.filter.should_process(&workload.name) {
            return true;
        }
        info!(
            environment = %environment.name,
            kind = %workload.kind,
            workload = %workload.name,
            "Skipping workload (filtered)"
        );
        report.workloads_skipped += 1;
        false
    }
}
