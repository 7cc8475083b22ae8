//! Scan a cluster, persist the manifest, clean the registry from it.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, TimeZone, Utc};
use tempfile::TempDir;

use cluster::testing::InMemoryCluster;
use cluster::{Revision, Workload};
use reaper::discovery::{EnvironmentScan, ImageHistoryExtractor, WorkloadScanner};
use reaper::pattern::WorkloadFilter;
use reaper::retention::{InUsePolicy, RetentionConfig, RetentionEnforcer, SnapshotMatcher};
use reaper::safelist::{self, SafeListAggregator};
use reaper::{AuditStatus, ReportLayout, write_audit_report};
use registry::Artifact;
use registry::testing::InMemoryRegistry;

const HOST: &str = "harbor.test";

fn at(hour: i64) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap() + Duration::hours(hour)
}

fn config(dry_run: bool) -> RetentionConfig {
    let mut config = RetentionConfig::new(10, 2, SnapshotMatcher::new("(?i)snapshot").unwrap());
    config.dry_run = dry_run;
    config.delete_interval = StdDuration::ZERO;
    config
}

fn scenario_registry() -> InMemoryRegistry {
    InMemoryRegistry::new(HOST)
        .with_artifact("dev", "dev/app1", Artifact::new("sha256:101", at(2), ["v1.0.1"]))
        .with_artifact("dev", "dev/app1", Artifact::new("sha256:100", at(1), ["v1.0.0"]))
        .with_artifact("dev", "dev/app2", Artifact::new("sha256:200", at(3), ["latest"]))
}

fn manifest_with(images: &[&str]) -> (TempDir, std::path::PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("manifest.csv");
    let mut aggregator = SafeListAggregator::new();
    for image in images {
        aggregator.add(reaper::SafeImageRecord::new(
            *image,
            &reaper::ImageContext::new("dev", "apps"),
        ));
    }
    safelist::write_manifest(&path, &aggregator.to_manifest_rows()).unwrap();
    (dir, path)
}

#[tokio::test]
async fn test_unlisted_repository_is_never_touched() {
    let (_dir, path) = manifest_with(&["harbor.test/dev/app1:v1.0.1"]);
    let safe = safelist::load_safe_list(&path).unwrap();
    let registry = Arc::new(scenario_registry());
    let enforcer = RetentionEnforcer::new(registry.clone(), config(false));

    let run = enforcer.enforce(&InUsePolicy::new(safe, HOST)).await.unwrap();

    let rows: Vec<(&str, AuditStatus)> = run
        .records
        .iter()
        .map(|r| (r.image.as_str(), r.status))
        .collect();
    assert_eq!(
        rows,
        vec![
            ("harbor.test/dev/app1:v1.0.1", AuditStatus::Kept),
            ("harbor.test/dev/app1:v1.0.0", AuditStatus::Deleted),
        ]
    );
    assert_eq!(registry.listed_repositories(), vec!["dev/app1"]);
    assert_eq!(registry.delete_calls().len(), 1);
    assert_eq!(registry.delete_calls()[0].digest, "sha256:100");
    assert_eq!(registry.artifacts("dev/app2").len(), 1);
    assert_eq!(run.summary.repositories_skipped, 1);
}

#[tokio::test]
async fn test_dry_run_then_live_classify_identically() {
    let (_dir, path) = manifest_with(&["harbor.test/dev/app1:v1.0.1"]);
    let safe = safelist::load_safe_list(&path).unwrap();
    let policy = InUsePolicy::new(safe, HOST);

    let registry = Arc::new(scenario_registry());
    let dry = RetentionEnforcer::new(registry.clone(), config(true))
        .enforce(&policy)
        .await
        .unwrap();
    assert!(registry.delete_calls().is_empty());

    let live = RetentionEnforcer::new(registry.clone(), config(false))
        .enforce(&policy)
        .await
        .unwrap();

    let classify = |run: &reaper::CleanupRun| -> Vec<(String, bool)> {
        run.records
            .iter()
            .map(|r| (r.image.clone(), r.status.is_delete()))
            .collect()
    };
    assert_eq!(classify(&dry), classify(&live));
    assert_eq!(dry.records[1].status, AuditStatus::ToBeDeleted);
    assert_eq!(live.records[1].status, AuditStatus::Deleted);
    assert_eq!(dry.summary.artifacts_deleted, live.summary.artifacts_deleted);
}

#[tokio::test]
async fn test_delete_failure_continues_with_next_artifact() {
    let (_dir, path) = manifest_with(&["harbor.test/dev/app1:v3"]);
    let safe = safelist::load_safe_list(&path).unwrap();
    let registry = Arc::new(
        InMemoryRegistry::new(HOST)
            .with_artifact("dev", "dev/app1", Artifact::new("sha256:3", at(3), ["v3"]))
            .with_artifact("dev", "dev/app1", Artifact::new("sha256:2", at(2), ["v2"]))
            .with_artifact("dev", "dev/app1", Artifact::new("sha256:1", at(1), ["v1"]))
            .fail_delete("sha256:2"),
    );
    let enforcer = RetentionEnforcer::new(registry.clone(), config(false));

    let run = enforcer.enforce(&InUsePolicy::new(safe, HOST)).await.unwrap();

    let statuses: Vec<AuditStatus> = run.records.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        vec![AuditStatus::Kept, AuditStatus::DeleteFailed, AuditStatus::Deleted]
    );
    assert_eq!(registry.delete_calls().len(), 2);
    assert_eq!(run.summary.artifacts_deleted, 1);
    assert_eq!(run.summary.delete_failures, 1);
}

#[tokio::test]
async fn test_scan_then_clean() {
    let cluster = InMemoryCluster::new()
        .with_deployment(
            "apps",
            Workload::deployment(
                "app1",
                ["harbor.test/dev/app1:v3"],
                at(30),
                Some("app=app1".to_string()),
            ),
        )
        .with_replica_set(
            "apps",
            "app=app1",
            Revision::new(["harbor.test/dev/app1:v2"], at(20)),
        )
        .with_replica_set(
            "apps",
            "app=app1",
            Revision::new(["harbor.test/dev/app1:v1"], at(10)),
        )
        .with_deployment(
            "apps",
            Workload::deployment("debug-shell", ["harbor.test/dev/tools:1"], at(5), None),
        );
    let environment = EnvironmentScan {
        name: "dev".to_string(),
        namespaces: vec!["apps".to_string()],
        extractor: ImageHistoryExtractor::new(2),
        filter: WorkloadFilter::new(Vec::new(), vec!["debug-*".to_string()]),
    };
    let mut aggregator = SafeListAggregator::new();
    WorkloadScanner::new(Arc::new(cluster))
        .scan(&environment, &mut aggregator)
        .await;

    let dir = TempDir::new().unwrap();
    let manifest = dir.path().join("manifest.csv");
    safelist::write_manifest(&manifest, &aggregator.to_manifest_rows()).unwrap();
    let safe = safelist::load_safe_list(&manifest).unwrap();

    let registry = Arc::new(
        InMemoryRegistry::new(HOST)
            .with_artifact("dev", "dev/app1", Artifact::new("sha256:3", at(29), ["v3"]))
            .with_artifact("dev", "dev/app1", Artifact::new("sha256:2", at(19), ["v2"]))
            .with_artifact("dev", "dev/app1", Artifact::new("sha256:1", at(9), ["v1"]))
            .with_artifact("dev", "dev/tools", Artifact::new("sha256:t", at(4), ["1"])),
    );
    let run = RetentionEnforcer::new(registry.clone(), config(false))
        .enforce(&InUsePolicy::new(safe, HOST))
        .await
        .unwrap();

    let remaining: Vec<String> = registry
        .artifacts("dev/app1")
        .into_iter()
        .map(|a| a.digest)
        .collect();
    assert_eq!(remaining, vec!["sha256:3", "sha256:2"]);
    // The blacklisted workload's repository is not in the manifest at all
    assert_eq!(registry.artifacts("dev/tools").len(), 1);
    assert!(!registry.listed_repositories().contains(&"dev/tools".to_string()));

    let report = dir.path().join("audit.csv");
    write_audit_report(&report, run.layout, &run.records).unwrap();
    let content = std::fs::read_to_string(&report).unwrap();
    assert_eq!(run.layout, ReportLayout::InUse);
    assert!(content.contains("harbor.test/dev/app1:v3,KEPT,dev,apps,in use by cluster workloads"));
    assert!(content.contains("harbor.test/dev/app1:v1,DELETED,-,-,not found in manifest"));
}

#[test]
fn test_missing_manifest_is_fatal() {
    let dir = TempDir::new().unwrap();
    assert!(safelist::load_safe_list(&dir.path().join("absent.csv")).is_err());
}
