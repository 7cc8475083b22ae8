//! Harbor Reaper
//!
//! Cleans a Harbor registry either by age (keep the newest artifacts per
//! repository) or by usage: `scan` records the images Kubernetes workloads
//! run or may roll back to, `clean` deletes what that manifest does not
//! protect.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::Local;
use clap::Parser;

use cluster::KubeClusterClient;
use common::Task;
use common::cli::{Command, CommonArgs, utils};
use common::config::{Configuration, RegistryConfig};
use reaper::discovery::{EnvironmentScan, ScanReport, WorkloadScanner};
use reaper::retention::{
    CleanupRun, InUsePolicy, KeepNewestPolicy, RetentionConfig, RetentionEnforcer,
    RetentionPolicy,
};
use reaper::safelist::{self, SafeListAggregator};
use reaper::write_audit_report;
use registry::{HarborClient, HarborSettings, RegistryClient};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Option<Command>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = utils::load_config(cli.common.config.as_ref())?;
    if let Some(dry_run) = cli.common.dry_run {
        config.dry_run = dry_run;
    }
    utils::init_logging(&cli.common, &config.log)?;

    let command = cli.command.unwrap_or_default();
    if utils::handle_common_command(&command, &config)? {
        return Ok(());
    }
    let Some(task) = utils::resolve_task(&command, &config)? else {
        return Ok(());
    };
    config
        .validate_for(task)
        .context("Invalid configuration")?;

    tracing::info!(task = %task, dry_run = config.dry_run, "Starting harbor-reaper");

    match task {
        Task::Scan => run_scan(&config).await,
        Task::Clean => run_clean(&config).await,
        Task::Retain => run_retain(&config).await,
    }
}

/// Discovery stage: every environment's workloads into the manifest file.
async fn run_scan(config: &Configuration) -> Result<()> {
    let mut aggregator = SafeListAggregator::new();
    let mut report = ScanReport::default();

    for env in &config.cluster.environments {
        let kubeconfig = expand_home(&env.kubeconfig);
        // A partial manifest would leave in-use images unprotected
        let client = KubeClusterClient::from_kubeconfig(&kubeconfig, env.context.as_deref())
            .await
            .with_context(|| format!("Failed to connect to environment {}", env.name))?;

        let scanner = WorkloadScanner::new(Arc::new(client));
        report += scanner
            .scan(&EnvironmentScan::from(env), &mut aggregator)
            .await;
    }

    let manifest = &config.cluster.manifest_file;
    safelist::write_manifest(manifest, &aggregator.to_manifest_rows())
        .context("Failed to write manifest")?;

    println!();
    println!("========== Scan Summary ==========");
    println!("  Environments:          {}", config.cluster.environments.len());
    println!("  Namespaces scanned:    {}", report.namespaces_scanned);
    println!("  Workloads processed:   {}", report.workloads_processed);
    println!("  Workloads filtered:    {}", report.workloads_skipped);
    println!("  Workloads failed:      {}", report.workloads_failed);
    println!("  Safe images:           {}", aggregator.len());
    println!("  Manifest:              {}", manifest.display());
    Ok(())
}

/// Manifest-based cleanup: only repositories holding an in-use image.
async fn run_clean(config: &Configuration) -> Result<()> {
    let manifest = &config.cluster.manifest_file;
    let safe = safelist::load_safe_list(manifest)
        .with_context(|| format!("Failed to load manifest {}", manifest.display()))?;

    let registry = harbor_client(&config.registry)?;
    let policy = InUsePolicy::new(safe, registry.host());
    tracing::info!(
        repositories = policy.repositories().len(),
        "Repositories in use by cluster workloads"
    );

    run_cleanup(config, registry, &policy, "cleanup-audit").await
}

/// Time-based cleanup: newest `keep_last` artifacts per repository.
async fn run_retain(config: &Configuration) -> Result<()> {
    let retention = RetentionConfig::from_settings(&config.retention, config.dry_run)
        .context("Invalid retention settings")?;
    let policy = KeepNewestPolicy::from_config(&retention).context("Invalid retention settings")?;
    tracing::info!(
        keep_last = retention.keep_last_n,
        max_snapshots = retention.max_snapshots,
        "Retention policy"
    );

    let registry = harbor_client(&config.registry)?;
    run_cleanup(config, registry, &policy, "harbor-cleanup-audit").await
}

async fn run_cleanup(
    config: &Configuration,
    registry: Arc<dyn RegistryClient>,
    policy: &dyn RetentionPolicy,
    report_prefix: &str,
) -> Result<()> {
    let retention = RetentionConfig::from_settings(&config.retention, config.dry_run)
        .context("Invalid retention settings")?;
    let run = RetentionEnforcer::new(registry, retention)
        .enforce(policy)
        .await
        .context("Cleanup run failed")?;

    let report = config
        .audit_file
        .clone()
        .unwrap_or_else(|| default_report_path(report_prefix));
    write_audit_report(&report, run.layout, &run.records)
        .context("Failed to write audit report")?;

    run.summary.log();
    print_summary(&run, &report);
    Ok(())
}

fn harbor_client(config: &RegistryConfig) -> Result<Arc<dyn RegistryClient>> {
    let client = HarborClient::new(HarborSettings {
        url: config.url.clone(),
        user: config.user.clone(),
        password: config.password.clone(),
        page_size: config.page_size,
        timeout: config.timeout,
        max_retries: config.max_retries,
    })
    .context("Failed to create registry client")?;
    Ok(Arc::new(client))
}

fn default_report_path(prefix: &str) -> PathBuf {
    PathBuf::from(format!(
        "{prefix}-{}.csv",
        Local::now().format("%Y%m%d-%H%M%S")
    ))
}

/// Expands a leading `~/` to the home directory.
fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}

fn print_summary(run: &CleanupRun, report: &Path) {
    let summary = &run.summary;
    println!();
    println!("========== Cleanup Summary ==========");
    if summary.dry_run {
        println!("  Mode:                  DRY RUN (nothing was deleted)");
    }
    println!("  Policy:                {}", run.policy);
    println!("  Projects scanned:      {}", summary.projects_scanned);
    println!("  Projects skipped:      {}", summary.projects_skipped);
    println!("  Repositories scanned:  {}", summary.repositories_scanned);
    println!("  Artifacts evaluated:   {}", summary.artifacts_evaluated);
    println!("  Artifacts kept:        {}", summary.artifacts_kept);
    println!(
        "  {:<22} {}",
        format!("{}:", summary.deleted_label()),
        summary.artifacts_deleted
    );
    println!("  Delete failures:       {}", summary.delete_failures);
    if !run.errors.is_empty() {
        println!("  Scopes skipped:        {}", run.errors.len());
    }
    println!("  Audit report:          {}", report.display());
}
