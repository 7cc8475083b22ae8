use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Command line arguments shared by every invocation
#[derive(Parser, Debug, Clone)]
pub struct CommonArgs {
    #[arg(short, long, help = "Configuration file path (TOML or YAML)")]
    pub config: Option<PathBuf>,

    #[arg(short, long, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(short, long, help = "Enable quiet mode (minimal output)")]
    pub quiet: bool,

    #[arg(
        long,
        value_name = "BOOL",
        help = "Override dry_run from the configuration (true/false)"
    )]
    pub dry_run: Option<bool>,
}

/// Subcommands of the reaper binary
#[derive(Subcommand, Debug, Clone, Default, PartialEq, Eq)]
pub enum Command {
    /// Run the task selected by `strategy` and `cluster.stage` (default)
    #[default]
    Run,
    /// Discover images in use on the configured clusters and write the manifest
    Scan,
    /// Delete artifacts of in-use repositories that the manifest does not protect
    Clean,
    /// Keep the newest artifacts per repository and delete the rest
    Retain,
    /// Show the effective configuration and exit
    Config {
        #[arg(long, help = "Show configuration in JSON format")]
        json: bool,
    },
    /// Validate the configuration and exit
    Validate,
    /// Show version information and exit
    Version,
}

/// Utility functions for CLI operations
pub mod utils {
    use super::*;
    use crate::config::{Configuration, LogConfig, Task};
    use anyhow::{Context, Result};
    use std::fs::OpenOptions;
    use std::sync::Mutex;
    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    /// Initialize logging to stdout and, when configured, a log file.
    ///
    /// `--verbose` and `--quiet` win over `RUST_LOG`, which wins over `log.level`.
    pub fn init_logging(args: &CommonArgs, log: &LogConfig) -> Result<()> {
        let filter = if args.quiet {
            EnvFilter::new("warn")
        } else if args.verbose {
            EnvFilter::new("debug")
        } else {
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level))
        };

        let file_layer = match &log.file {
            Some(path) => {
                let file = OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(path)
                    .with_context(|| format!("Failed to open log file {}", path.display()))?;
                Some(
                    fmt::layer()
                        .with_ansi(false)
                        .with_target(false)
                        .with_writer(Mutex::new(file)),
                )
            }
            None => None,
        };

        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(false))
            .with(file_layer)
            .try_init()
            .context("Failed to initialize logging")?;

        Ok(())
    }

    /// Load configuration from an explicit path, or from the defaults.
    pub fn load_config(config_path: Option<&PathBuf>) -> Result<Configuration> {
        match config_path {
            Some(path) => {
                Configuration::load_from_path(path).context("Failed to load configuration")
            }
            None => Configuration::load().context("Failed to load configuration"),
        }
    }

    /// Display configuration in human-readable or JSON format, password redacted
    pub fn display_config(config: &Configuration, json: bool) -> Result<()> {
        let config = config.redacted();
        if json {
            let json = serde_json::to_string_pretty(&config)
                .context("Failed to serialize configuration to JSON")?;
            println!("{json}");
            return Ok(());
        }

        println!("Harbor Reaper Configuration:");
        println!("============================");
        println!("Strategy: {}", config.strategy);
        match config.task() {
            Ok(task) => println!("Task: {task}"),
            Err(e) => println!("Task: unresolved ({e})"),
        }
        println!("Dry run: {}", config.dry_run);
        println!("Registry URL: {}", config.registry.url);
        println!("Registry user: {}", config.registry.user);
        println!("Registry page size: {}", config.registry.page_size);
        println!("Registry timeout: {:?}", config.registry.timeout);
        println!("Keep last: {}", config.retention.keep_last);
        println!("Max snapshots: {}", config.retention.max_snapshots);
        println!("Snapshot pattern: {}", config.retention.snapshot_pattern);
        if config.retention.project_whitelist.is_empty() {
            println!("Project whitelist: disabled");
        } else {
            println!(
                "Project whitelist: {}",
                config.retention.project_whitelist.join(", ")
            );
        }
        println!("Manifest file: {}", config.cluster.manifest_file.display());
        for env in &config.cluster.environments {
            println!(
                "Environment {}: kubeconfig={}, namespaces=[{}], keep={}",
                env.name,
                env.kubeconfig.display(),
                env.namespaces.join(", "),
                env.keep
            );
        }
        Ok(())
    }

    /// Validate the configuration for the task it resolves to
    pub fn validate_config(config: &Configuration) -> Result<Task> {
        tracing::info!("Validating configuration...");
        let task = config.task().context("Invalid configuration")?;
        config
            .validate_for(task)
            .context("Invalid configuration")?;
        tracing::info!(task = %task, "Configuration validation passed");
        Ok(task)
    }

    /// Handle commands that don't run a cleanup task.
    ///
    /// Returns `true` when the command was handled.
    pub fn handle_common_command(command: &Command, config: &Configuration) -> Result<bool> {
        match command {
            Command::Config { json } => {
                display_config(config, *json)?;
                Ok(true)
            }
            Command::Validate => {
                validate_config(config)?;
                Ok(true)
            }
            Command::Version => {
                println!("{}", version_info());
                Ok(true)
            }
            Command::Run | Command::Scan | Command::Clean | Command::Retain => Ok(false),
        }
    }

    /// Resolve the task a command runs, falling back to the configuration for `run`.
    pub fn resolve_task(command: &Command, config: &Configuration) -> Result<Option<Task>> {
        let task = match command {
            Command::Run => Some(config.task().context("Invalid configuration")?),
            Command::Scan => Some(Task::Scan),
            Command::Clean => Some(Task::Clean),
            Command::Retain => Some(Task::Retain),
            Command::Config { .. } | Command::Validate | Command::Version => None,
        };
        Ok(task)
    }

    /// Standard version information
    pub fn version_info() -> String {
        format!(
            "{} {} ({})",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            env!("CARGO_PKG_RUST_VERSION")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Configuration, Stage, Strategy, Task};

    #[test]
    fn test_command_default() {
        assert_eq!(Command::default(), Command::Run);
    }

    #[test]
    fn test_version_info() {
        let version = utils::version_info();
        assert!(version.contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_resolve_task_from_configuration() {
        let mut config = Configuration::default();
        assert_eq!(
            utils::resolve_task(&Command::Run, &config).unwrap(),
            Some(Task::Retain)
        );

        config.strategy = Strategy::Cluster;
        assert!(utils::resolve_task(&Command::Run, &config).is_err());

        config.cluster.stage = Some(Stage::Clean);
        assert_eq!(
            utils::resolve_task(&Command::Run, &config).unwrap(),
            Some(Task::Clean)
        );
    }

    #[test]
    fn test_explicit_commands_ignore_strategy() {
        let config = Configuration::default();
        assert_eq!(
            utils::resolve_task(&Command::Scan, &config).unwrap(),
            Some(Task::Scan)
        );
        assert_eq!(
            utils::resolve_task(&Command::Version, &config).unwrap(),
            None
        );
    }

    #[test]
    fn test_parse_dry_run_override() {
        let args = CommonArgs::try_parse_from(["reaper", "--dry-run", "false", "-v"]).unwrap();
        assert_eq!(args.dry_run, Some(false));
        assert!(args.verbose);
        assert!(args.config.is_none());
    }
}
