use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer, Serialize};
use thiserror::Error;

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml, Yaml},
};

/// Prefix for environment variable overrides, e.g. `HARBOR_REAPER__REGISTRY__PASSWORD`.
pub const ENV_PREFIX: &str = "HARBOR_REAPER__";

/// Configuration file looked up when no path is given on the command line.
pub const DEFAULT_CONFIG_FILE: &str = "harbor-reaper.toml";

const REDACTED: &str = "********";

/// Which cleanup strategy a run executes.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Keep the newest N artifacts per repository, cap snapshots.
    #[default]
    #[serde(alias = "harbor")]
    Retention,
    /// Two-stage workflow driven by images in use on Kubernetes clusters.
    #[serde(alias = "k8s", alias = "kubernetes")]
    Cluster,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strategy::Retention => write!(f, "retention"),
            Strategy::Cluster => write!(f, "cluster"),
        }
    }
}

/// Stage of the cluster strategy.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Discover in-use images and write the manifest.
    Scan,
    /// Read the manifest and delete everything it does not protect.
    Clean,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Scan => write!(f, "scan"),
            Stage::Clean => write!(f, "clean"),
        }
    }
}

/// The unit of work a run performs, resolved from strategy and stage.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Task {
    /// Cluster discovery, writes the manifest.
    Scan,
    /// Manifest-based cleanup.
    Clean,
    /// Time-based cleanup.
    Retain,
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Task::Scan => write!(f, "scan"),
            Task::Clean => write!(f, "clean"),
            Task::Retain => write!(f, "retain"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LogConfig {
    /// Default filter directive when `RUST_LOG` is not set
    pub level: String,
    /// Optional file that receives a copy of every log line
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

/// Connection settings for the Harbor registry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Base URL, e.g. `https://harbor.example.com`
    pub url: String,
    /// Username or robot account name
    pub user: String,
    /// Password or robot account token
    pub password: String,
    /// Items fetched per paginated request
    pub page_size: usize,
    /// Per-request timeout
    #[serde(with = "humantime_serde")]
    pub timeout: Duration,
    /// Retries for transient failures (connection errors, 429, 5xx)
    pub max_retries: u32,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            user: String::new(),
            password: String::new(),
            page_size: 100,
            timeout: Duration::from_secs(30),
            max_retries: 2,
        }
    }
}

impl RegistryConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.url.trim().is_empty() {
            return Err(ConfigError::MissingRegistryField("url"));
        }
        if self.user.trim().is_empty() {
            return Err(ConfigError::MissingRegistryField("user"));
        }
        if self.password.is_empty() {
            return Err(ConfigError::MissingRegistryField("password"));
        }
        if self.page_size == 0 {
            return Err(ConfigError::InvalidPageSize);
        }
        Ok(())
    }
}

/// Parameters shared by both cleanup policies.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetentionSettings {
    /// Artifacts retained per repository by the time-based policy
    pub keep_last: usize,
    /// Snapshot-tagged artifacts retained within the `keep_last` window
    pub max_snapshots: usize,
    /// Regular expression matched against an artifact's primary tag
    pub snapshot_pattern: String,
    /// Projects to scan; empty scans every project
    #[serde(deserialize_with = "deserialize_name_list")]
    pub project_whitelist: Vec<String>,
    /// Pause after every live delete call
    #[serde(with = "humantime_serde")]
    pub delete_interval: Duration,
}

impl Default for RetentionSettings {
    fn default() -> Self {
        Self {
            keep_last: 10,
            max_snapshots: 2,
            snapshot_pattern: "(?i)snapshot".to_string(),
            project_whitelist: Vec::new(),
            delete_interval: Duration::from_millis(200),
        }
    }
}

impl RetentionSettings {
    fn validate(&self) -> Result<(), ConfigError> {
        regex::Regex::new(&self.snapshot_pattern).map_err(|e| {
            ConfigError::InvalidSnapshotPattern {
                pattern: self.snapshot_pattern.clone(),
                message: e.to_string(),
            }
        })?;
        Ok(())
    }

    /// The time-based policy additionally needs a non-empty window.
    fn validate_time_based(&self) -> Result<(), ConfigError> {
        if self.keep_last == 0 {
            return Err(ConfigError::InvalidKeepLast);
        }
        self.validate()
    }
}

/// One Kubernetes environment scanned during discovery.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    pub name: String,
    pub kubeconfig: PathBuf,
    /// Kubeconfig context; the file's current context when unset
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub namespaces: Vec<String>,
    /// Distinct images protected per workload
    #[serde(default = "default_keep")]
    pub keep: usize,
    #[serde(
        default,
        alias = "pod-whitelist",
        alias = "pod_whitelist",
        deserialize_with = "deserialize_name_list"
    )]
    pub workload_whitelist: Vec<String>,
    #[serde(
        default,
        alias = "pod-blacklist",
        alias = "pod_blacklist",
        deserialize_with = "deserialize_name_list"
    )]
    pub workload_blacklist: Vec<String>,
}

fn default_keep() -> usize {
    3
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ClusterConfig {
    pub stage: Option<Stage>,
    /// Manifest written by `scan` and read by `clean`
    pub manifest_file: PathBuf,
    #[serde(default)]
    pub environments: Vec<EnvironmentConfig>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            stage: None,
            manifest_file: PathBuf::from("manifest.csv"),
            environments: Vec::new(),
        }
    }
}

impl ClusterConfig {
    fn validate_scan(&self) -> Result<(), ConfigError> {
        self.validate_manifest_path()?;
        if self.environments.is_empty() {
            return Err(ConfigError::NoEnvironments);
        }
        for env in &self.environments {
            if env.keep == 0 {
                return Err(ConfigError::InvalidKeep {
                    environment: env.name.clone(),
                });
            }
            if env.namespaces.is_empty() {
                return Err(ConfigError::NoNamespaces {
                    environment: env.name.clone(),
                });
            }
        }
        Ok(())
    }

    fn validate_manifest_path(&self) -> Result<(), ConfigError> {
        if self.manifest_file.as_os_str().is_empty() {
            return Err(ConfigError::MissingManifestPath);
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Configuration {
    pub strategy: Strategy,
    /// Report decisions without issuing delete calls
    pub dry_run: bool,
    /// Audit report path; a timestamped name is generated when unset
    pub audit_file: Option<PathBuf>,
    pub log: LogConfig,
    pub registry: RegistryConfig,
    pub retention: RetentionSettings,
    pub cluster: ClusterConfig,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            strategy: Strategy::default(),
            // Nothing is deleted unless explicitly asked for
            dry_run: true,
            audit_file: None,
            log: LogConfig::default(),
            registry: RegistryConfig::default(),
            retention: RetentionSettings::default(),
            cluster: ClusterConfig::default(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("registry.{0} must be set")]
    MissingRegistryField(&'static str),

    #[error("registry.page_size must be positive")]
    InvalidPageSize,

    #[error("retention.keep_last must keep at least one artifact")]
    InvalidKeepLast,

    #[error("retention.snapshot_pattern '{pattern}' is not a valid regular expression: {message}")]
    InvalidSnapshotPattern { pattern: String, message: String },

    #[error("cluster strategy requires cluster.stage to be 'scan' or 'clean'")]
    MissingStage,

    #[error("cluster.manifest_file must be set")]
    MissingManifestPath,

    #[error("cluster scan requires at least one entry in cluster.environments")]
    NoEnvironments,

    #[error("environment '{environment}' must keep at least one image per workload")]
    InvalidKeep { environment: String },

    #[error("environment '{environment}' lists no namespaces")]
    NoNamespaces { environment: String },
}

impl Configuration {
    /// Load defaults, `harbor-reaper.toml` if present, then environment overrides.
    pub fn load() -> Result<Self, ConfigError> {
        let default_file = Path::new(DEFAULT_CONFIG_FILE);
        let path = default_file.exists().then_some(default_file);
        Self::figment(path).extract().map_err(|e| Box::new(e).into())
    }

    /// Load defaults, the given file (TOML, or YAML by extension), then
    /// environment overrides. A missing file is an error.
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        Self::figment(Some(path))
            .extract()
            .map_err(|e| Box::new(e).into())
    }

    fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Configuration::default()));

        if let Some(path) = path {
            let is_yaml = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));
            figment = if is_yaml {
                figment.merge(Yaml::file(path))
            } else {
                figment.merge(Toml::file(path))
            };
        }

        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Resolve the configured strategy and stage into a task.
    pub fn task(&self) -> Result<Task, ConfigError> {
        match self.strategy {
            Strategy::Retention => Ok(Task::Retain),
            Strategy::Cluster => match self.cluster.stage {
                Some(Stage::Scan) => Ok(Task::Scan),
                Some(Stage::Clean) => Ok(Task::Clean),
                None => Err(ConfigError::MissingStage),
            },
        }
    }

    /// Validate the settings the configured task depends on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.validate_for(self.task()?)
    }

    /// Validate the settings a specific task depends on.
    pub fn validate_for(&self, task: Task) -> Result<(), ConfigError> {
        match task {
            Task::Scan => self.cluster.validate_scan(),
            Task::Clean => {
                self.cluster.validate_manifest_path()?;
                self.registry.validate()?;
                self.retention.validate()
            }
            Task::Retain => {
                self.registry.validate()?;
                self.retention.validate_time_based()
            }
        }
    }

    /// Copy of the configuration safe to print.
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if !config.registry.password.is_empty() {
            config.registry.password = REDACTED.to_string();
        }
        config
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum NameList {
    Joined(String),
    List(Vec<String>),
}

/// Accepts `"a, b"` as well as `["a", "b"]`; blank entries are dropped.
fn deserialize_name_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let names = match NameList::deserialize(deserializer)? {
        NameList::Joined(joined) => joined.split(',').map(str::to_owned).collect(),
        NameList::List(list) => list,
    };

    Ok(names
        .into_iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect())
}
