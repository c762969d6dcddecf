use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};

/// Default configuration file looked up in the working directory
pub const DEFAULT_CONFIG_FILE: &str = "bucketsweep.toml";

/// Prefix for environment variable overrides, e.g. `BUCKETSWEEP__CLEANUP__WORKERS=8`
pub const ENV_PREFIX: &str = "BUCKETSWEEP__";

/// Object storage connection settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Storage endpoint DSN: `s3://host[:port]`, `file:///path` or `memory://`
    pub dsn: String,
    /// Bucket to sweep
    pub bucket: String,
    /// Restrict the sweep to keys under this prefix
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
    pub region: String,
    /// Use https for S3-compatible endpoints
    pub use_ssl: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            dsn: String::from("memory://"),
            bucket: String::new(),
            prefix: None,
            access_key_id: None,
            secret_access_key: None,
            region: String::from("us-east-1"),
            use_ssl: false,
        }
    }
}

/// How the bucket listing feeds the worker pool
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EnumerationMode {
    /// Count every object first, then list again to feed workers
    #[default]
    TwoPass,
    /// List once, growing the discovered total while feeding workers
    SinglePass,
}

/// Cleanup policy and pipeline tuning
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CleanupConfig {
    /// Objects modified within this many days of run start are kept
    pub max_age_days: u64,
    /// Objects smaller than this are kept
    pub min_size_bytes: u64,
    /// Report eligible objects without deleting them
    pub dry_run: bool,
    /// Number of parallel deletion workers
    pub workers: usize,
    /// Interval between progress lines
    #[serde(with = "humantime_serde")]
    pub progress_interval: Duration,
    pub enumeration: EnumerationMode,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            max_age_days: 30,
            min_size_bytes: 0,
            // Deleting must be asked for explicitly
            dry_run: true,
            workers: 4,
            progress_interval: Duration::from_secs(10),
            enumeration: EnumerationMode::TwoPass,
        }
    }
}

impl CleanupConfig {
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.workers == 0 {
            anyhow::bail!("cleanup.workers must be at least 1, got 0");
        }

        if self.progress_interval.is_zero() {
            anyhow::bail!("cleanup.progress_interval must be positive");
        }

        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Append log output to this file in addition to stdout
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    /// Default filter directive when RUST_LOG is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_file: None,
            level: String::from("info"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, Default)]
pub struct Configuration {
    pub storage: StorageConfig,
    pub cleanup: CleanupConfig,
    pub logging: LoggingConfig,
}

impl Configuration {
    /// Load defaults, `bucketsweep.toml` if present, then environment overrides
    pub fn load() -> Result<Self, Box<figment::Error>> {
        Self::figment(Toml::file(DEFAULT_CONFIG_FILE))
            .extract()
            .map_err(Box::new)
    }

    /// Load from an explicit file, which must exist
    pub fn load_from_path(path: &Path) -> Result<Self, Box<figment::Error>> {
        if !path.exists() {
            return Err(Box::new(figment::Error::from(format!(
                "configuration file not found: {}",
                path.display()
            ))));
        }

        Self::figment(Toml::file(path)).extract().map_err(Box::new)
    }

    fn figment(file: figment::providers::Data<Toml>) -> Figment {
        Figment::from(Serialized::defaults(Configuration::default()))
            .merge(file)
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.storage.dsn.is_empty() {
            anyhow::bail!("storage.dsn cannot be empty");
        }

        if self.storage.bucket.is_empty() {
            anyhow::bail!("storage.bucket must be set");
        }

        self.cleanup.validate()
    }
}
