use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Global CLI arguments
#[derive(Parser, Debug, Clone, Default)]
pub struct CommonArgs {
    #[arg(long, global = true, help = "Configuration file path")]
    pub config: Option<PathBuf>,

    #[arg(short, long, global = true, help = "Enable verbose logging")]
    pub verbose: bool,

    #[arg(short, long, global = true, help = "Enable quiet mode (minimal output)")]
    pub quiet: bool,

    #[arg(
        long,
        global = true,
        help = "Only report eligible objects, never delete (overrides configuration)"
    )]
    pub dry_run: bool,
}

#[derive(Subcommand, Debug, Clone, Default)]
pub enum CommonCommands {
    /// Sweep the bucket (default behavior)
    #[default]
    Run,
    /// Show the effective configuration and exit
    Config {
        #[arg(long, help = "Show configuration in JSON format")]
        json: bool,
    },
    /// Validate configuration and exit
    Validate,
    /// Show version information and exit
    Version,
}

pub mod utils {
    use super::*;
    use crate::config::{Configuration, LoggingConfig};
    use anyhow::{Context, Result};
    use std::fs::{File, OpenOptions};
    use std::path::Path;
    use std::sync::Arc;
    use tracing_subscriber::EnvFilter;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    /// Filter directive derived from CLI flags, falling back to the configured level
    pub fn log_level<'a>(args: &CommonArgs, logging: &'a LoggingConfig) -> &'a str {
        if args.quiet {
            "warn"
        } else if args.verbose {
            "debug"
        } else {
            logging.level.as_str()
        }
    }

    /// Initialize logging to stdout and, if configured, an append-only log file
    ///
    /// `RUST_LOG` takes precedence over both the CLI flags and the configuration.
    pub fn init_logging(args: &CommonArgs, logging: &LoggingConfig) -> Result<()> {
        let filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(log_level(args, logging)));

        let file_layer = match &logging.log_file {
            Some(path) => {
                let file = open_log_file(path)?;
                Some(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Arc::new(file)),
                )
            }
            None => None,
        };

        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .with(file_layer)
            .try_init()
            .context("Failed to initialize logging")?;

        Ok(())
    }

    /// Open a log file for appending, creating parent directories as needed
    pub fn open_log_file(path: &Path) -> Result<File> {
        if let Some(dir) = path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
        }

        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("Failed to open log file {}", path.display()))
    }

    /// Load configuration with optional override from CLI
    pub fn load_config(config_path: Option<&PathBuf>) -> Result<Configuration> {
        match config_path {
            Some(path) => Configuration::load_from_path(path).context("Failed to load configuration"),
            None => Configuration::load().context("Failed to load configuration"),
        }
    }

    /// Configuration as JSON with credentials masked
    pub fn redacted_config(config: &Configuration) -> Result<serde_json::Value> {
        let mut value =
            serde_json::to_value(config).context("Failed to serialize configuration to JSON")?;
        if let Some(secret) = value.pointer_mut("/storage/secret_access_key") {
            if !secret.is_null() {
                *secret = serde_json::Value::String("********".to_string());
            }
        }
        Ok(value)
    }

    /// Display configuration in human-readable or JSON format
    pub fn display_config(config: &Configuration, json: bool) -> Result<()> {
        if json {
            let json = serde_json::to_string_pretty(&redacted_config(config)?)
                .context("Failed to serialize configuration to JSON")?;
            println!("{json}");
        } else {
            println!("bucketsweep configuration:");
            println!("==========================");
            println!("Storage DSN: {}", config.storage.dsn);
            println!("Bucket: {}", config.storage.bucket);
            if let Some(prefix) = &config.storage.prefix {
                println!("Prefix: {prefix}");
            }
            println!("Max age: {} days", config.cleanup.max_age_days);
            println!("Min size: {} bytes", config.cleanup.min_size_bytes);
            println!("Dry run: {}", config.cleanup.dry_run);
            println!("Workers: {}", config.cleanup.workers);
            println!(
                "Progress interval: {:?}",
                config.cleanup.progress_interval
            );
            println!("Enumeration: {:?}", config.cleanup.enumeration);
            match &config.logging.log_file {
                Some(path) => println!("Log file: {}", path.display()),
                None => println!("Log file: none"),
            }
        }
        Ok(())
    }

    /// Validate configuration and report any issues
    pub fn validate_config(config: &Configuration) -> Result<()> {
        log::info!("Validating configuration...");
        config.validate().context("Invalid configuration")?;
        log::info!("Configuration validation passed");
        Ok(())
    }

    /// Handle commands that don't run a sweep
    ///
    /// Returns `true` when the command was fully handled.
    pub fn handle_common_command(command: &CommonCommands, config: &Configuration) -> Result<bool> {
        match command {
            CommonCommands::Config { json } => {
                display_config(config, *json)?;
                Ok(true)
            }
            CommonCommands::Validate => {
                validate_config(config)?;
                Ok(true)
            }
            CommonCommands::Version => {
                println!("{}", version_info());
                Ok(true)
            }
            CommonCommands::Run => Ok(false),
        }
    }

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
    use crate::config::{Configuration, LoggingConfig};

    #[test]
    fn test_common_commands_default() {
        assert!(matches!(CommonCommands::default(), CommonCommands::Run));
    }

    #[test]
    fn test_version_info() {
        let version = utils::version_info();
        assert!(version.contains(env!("CARGO_PKG_VERSION")));
    }

    #[test]
    fn test_log_level_flags() {
        let logging = LoggingConfig::default();

        let args = CommonArgs::default();
        assert_eq!(utils::log_level(&args, &logging), "info");

        let args = CommonArgs {
            verbose: true,
            ..Default::default()
        };
        assert_eq!(utils::log_level(&args, &logging), "debug");

        let args = CommonArgs {
            quiet: true,
            verbose: true,
            ..Default::default()
        };
        assert_eq!(utils::log_level(&args, &logging), "warn");
    }

    #[test]
    fn test_open_log_file_creates_directories() {
        use std::io::Write;

        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("nested/logs/sweep.log");

        let mut file = utils::open_log_file(&path).unwrap();
        writeln!(file, "first").unwrap();
        drop(file);

        let mut file = utils::open_log_file(&path).unwrap();
        writeln!(file, "second").unwrap();
        drop(file);

        let contents = std::fs::read_to_string(&path).unwrap();
        assert_eq!(contents, "first\nsecond\n");
    }

    #[test]
    fn test_redacted_config_masks_secret() {
        let mut config = Configuration::default();
        config.storage.secret_access_key = Some("hunter2".to_string());

        let value = utils::redacted_config(&config).unwrap();
        assert_eq!(value["storage"]["secret_access_key"], "********");
        assert!(!value.to_string().contains("hunter2"));
    }

    #[test]
    fn test_validate_command_reports_errors() {
        let config = Configuration::default();
        let result = utils::handle_common_command(&CommonCommands::Validate, &config);
        assert!(result.is_err());
    }

    #[test]
    fn test_run_command_is_not_handled() {
        let config = Configuration::default();
        let handled = utils::handle_common_command(&CommonCommands::Run, &config).unwrap();
        assert!(!handled);
    }
}
