use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use common::cli::{CommonArgs, CommonCommands, utils};
use common::storage::create_object_store;
use std::sync::Arc;
use sweeper::{ObjectStoreBucket, SweepOptions, Sweeper};

#[derive(Parser)]
#[command(name = "bucketsweep")]
#[command(about = "Delete old, large objects from an object-storage bucket")]
#[command(version)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Option<BucketSweepCommands>,
}

#[derive(Subcommand)]
enum BucketSweepCommands {
    #[command(flatten)]
    Common(CommonCommands),
}

impl Default for BucketSweepCommands {
    fn default() -> Self {
        Self::Common(CommonCommands::Run)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The log file location lives in the configuration, so load it first
    let mut config = utils::load_config(cli.common.config.as_ref())?;
    if cli.common.dry_run {
        config.cleanup.dry_run = true;
    }

    utils::init_logging(&cli.common, &config.logging)?;

    let command = cli.command.unwrap_or_default();
    let BucketSweepCommands::Common(ref common_cmd) = command;
    if utils::handle_common_command(common_cmd, &config)? {
        return Ok(());
    }

    config.validate().context("Invalid configuration")?;

    log::info!("Loaded configuration:");
    log::info!("  Storage DSN: {}", config.storage.dsn);
    log::info!("  Bucket: {}", config.storage.bucket);
    if let Some(log_file) = &config.logging.log_file {
        log::info!("  Log file: {}", log_file.display());
    }

    let object_store =
        create_object_store(&config.storage).context("Failed to create storage client")?;
    let bucket = ObjectStoreBucket::new(config.storage.bucket.clone(), object_store)
        .with_prefix(config.storage.prefix.as_deref());

    let sweeper = Sweeper::new(Arc::new(bucket), SweepOptions::from(&config.cleanup));
    let summary = sweeper.run().await?;

    if summary.counters.processed != summary.counters.total_discovered {
        log::warn!(
            "Processed {} objects but counted {}; the bucket changed during the run",
            summary.counters.processed,
            summary.counters.total_discovered
        );
    }

    Ok(())
}
