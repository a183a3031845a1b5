//! Fair price shop crawler CLI
//!
//! Local execution entry point. The change summary of a run is printed to
//! stdout; everything else goes to the log on stderr.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use fps_crawler::{
    error::Result,
    models::{Config, StateCode},
    pipeline,
    services::PortalClient,
    storage::{LocalStorage, ShopStorage},
    utils::http,
};

/// Fair price shop directory crawler
#[derive(Parser, Debug)]
#[command(
    name = "fps-crawler",
    version,
    about = "Collects the fair price shop directory and reports changes between runs"
)]
struct Cli {
    /// Path to storage directory containing config and snapshots
    #[arg(short, long, default_value = "storage")]
    storage_dir: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl every state and update the consolidated snapshot
    Crawl {
        /// Reuse saved per-state artifacts instead of refetching those states
        #[arg(long)]
        resume: bool,
    },

    /// Crawl a single state and save its artifact
    State {
        /// State code, e.g. 09
        code: StateCode,
    },

    /// Rebuild the snapshot from saved per-state artifacts
    Aggregate,

    /// Compare two snapshot files
    Diff {
        /// Older snapshot (default: {storage_dir}/previous_ConsolidatedShops.csv)
        #[arg(long)]
        previous: Option<PathBuf>,

        /// Newer snapshot (default: {storage_dir}/ConsolidatedShops.csv)
        #[arg(long)]
        current: Option<PathBuf>,
    },

    /// Validate configuration and the current snapshot
    Validate,

    /// Show current snapshot info
    Info,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config_path = cli.storage_dir.join("config.toml");
    let config = Config::load_or_default(&config_path);
    log::info!("Loaded configuration from {}", cli.storage_dir.display());

    let storage = LocalStorage::new(&cli.storage_dir, config.paths.clone());

    match cli.command {
        Command::Crawl { resume } => {
            config.validate()?;
            let client = http::create_async_client(&config.crawler)?;
            let portal = PortalClient::new(&config, client)?;

            let report = pipeline::run_crawler(&config, &portal, &storage, resume).await?;
            println!("{}", report.changes.render());
        }

        Command::State { code } => {
            config.validate()?;
            let client = http::create_async_client(&config.crawler)?;
            let portal = PortalClient::new(&config, client)?;

            pipeline::run_state(&config, &portal, &storage, &code).await;
        }

        Command::Aggregate => {
            let report = pipeline::run_aggregate(&storage).await?;
            println!("{}", report.changes.render());
        }

        Command::Diff { previous, current } => {
            let previous = previous.unwrap_or_else(|| storage.previous_path());
            let current = current.unwrap_or_else(|| storage.current_path());

            let changes = pipeline::run_diff(&previous, &current).await?;
            println!("{}", changes.render());
        }

        Command::Validate => {
            log::info!("Validating configuration...");

            if let Err(e) = config.validate() {
                log::error!("Config validation failed: {}", e);
                return Err(e);
            }
            log::info!("✓ Config OK");

            match storage.read_snapshot().await {
                Ok(Some(dataset)) => log::info!("✓ Snapshot OK ({} shops)", dataset.len()),
                Ok(None) => log::info!("No snapshot yet"),
                Err(e) => {
                    log::error!("Snapshot validation failed: {}", e);
                    return Err(e);
                }
            }

            log::info!("All validations passed!");
        }

        Command::Info => {
            log::info!("Storage directory: {}", cli.storage_dir.display());

            for (label, snapshot) in [
                ("Current snapshot", storage.read_snapshot().await),
                ("Previous snapshot", storage.read_previous().await),
            ] {
                match snapshot {
                    Ok(Some(dataset)) => log::info!("{}: {} shops", label, dataset.len()),
                    Ok(None) => log::info!("{}: not found", label),
                    Err(e) => log::warn!("{}: unreadable ({})", label, e),
                }
            }

            match storage.load_stats().await {
                Ok(Some(stats)) => {
                    log::info!("Last run finished: {}", stats.end_time);
                    log::info!(
                        "Changes: +{} -{} ~{}",
                        stats.changes.added,
                        stats.changes.removed,
                        stats.changes.updated
                    );
                    log::info!(
                        "Failures: {} states, {}/{} tehsils",
                        stats.state_failures,
                        stats.tehsil_failures,
                        stats.tehsil_total
                    );
                    log::info!(
                        "Rejected: {} tehsil entries, {} shop entries",
                        stats.rejected_tehsils,
                        stats.rejected_records
                    );
                    log::info!("SHA-256: {}", stats.dataset_sha256);
                }
                Ok(None) => log::info!("No run statistics yet."),
                Err(e) => log::warn!("Run statistics unreadable: {}", e),
            }
        }
    }

    log::info!("Done!");

    Ok(())
}
