//! NovSU roster crawler CLI
//!
//! Local execution entry point. For the HTTP API, use `roster-server`.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use roster_crawler::{
    error::{AppError, Result},
    models::Config,
    pipeline::{GroupsPipeline, RefreshOutcome},
    storage::CacheLookup,
};

/// Crawls the NovSU portal for student groups and rosters
#[derive(Parser, Debug)]
#[command(name = "roster-crawler", version, about = "NovSU group roster crawler")]
struct Cli {
    /// Path to the config file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve cached groups or crawl the portal, printing JSON
    Refresh {
        /// Crawl even if the cache is still valid
        #[arg(long)]
        force: bool,
    },

    /// Scrape a single group, bypassing the cache
    Group {
        /// Four-digit group number
        id: String,
    },

    /// List discovered group numbers
    Discover,

    /// Clear the cache
    Invalidate,

    /// Show cache status
    Info,

    /// Validate configuration
    Validate,
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp_secs()
        .init();
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut config = Config::load_or_default(&cli.config);
    config.apply_env_overrides();

    log::info!("Validating configuration...");
    if let Err(e) = config.validate() {
        log::error!("Config validation failed: {}", e);
        return Err(e);
    }

    if let Command::Validate = cli.command {
        log::info!("✓ Config OK");
        return Ok(());
    }

    let pipeline = GroupsPipeline::from_config(&config)?;

    match cli.command {
        Command::Refresh { force } => {
            let outcome = if force {
                pipeline.crawl_or_stale().await?
            } else {
                pipeline.refresh().await?
            };

            match &outcome {
                RefreshOutcome::Cached(entry) => {
                    log::info!("Cache hit ({} groups)", entry.groups.len())
                }
                RefreshOutcome::Fresh {
                    entry, duration_ms, ..
                } => log::info!(
                    "Crawled {} groups in {} ms",
                    entry.groups.len(),
                    duration_ms
                ),
                RefreshOutcome::Stale { error, .. } => {
                    log::warn!("Crawl failed ({}), printing stale cache", error)
                }
            }

            print_json(outcome.entry())?;
        }

        Command::Group { id } => match pipeline.group(&id).await? {
            Some(record) => print_json(&record)?,
            None => {
                log::error!("Group {} not found on the portal", id);
                return Err(AppError::NotFound {
                    url: config.portal.group_url(&id)?,
                });
            }
        },

        Command::Discover => {
            let numbers = pipeline.discover().await?;
            log::info!("Discovered {} groups", numbers.len());
            for number in numbers {
                println!("{number}");
            }
        }

        Command::Invalidate => {
            pipeline.invalidate().await;
        }

        Command::Info => {
            log::info!("Cache file: {}", config.cache.path.display());
            log::info!("Cache TTL: {} s", config.cache.ttl_secs);

            let now = chrono::Utc::now().timestamp_millis();
            let (status, entry) = match pipeline.store().lookup_at(now).await {
                CacheLookup::Fresh(entry) => ("valid", entry),
                CacheLookup::Expired(entry) => ("expired", entry),
                CacheLookup::Missing => {
                    log::info!("No cache yet.");
                    return Ok(());
                }
                CacheLookup::Corrupt(reason) => {
                    log::warn!("Cache unreadable: {}", reason);
                    return Ok(());
                }
            };

            let statistics = entry.statistics();
            log::info!("Cache status: {}", status);
            log::info!("Last parsed: {}", entry.parsed_at());
            log::info!(
                "Groups: {} kept of {} discovered",
                entry.groups.len(),
                entry.total_groups
            );
            for (course, count) in &statistics.by_course {
                log::info!("  course {}: {}", course, count);
            }
            for (institution, count) in &statistics.by_institution {
                log::info!("  {}: {}", institution, count);
            }
        }

        Command::Validate => {}
    }

    Ok(())
}
