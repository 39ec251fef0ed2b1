mod channels;
mod lake;
mod scrape;

use clap::{Parser, Subcommand};
use medlake_core::{AppConfig, ChannelRegistry};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "medlake")]
#[command(about = "Telegram channel ingestion into a partitioned JSON data lake")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Scrape channels into the data lake and write a run report
    Scrape {
        /// Channel username to scrape; repeat for several. Defaults to the
        /// configured channels.
        #[arg(long = "channel", value_parser = parse_channel)]
        channels: Vec<String>,
        /// Scrape one channel in its own session, without a run report
        #[arg(long, conflicts_with = "channels", value_parser = parse_channel)]
        single_channel: Option<String>,
        /// Maximum messages per channel (capped by the channel's own limit)
        #[arg(long, default_value_t = 1000)]
        limit: usize,
        /// Only messages from the last N days; fractions allowed, 0 for no bound
        #[arg(long, default_value_t = 30.0)]
        days_back: f64,
        /// Incremental mode: last N hours, at most 500 messages per channel.
        /// Overrides --days-back and --limit.
        #[arg(long)]
        hours_back: Option<f64>,
    },
    /// Show configured channels with their scrape metrics
    Status,
    /// Connect and resolve every channel without scraping
    Check,
    /// Print the channel schedule and registry validation
    Channels,
    /// Inspect and maintain the data lake
    Lake {
        #[command(subcommand)]
        command: LakeCommands,
    },
}

#[derive(Debug, Subcommand)]
enum LakeCommands {
    /// Message, media and storage statistics
    Stats,
    /// Check one channel's stored batches for corruption and duplicates
    Validate {
        #[arg(long, value_parser = parse_channel)]
        channel: String,
    },
    /// Delete date partitions older than the retention window
    Cleanup {
        #[arg(long, default_value_t = 90)]
        days_to_keep: u32,
    },
    /// Print a channel's most recent stored messages
    Latest {
        #[arg(long, value_parser = parse_channel)]
        channel: String,
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },
}

/// Accepts a public username (an optional leading `@` is dropped) or a
/// numeric chat id.
fn parse_channel(raw: &str) -> Result<String, String> {
    let name = raw.trim().trim_start_matches('@');
    if medlake_core::is_valid_channel_ref(name) {
        Ok(name.to_owned())
    } else {
        Err(format!("'{raw}' is not a channel username or chat id"))
    }
}

fn init_tracing(config: &AppConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();
    Ok(())
}

fn load_registry(config: &AppConfig) -> anyhow::Result<ChannelRegistry> {
    match &config.channels_path {
        Some(path) => medlake_core::load_channels(path)
            .map_err(|e| anyhow::anyhow!("failed to load channels from {}: {e}", path.display())),
        None => Ok(ChannelRegistry::default()),
    }
}

/// Runs `work` until it finishes or Ctrl-C arrives. Records already flushed
/// stay on disk; the unflushed batch is dropped.
async fn interruptible<F>(work: F) -> anyhow::Result<()>
where
    F: std::future::Future<Output = anyhow::Result<()>>,
{
    tokio::select! {
        result = work => result,
        _ = tokio::signal::ctrl_c() => {
            tracing::warn!("interrupted, unflushed records were discarded");
            anyhow::bail!("interrupted")
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    let config = medlake_core::load_app_config_from_env()?;
    init_tracing(&config)?;
    let registry = load_registry(&config)?;

    match cli.command {
        Commands::Scrape {
            channels,
            single_channel,
            limit,
            days_back,
            hours_back,
        } => {
            let request = scrape::ScrapeRequest {
                channels,
                limit,
                days_back,
                hours_back,
            };
            match single_channel {
                Some(channel) => {
                    interruptible(scrape::run_single(&config, registry, &channel, &request))
                        .await?;
                }
                None => interruptible(scrape::run_scrape(&config, registry, request)).await?,
            }
        }
        Commands::Status => scrape::run_status(&config, registry)?,
        Commands::Check => interruptible(scrape::run_check(&config, registry)).await?,
        Commands::Channels => channels::run_channels(&registry)?,
        Commands::Lake { command } => match command {
            LakeCommands::Stats => lake::run_stats(&config)?,
            LakeCommands::Validate { channel } => lake::run_validate(&config, &channel)?,
            LakeCommands::Cleanup { days_to_keep } => lake::run_cleanup(&config, days_to_keep)?,
            LakeCommands::Latest { channel, limit } => {
                lake::run_latest(&config, &channel, limit)?;
            }
        },
    }

    Ok(())
}
