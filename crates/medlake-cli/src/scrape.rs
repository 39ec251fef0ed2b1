//! Scrape, status and connectivity command handlers.
//!
//! Per-channel failures are already folded into the run report by the
//! scraper; these handlers only turn "every channel failed" into a failing
//! exit.

use medlake_core::{AppConfig, ChannelRegistry};
use medlake_lake::DataLake;
use medlake_scraper::{
    ChannelOutcome, CompletedRun, JsonMetricsStore, ScrapeSettings, Scraper, INCREMENTAL_LIMIT,
};
use medlake_telegram::TelegramClient;

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ScrapeRequest {
    pub(crate) channels: Vec<String>,
    pub(crate) limit: usize,
    pub(crate) days_back: f64,
    pub(crate) hours_back: Option<f64>,
}

fn build_scraper(
    config: &AppConfig,
    registry: ChannelRegistry,
) -> anyhow::Result<Scraper<TelegramClient, JsonMetricsStore>> {
    let client = TelegramClient::from_config(config)
        .map_err(|e| anyhow::anyhow!("failed to build Telegram client: {e}"))?;
    Ok(Scraper::new(
        client,
        DataLake::new(&config.data_dir),
        registry,
        JsonMetricsStore::open(config.metrics_file()),
        ScrapeSettings::from_app_config(config),
    ))
}

/// Run a full, channel-filtered or incremental scrape. `hours_back`
/// overrides both `limit` and `days_back`.
///
/// # Errors
///
/// Returns an error if the client cannot be built, the session cannot be
/// opened, the report cannot be written, or every channel failed.
pub(crate) async fn run_scrape(
    config: &AppConfig,
    registry: ChannelRegistry,
    request: ScrapeRequest,
) -> anyhow::Result<()> {
    let mut scraper = build_scraper(config, registry)?;

    let run = match (request.hours_back, request.channels.is_empty()) {
        (Some(hours), true) => scraper.incremental_scrape(hours).await?,
        (Some(hours), false) => {
            scraper
                .scrape_channels(&request.channels, INCREMENTAL_LIMIT, hours / 24.0)
                .await?
        }
        (None, true) => {
            scraper
                .scrape_all_channels(request.limit, request.days_back)
                .await?
        }
        (None, false) => {
            scraper
                .scrape_channels(&request.channels, request.limit, request.days_back)
                .await?
        }
    };

    print_run(&run);

    if run.report.all_failed() {
        anyhow::bail!("all {} channels failed", run.report.total_channels);
    }
    Ok(())
}

/// Scrape one channel in its own session. The incremental window applies
/// when `hours_back` is set.
///
/// # Errors
///
/// Returns an error if the session cannot be opened or the channel failed.
pub(crate) async fn run_single(
    config: &AppConfig,
    registry: ChannelRegistry,
    channel: &str,
    request: &ScrapeRequest,
) -> anyhow::Result<()> {
    let mut scraper = build_scraper(config, registry)?;
    let (limit, days_back) = match request.hours_back {
        Some(hours) => (INCREMENTAL_LIMIT, hours / 24.0),
        None => (request.limit, request.days_back),
    };

    let outcome = scraper
        .scrape_single_channel(channel, limit, days_back)
        .await?;
    print_outcome(&outcome);

    if let Some(error) = outcome.error() {
        anyhow::bail!("channel {channel} failed: {error}");
    }
    Ok(())
}

fn print_outcome(outcome: &ChannelOutcome) {
    match outcome {
        ChannelOutcome::Success {
            channel,
            messages_scraped,
            images_scraped,
            documents_scraped,
            ..
        } => println!(
            "{channel}: {messages_scraped} messages, {images_scraped} images, {documents_scraped} documents"
        ),
        ChannelOutcome::Failed {
            channel,
            phase,
            error,
            messages_scraped,
            ..
        } => println!(
            "{channel}: FAILED while {phase:?} after {messages_scraped} messages: {error}"
        ),
    }
}

fn print_run(run: &CompletedRun) {
    let report = &run.report;
    for outcome in &report.results {
        print_outcome(outcome);
    }
    println!(
        "scrape complete: {}/{} channels succeeded, {} messages, {} images",
        report.successful_channels,
        report.total_channels,
        report.total_messages,
        report.total_images
    );
    println!("report: {}", run.report_path.display());
}

/// Print configured channels with their recorded metrics. Does not connect.
///
/// # Errors
///
/// Returns an error if the client cannot be built.
pub(crate) fn run_status(config: &AppConfig, registry: ChannelRegistry) -> anyhow::Result<()> {
    let scraper = build_scraper(config, registry)?;
    for status in scraper.status() {
        let state = if status.enabled { "enabled" } else { "disabled" };
        print!(
            "{} [{}] priority {} {state}",
            status.username, status.category, status.priority
        );
        match &status.metrics {
            Some(m) => println!(
                ": {} messages, {} images over {} scrapes ({} days), last {}",
                m.total_messages,
                m.total_images,
                m.total_scrapes,
                m.days_scraped,
                m.last_scraped
                    .map_or_else(|| "never".to_owned(), |t| t.to_rfc3339())
            ),
            None => println!(": never scraped"),
        }
    }
    Ok(())
}

/// Dry run: connect and resolve every configured channel.
///
/// # Errors
///
/// Returns an error if the session cannot be opened or no channel is
/// accessible.
pub(crate) async fn run_check(config: &AppConfig, registry: ChannelRegistry) -> anyhow::Result<()> {
    let mut scraper = build_scraper(config, registry)?;
    let checks = scraper.check_connectivity().await?;

    for check in &checks {
        if check.accessible {
            println!(
                "{}: ok ({}, {} subscribers)",
                check.channel,
                check.title.as_deref().unwrap_or("untitled"),
                check
                    .participants_count
                    .map_or_else(|| "unknown".to_owned(), |n| n.to_string())
            );
        } else {
            println!(
                "{}: inaccessible ({})",
                check.channel,
                check.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    if !checks.is_empty() && checks.iter().all(|c| !c.accessible) {
        anyhow::bail!("none of {} channels is accessible", checks.len());
    }
    Ok(())
}
