//! The ingestion loop.
//!
//! Channels are scraped one at a time over a single platform session. Each
//! channel goes resolve → stream → flush every `batch_size` records → write
//! channel metadata, and ends as exactly one [`ChannelOutcome`]. Only a
//! failed connect or an unwritable run report fails a whole run.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, TimeDelta, Utc};
use medlake_core::{
    is_valid_channel_ref, AppConfig, ChannelPolicy, ChannelRegistry, NormalizedMessage,
};
use medlake_lake::{ChannelMetadataRecord, DataLake, LakeError, ScrapingInfo};
use medlake_telegram::{
    MediaPolicy, MessageStream, PlatformSession, StreamOptions, DEFAULT_ITEM_DELAY,
    DEFAULT_PAGE_SIZE,
};
use serde::Serialize;

use crate::error::ScrapeError;
use crate::metrics::{ChannelSummary, MetricsSink};
use crate::report::{ChannelOutcome, CompletedRun, RunReport, ScrapePhase};

pub const DEFAULT_BATCH_SIZE: usize = 100;
pub const DEFAULT_CHANNEL_DELAY: Duration = Duration::from_secs(2);
/// Per-channel limit used by [`Scraper::incremental_scrape`].
pub const INCREMENTAL_LIMIT: usize = 500;

#[derive(Debug, Clone)]
pub struct ScrapeSettings {
    /// Records held in memory before a flush to the lake.
    pub batch_size: usize,
    /// Pause between consecutive channels of one run.
    pub channel_delay: Duration,
    /// Minimum gap between two yielded messages.
    pub message_delay: Duration,
    pub page_size: usize,
    /// Channels to scrape instead of the registry's enabled set.
    pub channel_override: Vec<String>,
}

impl Default for ScrapeSettings {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            channel_delay: DEFAULT_CHANNEL_DELAY,
            message_delay: DEFAULT_ITEM_DELAY,
            page_size: DEFAULT_PAGE_SIZE,
            channel_override: Vec::new(),
        }
    }
}

impl ScrapeSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            batch_size: config.scraper_batch_size.max(1),
            channel_delay: Duration::from_millis(config.scraper_channel_delay_ms),
            message_delay: Duration::from_millis(config.scraper_message_delay_ms),
            page_size: DEFAULT_PAGE_SIZE,
            channel_override: config.telegram_channels.clone(),
        }
    }
}

/// One row of [`Scraper::status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelStatus {
    pub username: String,
    pub name: String,
    pub category: String,
    pub priority: u8,
    pub enabled: bool,
    /// False for channels requested by name that are not in the registry.
    pub registered: bool,
    pub metrics: Option<ChannelSummary>,
}

/// One row of [`Scraper::check_connectivity`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ConnectivityCheck {
    pub channel: String,
    pub accessible: bool,
    pub title: Option<String>,
    pub participants_count: Option<i64>,
    pub error: Option<String>,
}

/// Counts for one channel's stream, plus why it stopped early, if it did.
#[derive(Debug, Default)]
struct StreamTally {
    messages: usize,
    images: usize,
    documents: usize,
    error: Option<String>,
    run_fatal: bool,
}

pub struct Scraper<P, M> {
    platform: P,
    lake: DataLake,
    registry: ChannelRegistry,
    metrics: M,
    settings: ScrapeSettings,
}

impl<P: PlatformSession, M: MetricsSink> Scraper<P, M> {
    #[must_use]
    pub fn new(
        platform: P,
        lake: DataLake,
        registry: ChannelRegistry,
        metrics: M,
        settings: ScrapeSettings,
    ) -> Self {
        Self {
            platform,
            lake,
            registry,
            metrics,
            settings,
        }
    }

    #[must_use]
    pub fn platform(&self) -> &P {
        &self.platform
    }

    #[must_use]
    pub fn lake(&self) -> &DataLake {
        &self.lake
    }

    #[must_use]
    pub fn metrics(&self) -> &M {
        &self.metrics
    }

    /// The channels a full run visits: the configured override if any,
    /// otherwise the registry's enabled channels.
    #[must_use]
    pub fn target_channels(&self) -> Vec<String> {
        if self.settings.channel_override.is_empty() {
            self.registry
                .usernames()
                .into_iter()
                .map(str::to_owned)
                .collect()
        } else {
            self.settings.channel_override.clone()
        }
    }

    fn policy(&self, channel: &str) -> ChannelPolicy {
        self.registry
            .get(channel)
            .cloned()
            .unwrap_or_else(|| ChannelPolicy::adhoc(channel))
    }

    fn channel_limit(&self, channel: &str, requested: usize) -> usize {
        requested.min(self.policy(channel).scrape_limit)
    }

    /// Scrapes one channel over an already connected session.
    ///
    /// Never fails: every problem is folded into the returned outcome. The
    /// channel's `metadata.json` is written whenever the channel resolved,
    /// even if the stream stopped early.
    pub async fn scrape_channel(
        &mut self,
        channel: &str,
        limit: usize,
        since: Option<DateTime<Utc>>,
    ) -> ChannelOutcome {
        let started = Utc::now();
        let partition_date = started.date_naive();
        tracing::info!(channel, limit, since = ?since, "scraping channel");

        if !is_valid_channel_ref(channel) {
            tracing::error!(channel, "rejected malformed channel name");
            return ChannelOutcome::failed(
                channel,
                ScrapePhase::Resolving,
                format!("invalid channel name '{channel}'"),
                false,
            );
        }

        let info = match self.platform.channel_info(channel).await {
            Ok(Some(info)) => info,
            Ok(None) => {
                tracing::error!(channel, "channel not found or not accessible");
                return ChannelOutcome::failed(
                    channel,
                    ScrapePhase::Resolving,
                    format!("could not resolve channel {channel}"),
                    false,
                );
            }
            Err(e) => {
                tracing::error!(channel, error = %e, "failed to resolve channel");
                return ChannelOutcome::failed(
                    channel,
                    ScrapePhase::Resolving,
                    e.to_string(),
                    e.is_run_fatal(),
                );
            }
        };

        let tally = self
            .stream_into_lake(channel, limit, since, partition_date)
            .await;

        let record = ChannelMetadataRecord {
            channel_info: info,
            scraping_info: ScrapingInfo {
                scraped_at: started,
                messages_scraped: tally.messages,
                images_scraped: tally.images,
                limit,
                offset_date: since,
            },
        };
        if let Err(e) = self
            .lake
            .save_channel_metadata(channel, &record, partition_date)
        {
            tracing::warn!(channel, error = %e, "failed to save channel metadata");
        }

        self.metrics
            .record_channel(channel, tally.messages, tally.images);

        match tally.error {
            None => {
                tracing::info!(
                    channel,
                    messages = tally.messages,
                    images = tally.images,
                    documents = tally.documents,
                    "channel scraped"
                );
                ChannelOutcome::Success {
                    channel: channel.to_owned(),
                    messages_scraped: tally.messages,
                    images_scraped: tally.images,
                    documents_scraped: tally.documents,
                    data_path: self.lake.layout().partition_dir(partition_date, channel),
                }
            }
            Some(error) => ChannelOutcome::Failed {
                channel: channel.to_owned(),
                phase: ScrapePhase::Streaming,
                error,
                messages_scraped: tally.messages,
                images_scraped: tally.images,
                run_fatal: tally.run_fatal,
            },
        }
    }

    async fn stream_into_lake(
        &self,
        channel: &str,
        limit: usize,
        since: Option<DateTime<Utc>>,
        partition_date: NaiveDate,
    ) -> StreamTally {
        let options = StreamOptions::new(limit)
            .since(since)
            .item_delay(self.settings.message_delay)
            .page_size(self.settings.page_size)
            .media(MediaPolicy::from_channel(&self.policy(channel)));
        let mut stream = MessageStream::new(&self.platform, channel, options);

        let batch_size = self.settings.batch_size.max(1);
        let mut batch: Vec<NormalizedMessage> = Vec::with_capacity(batch_size.min(limit));
        let mut tally = StreamTally::default();
        let mut storage_failed = false;

        while let Some(item) = stream.next().await {
            match item {
                Ok(message) => batch.push(message),
                Err(e) => {
                    tracing::error!(channel, error = %e, "message stream ended early");
                    tally.run_fatal = e.is_run_fatal();
                    tally.error = Some(e.to_string());
                    break;
                }
            }
            if batch.len() >= batch_size {
                if let Err(e) = self.flush(channel, &mut batch, partition_date, &mut tally) {
                    tracing::error!(channel, error = %e, "failed to flush batch");
                    tally.error = Some(e.to_string());
                    storage_failed = true;
                    break;
                }
            }
        }

        let fetched = stream.yielded();
        if !storage_failed {
            if let Err(e) = self.flush(channel, &mut batch, partition_date, &mut tally) {
                tracing::error!(channel, error = %e, "failed to flush final batch");
                tally.error.get_or_insert(e.to_string());
            }
        }
        if fetched > tally.messages {
            tracing::warn!(
                channel,
                fetched,
                stored = tally.messages,
                "fetched messages were not stored"
            );
        }
        tally
    }

    fn flush(
        &self,
        channel: &str,
        batch: &mut Vec<NormalizedMessage>,
        partition_date: NaiveDate,
        tally: &mut StreamTally,
    ) -> Result<(), LakeError> {
        if batch.is_empty() {
            return Ok(());
        }
        self.lake.save_messages(channel, batch, partition_date)?;
        tally.messages += batch.len();
        tally.images += batch.iter().map(|m| m.image_paths.len()).sum::<usize>();
        tally.documents += batch.iter().map(|m| m.document_paths.len()).sum::<usize>();
        batch.clear();
        Ok(())
    }

    /// Scrapes every target channel over one session and writes the run
    /// report. `days_back` may be fractional; a non-positive value means no
    /// lower date bound.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Connect`] if the session cannot be opened and
    /// [`ScrapeError::Report`] if the report cannot be written.
    pub async fn scrape_all_channels(
        &mut self,
        limit_per_channel: usize,
        days_back: f64,
    ) -> Result<CompletedRun, ScrapeError> {
        let channels = self.target_channels();
        self.scrape_channels(&channels, limit_per_channel, days_back)
            .await
    }

    /// [`Self::scrape_all_channels`] over an explicit channel list.
    ///
    /// # Errors
    ///
    /// Same as [`Self::scrape_all_channels`].
    pub async fn scrape_channels(
        &mut self,
        channels: &[String],
        limit_per_channel: usize,
        days_back: f64,
    ) -> Result<CompletedRun, ScrapeError> {
        let since = since_days_back(Utc::now(), days_back);
        tracing::info!(
            channels = channels.len(),
            limit_per_channel,
            days_back,
            "starting scrape run"
        );

        self.platform.connect().await.map_err(ScrapeError::Connect)?;

        let mut results = Vec::with_capacity(channels.len());
        let mut abort_cause: Option<String> = None;
        for (index, channel) in channels.iter().enumerate() {
            if let Some(cause) = &abort_cause {
                results.push(ChannelOutcome::aborted(channel, cause));
                continue;
            }
            if index > 0 && !self.settings.channel_delay.is_zero() {
                tokio::time::sleep(self.settings.channel_delay).await;
            }

            let limit = self.channel_limit(channel, limit_per_channel);
            let outcome = self.scrape_channel(channel, limit, since).await;
            if let ChannelOutcome::Failed {
                error,
                run_fatal: true,
                ..
            } = &outcome
            {
                tracing::error!(channel = %channel, error = %error, "session lost, aborting run");
                abort_cause = Some(error.clone());
            }
            results.push(outcome);
        }

        self.platform.disconnect();

        let generated_at = Utc::now();
        let report = RunReport::new(results, generated_at);
        let report_path = self
            .lake
            .save_run_report(&report, generated_at)
            .map_err(ScrapeError::Report)?;

        if report.failed_channels > 0 {
            tracing::warn!(
                failed = report.failed_channels,
                total = report.total_channels,
                "some channels failed"
            );
        }
        tracing::info!(
            successful = report.successful_channels,
            failed = report.failed_channels,
            messages = report.total_messages,
            images = report.total_images,
            path = %report_path.display(),
            "scrape run finished"
        );
        Ok(CompletedRun {
            report,
            report_path,
        })
    }

    /// Full run bounded to the last `hours_back` hours, [`INCREMENTAL_LIMIT`]
    /// messages per channel.
    ///
    /// # Errors
    ///
    /// Same as [`Self::scrape_all_channels`].
    pub async fn incremental_scrape(&mut self, hours_back: f64) -> Result<CompletedRun, ScrapeError> {
        self.scrape_all_channels(INCREMENTAL_LIMIT, hours_back / 24.0)
            .await
    }

    /// Opens its own session, scrapes `channel`, and closes the session.
    /// No run report is written.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Connect`] if the session cannot be opened.
    pub async fn scrape_single_channel(
        &mut self,
        channel: &str,
        limit: usize,
        days_back: f64,
    ) -> Result<ChannelOutcome, ScrapeError> {
        let since = since_days_back(Utc::now(), days_back);
        self.platform.connect().await.map_err(ScrapeError::Connect)?;
        let limit = self.channel_limit(channel, limit);
        let outcome = self.scrape_channel(channel, limit, since).await;
        self.platform.disconnect();
        Ok(outcome)
    }

    /// Target channels with their policy and recorded metrics.
    #[must_use]
    pub fn status(&self) -> Vec<ChannelStatus> {
        self.target_channels()
            .into_iter()
            .map(|channel| {
                let registered = self.registry.get(&channel).is_some();
                let policy = self.policy(&channel);
                ChannelStatus {
                    metrics: self.metrics.channel_summary(&channel),
                    username: channel,
                    name: policy.name,
                    category: policy.category,
                    priority: policy.priority,
                    enabled: policy.enabled,
                    registered,
                }
            })
            .collect()
    }

    /// Connects and resolves every target channel without scraping.
    ///
    /// # Errors
    ///
    /// Returns [`ScrapeError::Connect`] if the session cannot be opened.
    pub async fn check_connectivity(&mut self) -> Result<Vec<ConnectivityCheck>, ScrapeError> {
        self.platform.connect().await.map_err(ScrapeError::Connect)?;

        let mut checks = Vec::new();
        for channel in self.target_channels() {
            if !is_valid_channel_ref(&channel) {
                checks.push(ConnectivityCheck {
                    error: Some(format!("invalid channel name '{channel}'")),
                    channel,
                    accessible: false,
                    title: None,
                    participants_count: None,
                });
                continue;
            }
            let check = match self.platform.channel_info(&channel).await {
                Ok(Some(info)) => ConnectivityCheck {
                    channel,
                    accessible: true,
                    title: info.title,
                    participants_count: info.participants_count,
                    error: None,
                },
                Ok(None) => ConnectivityCheck {
                    channel,
                    accessible: false,
                    title: None,
                    participants_count: None,
                    error: Some("channel not found".to_owned()),
                },
                Err(e) => ConnectivityCheck {
                    channel,
                    accessible: false,
                    title: None,
                    participants_count: None,
                    error: Some(e.to_string()),
                },
            };
            tracing::info!(
                channel = %check.channel,
                accessible = check.accessible,
                "connectivity checked"
            );
            checks.push(check);
        }

        self.platform.disconnect();
        Ok(checks)
    }
}

/// Lower date bound `days_back` days before `now`. Non-positive, non-finite
/// or out-of-range values give no bound.
#[must_use]
pub fn since_days_back(now: DateTime<Utc>, days_back: f64) -> Option<DateTime<Utc>> {
    if !days_back.is_finite() || days_back <= 0.0 {
        return None;
    }
    #[allow(clippy::cast_possible_truncation)]
    let millis = (days_back * 86_400_000.0).round() as i64;
    TimeDelta::try_milliseconds(millis).and_then(|delta| now.checked_sub_signed(delta))
}
