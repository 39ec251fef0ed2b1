use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Where a channel's scrape stopped when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrapePhase {
    Resolving,
    Streaming,
    /// Never attempted because an earlier channel lost the session.
    Aborted,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ChannelOutcome {
    Success {
        channel: String,
        messages_scraped: usize,
        images_scraped: usize,
        documents_scraped: usize,
        data_path: PathBuf,
    },
    Failed {
        channel: String,
        phase: ScrapePhase,
        error: String,
        /// Records flushed before the failure.
        messages_scraped: usize,
        images_scraped: usize,
        #[serde(skip)]
        run_fatal: bool,
    },
}

impl ChannelOutcome {
    pub(crate) fn failed(channel: &str, phase: ScrapePhase, error: String, run_fatal: bool) -> Self {
        Self::Failed {
            channel: channel.to_owned(),
            phase,
            error,
            messages_scraped: 0,
            images_scraped: 0,
            run_fatal,
        }
    }

    pub(crate) fn aborted(channel: &str, cause: &str) -> Self {
        Self::failed(
            channel,
            ScrapePhase::Aborted,
            format!("run aborted: {cause}"),
            false,
        )
    }

    #[must_use]
    pub fn channel(&self) -> &str {
        match self {
            Self::Success { channel, .. } | Self::Failed { channel, .. } => channel,
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    #[must_use]
    pub fn messages_scraped(&self) -> usize {
        match self {
            Self::Success {
                messages_scraped, ..
            }
            | Self::Failed {
                messages_scraped, ..
            } => *messages_scraped,
        }
    }

    #[must_use]
    pub fn images_scraped(&self) -> usize {
        match self {
            Self::Success { images_scraped, .. } | Self::Failed { images_scraped, .. } => {
                *images_scraped
            }
        }
    }

    /// True when the failure invalidated the session for every later channel.
    #[must_use]
    pub fn is_run_fatal(&self) -> bool {
        matches!(self, Self::Failed { run_fatal: true, .. })
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failed { error, .. } => Some(error),
        }
    }
}

/// One run's summary, written to `raw/scraping_report_{ts}.json`.
///
/// Message and image totals include the partial counts of failed channels,
/// since those records were flushed to the lake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RunReport {
    pub generated_at: DateTime<Utc>,
    pub total_channels: usize,
    pub successful_channels: usize,
    pub failed_channels: usize,
    pub total_messages: usize,
    pub total_images: usize,
    pub results: Vec<ChannelOutcome>,
}

impl RunReport {
    #[must_use]
    pub fn new(results: Vec<ChannelOutcome>, generated_at: DateTime<Utc>) -> Self {
        let successful_channels = results.iter().filter(|r| r.is_success()).count();
        Self {
            generated_at,
            total_channels: results.len(),
            successful_channels,
            failed_channels: results.len() - successful_channels,
            total_messages: results.iter().map(ChannelOutcome::messages_scraped).sum(),
            total_images: results.iter().map(ChannelOutcome::images_scraped).sum(),
            results,
        }
    }

    /// At least one channel was attempted and none succeeded.
    #[must_use]
    pub fn all_failed(&self) -> bool {
        self.total_channels > 0 && self.successful_channels == 0
    }
}

/// A finished run and where its report was written.
#[derive(Debug, Clone)]
pub struct CompletedRun {
    pub report: RunReport,
    pub report_path: PathBuf,
}
