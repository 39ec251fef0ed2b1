//! Per-channel scrape counters.
//!
//! The orchestrator receives a [`MetricsSink`] at construction. The file
//! backed [`JsonMetricsStore`] keeps `{logs}/scraping_metrics.json` as
//! channel → `YYYY-MM-DD` → [`DailyMetrics`] and rewrites it after every
//! update.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use medlake_core::layout::PARTITION_DATE_FORMAT;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyMetrics {
    pub messages: usize,
    pub images: usize,
    pub last_scraped: DateTime<Utc>,
    pub scraping_count: u32,
}

/// Totals for one channel across every recorded day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChannelSummary {
    pub total_messages: usize,
    pub total_images: usize,
    pub total_scrapes: u32,
    pub days_scraped: usize,
    pub last_scraped: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MetricsTable(BTreeMap<String, BTreeMap<String, DailyMetrics>>);

impl MetricsTable {
    /// Adds one scrape of `channel` to the bucket for `at`'s day.
    pub fn record(&mut self, channel: &str, messages: usize, images: usize, at: DateTime<Utc>) {
        let day = at.format(PARTITION_DATE_FORMAT).to_string();
        let entry = self
            .0
            .entry(channel.to_owned())
            .or_default()
            .entry(day)
            .or_insert(DailyMetrics {
                messages: 0,
                images: 0,
                last_scraped: at,
                scraping_count: 0,
            });
        entry.messages += messages;
        entry.images += images;
        entry.last_scraped = entry.last_scraped.max(at);
        entry.scraping_count += 1;
    }

    #[must_use]
    pub fn summary(&self, channel: &str) -> Option<ChannelSummary> {
        let days = self.0.get(channel)?;
        Some(ChannelSummary {
            total_messages: days.values().map(|d| d.messages).sum(),
            total_images: days.values().map(|d| d.images).sum(),
            total_scrapes: days.values().map(|d| d.scraping_count).sum(),
            days_scraped: days.len(),
            last_scraped: days.values().map(|d| d.last_scraped).max(),
        })
    }

    #[must_use]
    pub fn day(&self, channel: &str, day: &str) -> Option<&DailyMetrics> {
        self.0.get(channel)?.get(day)
    }
}

/// Destination for per-channel scrape counts.
pub trait MetricsSink {
    fn record_channel(&mut self, channel: &str, messages: usize, images: usize);

    fn channel_summary(&self, channel: &str) -> Option<ChannelSummary>;
}

/// In-process sink with no persistence.
#[derive(Debug, Clone, Default)]
pub struct MemoryMetrics {
    table: MetricsTable,
}

impl MemoryMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn table(&self) -> &MetricsTable {
        &self.table
    }
}

impl MetricsSink for MemoryMetrics {
    fn record_channel(&mut self, channel: &str, messages: usize, images: usize) {
        self.table.record(channel, messages, images, Utc::now());
    }

    fn channel_summary(&self, channel: &str) -> Option<ChannelSummary> {
        self.table.summary(channel)
    }
}

/// File-backed sink. A missing or corrupt file starts an empty table; write
/// failures are logged and never fail a run.
#[derive(Debug, Clone)]
pub struct JsonMetricsStore {
    path: PathBuf,
    table: MetricsTable,
}

impl JsonMetricsStore {
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let table = match std::fs::read(&path) {
            Ok(raw) => serde_json::from_slice(&raw).unwrap_or_else(|e| {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "corrupt metrics file, starting empty"
                );
                MetricsTable::default()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => MetricsTable::default(),
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "unreadable metrics file, starting empty"
                );
                MetricsTable::default()
            }
        };
        Self { path, table }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub fn table(&self) -> &MetricsTable {
        &self.table
    }

    fn persist(&self) -> std::io::Result<()> {
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let body = serde_json::to_vec_pretty(&self.table)?;
        let mut tmp_name = self.path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp = self.path.with_file_name(tmp_name);
        std::fs::write(&tmp, body)?;
        std::fs::rename(&tmp, &self.path)
    }
}

impl MetricsSink for JsonMetricsStore {
    fn record_channel(&mut self, channel: &str, messages: usize, images: usize) {
        self.table.record(channel, messages, images, Utc::now());
        if let Err(e) = self.persist() {
            tracing::warn!(
                channel,
                path = %self.path.display(),
                error = %e,
                "failed to write metrics file"
            );
        }
    }

    fn channel_summary(&self, channel: &str) -> Option<ChannelSummary> {
        self.table.summary(channel)
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn same_day_scrapes_accumulate() {
        let mut table = MetricsTable::default();
        let morning = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        let evening = Utc.with_ymd_and_hms(2024, 1, 1, 20, 0, 0).unwrap();

        table.record("chemed", 10, 2, morning);
        table.record("chemed", 5, 1, evening);

        let day = table.day("chemed", "2024-01-01").unwrap();
        assert_eq!(day.messages, 15);
        assert_eq!(day.images, 3);
        assert_eq!(day.scraping_count, 2);
        assert_eq!(day.last_scraped, evening);
    }

    #[test]
    fn summary_spans_days() {
        let mut table = MetricsTable::default();
        let first = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        let second = Utc.with_ymd_and_hms(2024, 1, 3, 8, 0, 0).unwrap();
        table.record("chemed", 10, 2, first);
        table.record("chemed", 4, 0, second);

        let summary = table.summary("chemed").unwrap();
        assert_eq!(summary.total_messages, 14);
        assert_eq!(summary.total_images, 2);
        assert_eq!(summary.total_scrapes, 2);
        assert_eq!(summary.days_scraped, 2);
        assert_eq!(summary.last_scraped, Some(second));
        assert!(table.summary("tikvahpharma").is_none());
    }

    #[test]
    fn table_serializes_as_nested_map() {
        let mut table = MetricsTable::default();
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap();
        table.record("chemed", 3, 1, at);

        let value = serde_json::to_value(&table).unwrap();
        assert_eq!(value["chemed"]["2024-01-01"]["messages"], 3);
        assert_eq!(value["chemed"]["2024-01-01"]["scraping_count"], 1);
    }

    #[test]
    fn json_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs/scraping_metrics.json");

        let mut store = JsonMetricsStore::open(&path);
        store.record_channel("chemed", 7, 2);
        assert!(path.exists());

        let reopened = JsonMetricsStore::open(&path);
        let summary = reopened.channel_summary("chemed").unwrap();
        assert_eq!(summary.total_messages, 7);
        assert_eq!(summary.total_images, 2);
    }

    #[test]
    fn corrupt_metrics_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scraping_metrics.json");
        std::fs::write(&path, b"{not json").unwrap();

        let mut store = JsonMetricsStore::open(&path);
        assert_eq!(store.table(), &MetricsTable::default());

        store.record_channel("chemed", 1, 0);
        let reopened = JsonMetricsStore::open(&path);
        assert_eq!(reopened.channel_summary("chemed").unwrap().total_messages, 1);
    }

    #[test]
    fn memory_metrics_records_without_files() {
        let mut sink = MemoryMetrics::new();
        sink.record_channel("chemed", 2, 1);
        sink.record_channel("chemed", 3, 0);
        let summary = sink.channel_summary("chemed").unwrap();
        assert_eq!(summary.total_messages, 5);
        assert_eq!(summary.total_scrapes, 2);
    }
}
