//! Retention cleanup and lake-wide statistics.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use chrono::{NaiveDate, TimeDelta, Utc};
use serde::Serialize;
use walkdir::WalkDir;

use crate::read::{message_files, partitions};
use crate::store::DataLake;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupFailure {
    pub path: PathBuf,
    pub error: String,
}

/// Result of [`DataLake::cleanup_older_than`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    /// Partitions dated strictly before this day were eligible.
    pub cutoff: Option<NaiveDate>,
    pub removed: Vec<PathBuf>,
    pub failed: Vec<CleanupFailure>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DateRange {
    pub earliest: NaiveDate,
    pub latest: NaiveDate,
}

impl DateRange {
    fn widen(range: &mut Option<DateRange>, date: NaiveDate) {
        *range = Some(match *range {
            None => DateRange {
                earliest: date,
                latest: date,
            },
            Some(r) => DateRange {
                earliest: r.earliest.min(date),
                latest: r.latest.max(date),
            },
        });
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ChannelStats {
    pub total_messages: usize,
    pub date_range: Option<DateRange>,
}

/// Result of [`DataLake::get_stats`]. Maps are ordered so two calls over an
/// unchanged tree compare equal.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LakeStats {
    pub total_channels: usize,
    pub total_messages: usize,
    pub total_images: usize,
    pub total_documents: usize,
    pub date_range: Option<DateRange>,
    /// Bytes on disk per raw category (`raw_messages`, `raw_images`, `raw_documents`).
    pub storage_size: BTreeMap<String, u64>,
    pub channel_stats: BTreeMap<String, ChannelStats>,
}

fn count_files(root: &Path) -> usize {
    WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .count()
}

fn directory_size(root: &Path) -> u64 {
    WalkDir::new(root)
        .into_iter()
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file())
        .filter_map(|e| e.metadata().ok())
        .map(|m| m.len())
        .sum()
}

fn count_records(path: &Path) -> usize {
    std::fs::read(path)
        .ok()
        .and_then(|raw| serde_json::from_slice::<Vec<serde_json::Value>>(&raw).ok())
        .map_or_else(
            || {
                tracing::warn!(path = %path.display(), "unreadable batch file, not counted");
                0
            },
            |records| records.len(),
        )
}

impl DataLake {
    /// Removes whole date partitions older than `days_to_keep` days from the
    /// messages, images and documents trees.
    #[must_use]
    pub fn cleanup_older_than(&self, days_to_keep: u32) -> CleanupReport {
        self.cleanup_older_than_from(days_to_keep, Utc::now().date_naive())
    }

    /// [`Self::cleanup_older_than`] measured from an explicit `today`.
    #[must_use]
    pub fn cleanup_older_than_from(&self, days_to_keep: u32, today: NaiveDate) -> CleanupReport {
        let Some(cutoff) = today.checked_sub_signed(TimeDelta::days(i64::from(days_to_keep)))
        else {
            tracing::info!(days_to_keep, "retention reaches past the calendar, nothing to remove");
            return CleanupReport::default();
        };
        let mut report = CleanupReport {
            cutoff: Some(cutoff),
            ..CleanupReport::default()
        };

        for (category, root) in self.layout().partitioned_roots() {
            for (date, dir) in partitions(&root) {
                if date >= cutoff {
                    continue;
                }
                match std::fs::remove_dir_all(&dir) {
                    Ok(()) => {
                        tracing::info!(category, path = %dir.display(), "removed old partition");
                        report.removed.push(dir);
                    }
                    Err(e) => {
                        tracing::warn!(
                            category,
                            path = %dir.display(),
                            error = %e,
                            "failed to remove old partition"
                        );
                        report.failed.push(CleanupFailure {
                            path: dir,
                            error: e.to_string(),
                        });
                    }
                }
            }
        }
        report
    }

    #[must_use]
    pub fn get_stats(&self) -> LakeStats {
        let layout = self.layout();
        let mut stats = LakeStats::default();
        let mut channels = BTreeSet::new();

        for (date, date_dir) in partitions(&layout.messages_root()) {
            DateRange::widen(&mut stats.date_range, date);

            let Ok(entries) = std::fs::read_dir(&date_dir) else {
                continue;
            };
            for entry in entries.filter_map(Result::ok) {
                let channel_dir = entry.path();
                if !channel_dir.is_dir() {
                    continue;
                }
                let channel = entry.file_name().to_string_lossy().into_owned();
                channels.insert(channel.clone());

                let messages: usize = message_files(&channel_dir)
                    .iter()
                    .map(|file| count_records(file))
                    .sum();

                let channel_stats = stats.channel_stats.entry(channel).or_default();
                channel_stats.total_messages += messages;
                DateRange::widen(&mut channel_stats.date_range, date);
                stats.total_messages += messages;
            }
        }

        stats.total_channels = channels.len();
        stats.total_images = count_files(&layout.images_root());
        stats.total_documents = count_files(&layout.documents_root());

        for (category, root) in layout.partitioned_roots() {
            stats
                .storage_size
                .insert(format!("raw_{category}"), directory_size(&root));
        }
        stats
    }
}

#[cfg(test)]
#[path = "maintenance_test.rs"]
mod tests;
