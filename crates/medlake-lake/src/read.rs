//! Read paths. None of these fail: unreadable partitions and corrupt files
//! are logged and skipped.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use medlake_core::layout::parse_partition_date;
use serde::Serialize;

use crate::records::{StoredChannelMetadata, StoredMessage};
use crate::store::DataLake;

const REQUIRED_FIELDS: [&str; 4] = ["message_id", "channel_username", "date", "text"];

/// Result of [`DataLake::validate_integrity`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntegrityReport {
    pub channel: String,
    pub total_files: usize,
    pub valid_files: usize,
    pub invalid_files: usize,
    pub total_messages: usize,
    /// Records whose content hash was already seen in an earlier record.
    pub duplicate_messages: usize,
    /// Required field name to the number of records missing it.
    pub missing_fields: BTreeMap<String, usize>,
    pub errors: Vec<String>,
}

impl IntegrityReport {
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.invalid_files == 0 && self.duplicate_messages == 0 && self.missing_fields.is_empty()
    }
}

/// Date-named subdirectories of `root`, oldest first. Anything else is ignored.
pub(crate) fn partitions(root: &Path) -> Vec<(NaiveDate, PathBuf)> {
    let Ok(entries) = std::fs::read_dir(root) else {
        return Vec::new();
    };
    let mut found: Vec<(NaiveDate, PathBuf)> = entries
        .filter_map(Result::ok)
        .filter(|e| e.path().is_dir())
        .filter_map(|e| {
            let date = parse_partition_date(e.file_name().to_str()?)?;
            Some((date, e.path()))
        })
        .collect();
    found.sort();
    found
}

/// `messages_*.json` files directly under `dir`, sorted by name.
pub(crate) fn message_files(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut files: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| {
            p.is_file()
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("messages_") && n.ends_with(".json"))
        })
        .collect();
    files.sort();
    files
}

fn read_batch(path: &Path) -> Option<Vec<StoredMessage>> {
    let raw = match std::fs::read(path) {
        Ok(raw) => raw,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "unreadable batch file, skipping");
            return None;
        }
    };
    match serde_json::from_slice(&raw) {
        Ok(batch) => Some(batch),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "corrupt batch file, skipping");
            None
        }
    }
}

impl DataLake {
    /// Every stored message for `channel` in partitions `start..=end`.
    #[must_use]
    pub fn get_messages_for_date_range(
        &self,
        channel: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Vec<StoredMessage> {
        start
            .iter_days()
            .take_while(|day| *day <= end)
            .map(|day| self.layout().partition_dir(day, channel))
            .filter(|dir| dir.is_dir())
            .flat_map(|dir| message_files(&dir))
            .filter_map(|file| read_batch(&file))
            .flatten()
            .collect()
    }

    /// Up to `limit` most recent messages for `channel`, newest first.
    ///
    /// Batches are read newest partition and newest file first until at least
    /// `limit` messages are collected; the result is then ordered by message
    /// date and truncated to `limit`.
    #[must_use]
    pub fn get_latest_messages(&self, channel: &str, limit: usize) -> Vec<StoredMessage> {
        if limit == 0 {
            return Vec::new();
        }

        let mut collected = Vec::new();
        let date_dirs = partitions(&self.layout().messages_root());
        'partitions: for (_, date_dir) in date_dirs.into_iter().rev() {
            for file in message_files(&date_dir.join(channel)).into_iter().rev() {
                if let Some(batch) = read_batch(&file) {
                    collected.extend(batch);
                }
                if collected.len() >= limit {
                    break 'partitions;
                }
            }
        }

        collected.sort_by(|a, b| b.message.date.cmp(&a.message.date));
        collected.truncate(limit);
        collected
    }

    /// The `metadata.json` of one partition, if present and readable.
    #[must_use]
    pub fn get_channel_metadata(
        &self,
        channel: &str,
        date: NaiveDate,
    ) -> Option<StoredChannelMetadata> {
        let path = self.layout().channel_metadata_path(date, channel);
        let raw = std::fs::read(&path).ok()?;
        serde_json::from_slice(&raw)
            .map_err(|e| {
                tracing::warn!(path = %path.display(), error = %e, "corrupt channel metadata");
            })
            .ok()
    }

    /// Checks every stored batch of `channel` for structure, required fields
    /// and duplicate content hashes.
    #[must_use]
    pub fn validate_integrity(&self, channel: &str) -> IntegrityReport {
        let mut report = IntegrityReport {
            channel: channel.to_owned(),
            ..IntegrityReport::default()
        };
        let mut seen_hashes = HashSet::new();

        for (_, date_dir) in partitions(&self.layout().messages_root()) {
            for file in message_files(&date_dir.join(channel)) {
                report.total_files += 1;

                let parsed = std::fs::read(&file)
                    .map_err(|e| e.to_string())
                    .and_then(|raw| {
                        serde_json::from_slice::<serde_json::Value>(&raw).map_err(|e| e.to_string())
                    });
                let records = match parsed {
                    Ok(serde_json::Value::Array(records)) => records,
                    Ok(_) => {
                        report.invalid_files += 1;
                        report
                            .errors
                            .push(format!("invalid format in {}", file.display()));
                        continue;
                    }
                    Err(e) => {
                        report.invalid_files += 1;
                        report
                            .errors
                            .push(format!("error reading {}: {e}", file.display()));
                        continue;
                    }
                };

                report.valid_files += 1;
                report.total_messages += records.len();

                for record in &records {
                    if let Some(hash) = record
                        .pointer("/_metadata/message_hash")
                        .and_then(serde_json::Value::as_str)
                    {
                        if !seen_hashes.insert(hash.to_owned()) {
                            report.duplicate_messages += 1;
                        }
                    }
                    for field in REQUIRED_FIELDS {
                        if record.get(field).is_none_or(serde_json::Value::is_null) {
                            *report.missing_fields.entry(field.to_owned()).or_default() += 1;
                        }
                    }
                }
            }
        }

        tracing::debug!(
            channel,
            files = report.total_files,
            messages = report.total_messages,
            duplicates = report.duplicate_messages,
            "integrity check finished"
        );
        report
    }
}

#[cfg(test)]
#[path = "read_test.rs"]
mod tests;
