//! Write paths of the partitioned store.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};
use flate2::write::GzEncoder;
use flate2::Compression;
use medlake_core::layout::FILE_TIMESTAMP_FORMAT;
use medlake_core::{DataLayout, NormalizedMessage};
use serde::Serialize;

use crate::error::LakeError;
use crate::records::{
    message_hash, ChannelMetadataRecord, MetadataStamp, RecordMetadata, StoredChannelMetadata,
    StoredMessage,
};

/// Date- and channel-partitioned JSON store rooted at a data directory.
///
/// The store is the only writer of partition files. Every file is written to
/// a temp sibling and renamed into place, so readers never see a half-written
/// batch.
#[derive(Debug, Clone)]
pub struct DataLake {
    layout: DataLayout,
}

impl DataLake {
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            layout: DataLayout::new(data_dir),
        }
    }

    #[must_use]
    pub fn layout(&self) -> &DataLayout {
        &self.layout
    }

    /// Writes one batch as `messages_{YYYYMMDD_HHMMSS}_{count}.json` plus a
    /// gzip copy, and returns the plain path.
    ///
    /// A `_{n}` suffix is appended only when that name is already taken, so a
    /// batch never overwrites another.
    ///
    /// # Errors
    ///
    /// Returns [`LakeError`] if the partition cannot be created or either file
    /// cannot be written.
    pub fn save_messages(
        &self,
        channel: &str,
        messages: &[NormalizedMessage],
        date: NaiveDate,
    ) -> Result<PathBuf, LakeError> {
        let dir = self.layout.partition_dir(date, channel);
        std::fs::create_dir_all(&dir).map_err(|e| LakeError::io(&dir, e))?;

        let now = Utc::now();
        let stem = format!(
            "messages_{}_{}",
            now.format(FILE_TIMESTAMP_FORMAT),
            messages.len()
        );
        let (plain_path, gz_path) = unused_batch_paths(&dir, &stem);
        let file_path = plain_path.display().to_string();

        let stored: Vec<StoredMessage> = messages
            .iter()
            .map(|message| StoredMessage {
                metadata: RecordMetadata {
                    scraped_at: now,
                    channel: channel.to_owned(),
                    partition_date: date,
                    file_path: file_path.clone(),
                    message_hash: message_hash(message),
                },
                message: message.clone(),
            })
            .collect();

        let body = serde_json::to_vec_pretty(&stored).map_err(|e| LakeError::Serialize {
            context: file_path.clone(),
            source: e,
        })?;

        write_gzip_atomic(&gz_path, &body)?;
        write_atomic(&plain_path, &body)?;

        tracing::info!(
            channel,
            count = messages.len(),
            path = %plain_path.display(),
            "saved message batch"
        );
        Ok(plain_path)
    }

    /// Writes (or overwrites) the partition's `metadata.json`.
    ///
    /// # Errors
    ///
    /// Returns [`LakeError`] if the file cannot be serialized or written.
    pub fn save_channel_metadata(
        &self,
        channel: &str,
        record: &ChannelMetadataRecord,
        date: NaiveDate,
    ) -> Result<PathBuf, LakeError> {
        let path = self.layout.channel_metadata_path(date, channel);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir).map_err(|e| LakeError::io(dir, e))?;
        }

        let stored = StoredChannelMetadata {
            record: record.clone(),
            metadata: MetadataStamp {
                saved_at: Utc::now(),
                channel: channel.to_owned(),
                partition_date: date,
            },
        };
        let body = serde_json::to_vec_pretty(&stored).map_err(|e| LakeError::Serialize {
            context: path.display().to_string(),
            source: e,
        })?;
        write_atomic(&path, &body)?;

        tracing::debug!(channel, path = %path.display(), "saved channel metadata");
        Ok(path)
    }

    /// Writes a run report to `raw/scraping_report_{YYYYMMDD_HHMMSS}.json`.
    ///
    /// # Errors
    ///
    /// Returns [`LakeError`] if the report cannot be serialized or written.
    pub fn save_run_report<T: Serialize>(
        &self,
        report: &T,
        generated_at: DateTime<Utc>,
    ) -> Result<PathBuf, LakeError> {
        let raw_dir = self.layout.raw_dir();
        std::fs::create_dir_all(&raw_dir).map_err(|e| LakeError::io(&raw_dir, e))?;

        let path = self.layout.report_path(generated_at);
        let body = serde_json::to_vec_pretty(report).map_err(|e| LakeError::Serialize {
            context: path.display().to_string(),
            source: e,
        })?;
        write_atomic(&path, &body)?;

        tracing::info!(path = %path.display(), "saved run report");
        Ok(path)
    }
}

/// First `{stem}[_{n}].json` / `.json.gz` pair where neither file exists yet.
fn unused_batch_paths(dir: &Path, stem: &str) -> (PathBuf, PathBuf) {
    let mut candidate = stem.to_owned();
    let mut n = 0u32;
    loop {
        let plain = dir.join(format!("{candidate}.json"));
        let gz = dir.join(format!("{candidate}.json.gz"));
        if !plain.exists() && !gz.exists() {
            return (plain, gz);
        }
        n += 1;
        candidate = format!("{stem}_{n}");
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

fn write_atomic(path: &Path, body: &[u8]) -> Result<(), LakeError> {
    let tmp = tmp_path(path);
    std::fs::write(&tmp, body).map_err(|e| LakeError::io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| LakeError::io(path, e))
}

fn write_gzip_atomic(path: &Path, body: &[u8]) -> Result<(), LakeError> {
    let tmp = tmp_path(path);
    let file = File::create(&tmp).map_err(|e| LakeError::io(&tmp, e))?;
    let mut encoder = GzEncoder::new(BufWriter::new(file), Compression::default());
    encoder
        .write_all(body)
        .map_err(|e| LakeError::io(&tmp, e))?;
    encoder
        .finish()
        .and_then(|mut writer| writer.flush())
        .map_err(|e| LakeError::io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| LakeError::io(path, e))
}

#[cfg(test)]
#[path = "store_test.rs"]
mod tests;
