//! On-disk layout of the raw data tree.
//!
//! ```text
//! {data_dir}/raw/telegram_messages/{YYYY-MM-DD}/{channel}/messages_*.json[.gz]
//! {data_dir}/raw/telegram_messages/{YYYY-MM-DD}/{channel}/metadata.json
//! {data_dir}/raw/telegram_images/{YYYY-MM-DD}/{channel}/{id}_image[.ext]
//! {data_dir}/raw/telegram_documents/{YYYY-MM-DD}/{channel}/{id}_document[.ext]
//! {data_dir}/raw/scraping_report_{YYYYMMDD_HHMMSS}.json
//! ```

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDate, Utc};

use crate::message::MediaKind;

pub const MESSAGES_DIR: &str = "telegram_messages";
pub const IMAGES_DIR: &str = "telegram_images";
pub const DOCUMENTS_DIR: &str = "telegram_documents";
pub const CHANNEL_METADATA_FILE: &str = "metadata.json";

/// Partition directory names are ISO dates.
pub const PARTITION_DATE_FORMAT: &str = "%Y-%m-%d";
/// Timestamp component of batch and report file names.
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataLayout {
    data_dir: PathBuf,
}

impl DataLayout {
    #[must_use]
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
        }
    }

    #[must_use]
    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    #[must_use]
    pub fn raw_dir(&self) -> PathBuf {
        self.data_dir.join("raw")
    }

    #[must_use]
    pub fn messages_root(&self) -> PathBuf {
        self.raw_dir().join(MESSAGES_DIR)
    }

    #[must_use]
    pub fn images_root(&self) -> PathBuf {
        self.raw_dir().join(IMAGES_DIR)
    }

    #[must_use]
    pub fn documents_root(&self) -> PathBuf {
        self.raw_dir().join(DOCUMENTS_DIR)
    }

    /// The three date-partitioned trees, in the order statistics report them.
    #[must_use]
    pub fn partitioned_roots(&self) -> [(&'static str, PathBuf); 3] {
        [
            ("messages", self.messages_root()),
            ("images", self.images_root()),
            ("documents", self.documents_root()),
        ]
    }

    /// `{messages_root}/{YYYY-MM-DD}/{channel}`
    #[must_use]
    pub fn partition_dir(&self, date: NaiveDate, channel: &str) -> PathBuf {
        self.messages_root()
            .join(date.format(PARTITION_DATE_FORMAT).to_string())
            .join(channel)
    }

    #[must_use]
    pub fn channel_metadata_path(&self, date: NaiveDate, channel: &str) -> PathBuf {
        self.partition_dir(date, channel).join(CHANNEL_METADATA_FILE)
    }

    /// Directory media of `kind` for `channel` on `date` is downloaded into.
    /// `None` for [`MediaKind::None`].
    #[must_use]
    pub fn media_dir(&self, kind: MediaKind, date: NaiveDate, channel: &str) -> Option<PathBuf> {
        let root = match kind {
            MediaKind::None => return None,
            MediaKind::Photo => self.images_root(),
            MediaKind::Document => self.documents_root(),
        };
        Some(
            root.join(date.format(PARTITION_DATE_FORMAT).to_string())
                .join(channel),
        )
    }

    /// Full path of a downloaded media file, e.g. `…/42_image.jpg`.
    #[must_use]
    pub fn media_path(
        &self,
        kind: MediaKind,
        date: NaiveDate,
        channel: &str,
        message_id: i64,
        extension: Option<&str>,
    ) -> Option<PathBuf> {
        let dir = self.media_dir(kind, date, channel)?;
        let label = kind.label()?;
        let mut name = format!("{message_id}_{label}");
        if let Some(ext) = extension.map(|e| e.trim_start_matches('.')) {
            if !ext.is_empty() {
                name.push('.');
                name.push_str(ext);
            }
        }
        Some(dir.join(name))
    }

    #[must_use]
    pub fn report_path(&self, generated_at: DateTime<Utc>) -> PathBuf {
        self.raw_dir().join(format!(
            "scraping_report_{}.json",
            generated_at.format(FILE_TIMESTAMP_FORMAT)
        ))
    }
}

/// Parse a partition directory name; `None` for anything that is not a date.
#[must_use]
pub fn parse_partition_date(name: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(name, PARTITION_DATE_FORMAT).ok()
}
