//! Record shapes as they are written to and read back from the lake.

use chrono::{DateTime, NaiveDate, Utc};
use medlake_core::{ChannelInfo, NormalizedMessage};
use serde::{Deserialize, Serialize};

/// Per-record provenance injected by [`crate::DataLake::save_messages`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub scraped_at: DateTime<Utc>,
    pub channel: String,
    pub partition_date: NaiveDate,
    pub file_path: String,
    pub message_hash: String,
}

/// A message as stored: the normalized fields plus a `_metadata` object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredMessage {
    #[serde(flatten)]
    pub message: NormalizedMessage,
    #[serde(rename = "_metadata")]
    pub metadata: RecordMetadata,
}

/// What one scrape of a channel collected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrapingInfo {
    pub scraped_at: DateTime<Utc>,
    pub messages_scraped: usize,
    pub images_scraped: usize,
    pub limit: usize,
    /// Oldest message date the scrape asked for, if bounded.
    pub offset_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelMetadataRecord {
    pub channel_info: ChannelInfo,
    pub scraping_info: ScrapingInfo,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataStamp {
    pub saved_at: DateTime<Utc>,
    pub channel: String,
    pub partition_date: NaiveDate,
}

/// `metadata.json` contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredChannelMetadata {
    #[serde(flatten)]
    pub record: ChannelMetadataRecord,
    #[serde(rename = "_metadata")]
    pub metadata: MetadataStamp,
}

/// Content fingerprint over the fields that do not change between fetches.
///
/// Two copies of a message with the same id, timestamp, and text hash the
/// same no matter when or where they were stored.
#[must_use]
pub fn message_hash(message: &NormalizedMessage) -> String {
    use sha2::{Digest, Sha256};

    let input = format!(
        "{}|{}|{}",
        message.message_id,
        message.date.to_rfc3339(),
        message.text
    );
    format!("{:x}", Sha256::digest(input.as_bytes()))
}
