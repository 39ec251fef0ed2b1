//! Date- and channel-partitioned JSON store for scraped channel data.

pub mod error;
pub mod maintenance;
pub mod read;
pub mod records;
pub mod store;

pub use error::LakeError;
pub use maintenance::{ChannelStats, CleanupFailure, CleanupReport, DateRange, LakeStats};
pub use read::IntegrityReport;
pub use records::{
    message_hash, ChannelMetadataRecord, MetadataStamp, RecordMetadata, ScrapingInfo,
    StoredChannelMetadata, StoredMessage,
};
pub use store::DataLake;
