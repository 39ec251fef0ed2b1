//! Ingestion orchestrator: drives a platform session across the channel
//! registry, batches records into the data lake, and reports each run.

pub mod error;
pub mod metrics;
pub mod report;
pub mod scraper;

pub use error::ScrapeError;
pub use metrics::{
    ChannelSummary, DailyMetrics, JsonMetricsStore, MemoryMetrics, MetricsSink, MetricsTable,
};
pub use report::{ChannelOutcome, CompletedRun, RunReport, ScrapePhase};
pub use scraper::{
    ChannelStatus, ConnectivityCheck, ScrapeSettings, Scraper, DEFAULT_BATCH_SIZE,
    DEFAULT_CHANNEL_DELAY, INCREMENTAL_LIMIT,
};
