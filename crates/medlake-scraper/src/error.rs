use medlake_lake::LakeError;
use medlake_telegram::TelegramError;
use thiserror::Error;

/// Run-level failures. Per-channel failures never surface here; they are
/// recorded in the run report instead.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("failed to connect to Telegram: {0}")]
    Connect(#[source] TelegramError),

    #[error("failed to write run report: {0}")]
    Report(#[source] LakeError),
}
