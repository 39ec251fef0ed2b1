use thiserror::Error;

/// Errors returned by the Telegram platform client.
///
/// Rate-limit responses are deliberately absent: they are surfaced as
/// [`crate::PageOutcome::RetryAfter`] and waited out, never raised.
#[derive(Debug, Error)]
pub enum TelegramError {
    /// Credentials or session were rejected. Fatal for the whole run.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// The channel is private or requires admin rights. Fatal for that channel.
    #[error("access denied to channel {channel}: {reason}")]
    AccessDenied { channel: String, reason: String },

    /// The gateway answered with an error that has no dedicated variant.
    #[error("Telegram API error {code}: {description}")]
    Api { code: i64, description: String },

    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// Session or media file could not be read or written.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid base URL '{url}': {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// A platform call was made before [`crate::TelegramClient::connect`].
    #[error("client is not connected")]
    NotConnected,
}

impl TelegramError {
    pub(crate) fn io(path: &std::path::Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            source,
        }
    }

    /// `true` for errors that must abort the whole run rather than one channel.
    #[must_use]
    pub fn is_run_fatal(&self) -> bool {
        matches!(self, Self::Authentication(_))
    }
}
