use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub env: Environment,
    pub telegram_api_id: i64,
    pub telegram_api_hash: String,
    pub telegram_bot_token: String,
    pub telegram_api_base_url: String,
    /// Comma-separated `TELEGRAM_CHANNELS` override; empty means "use the registry".
    pub telegram_channels: Vec<String>,
    pub telegram_request_timeout_secs: u64,
    pub telegram_max_retries: u32,
    pub telegram_retry_backoff_base_ms: u64,
    pub data_dir: PathBuf,
    pub logs_dir: PathBuf,
    pub log_level: String,
    pub channels_path: Option<PathBuf>,
    pub scraper_message_delay_ms: u64,
    pub scraper_channel_delay_ms: u64,
    pub scraper_batch_size: usize,
    pub scraper_user_agent: String,
}

impl AppConfig {
    /// Location of the persisted platform session token.
    #[must_use]
    pub fn session_file(&self) -> PathBuf {
        self.data_dir.join("telegram_session.txt")
    }

    /// Location of the per-channel metrics file.
    #[must_use]
    pub fn metrics_file(&self) -> PathBuf {
        self.logs_dir.join("scraping_metrics.json")
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("env", &self.env)
            .field("telegram_api_id", &self.telegram_api_id)
            .field("telegram_api_hash", &"[redacted]")
            .field("telegram_bot_token", &"[redacted]")
            .field("telegram_api_base_url", &self.telegram_api_base_url)
            .field("telegram_channels", &self.telegram_channels)
            .field(
                "telegram_request_timeout_secs",
                &self.telegram_request_timeout_secs,
            )
            .field("telegram_max_retries", &self.telegram_max_retries)
            .field(
                "telegram_retry_backoff_base_ms",
                &self.telegram_retry_backoff_base_ms,
            )
            .field("data_dir", &self.data_dir)
            .field("logs_dir", &self.logs_dir)
            .field("log_level", &self.log_level)
            .field("channels_path", &self.channels_path)
            .field("scraper_message_delay_ms", &self.scraper_message_delay_ms)
            .field("scraper_channel_delay_ms", &self.scraper_channel_delay_ms)
            .field("scraper_batch_size", &self.scraper_batch_size)
            .field("scraper_user_agent", &self.scraper_user_agent)
            .finish()
    }
}
