//! HTTP client for a Bot-API-compatible Telegram gateway.
//!
//! Methods are `POST {base}/bot{token}/{method}` with a JSON body; files are
//! fetched from `{base}/file/bot{token}/{path}`. Every answer is an
//! `{ok, result, error_code, description, parameters}` envelope, classified
//! by [`classify`] into a result, a rate-limit wait, "not found", or an error.

use std::path::PathBuf;
use std::sync::LazyLock;
use std::time::Duration;

use chrono::Utc;
use medlake_core::{AppConfig, ChannelInfo, DataLayout, NormalizedMessage};
use regex::Regex;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, Url};
use serde::de::DeserializeOwned;

use crate::error::TelegramError;
use crate::media::{extension_of, write_media, MediaRef};
use crate::normalize::{normalize_chat, normalize_message};
use crate::retry::{retry_with_backoff, RetryPolicy};
use crate::session::SessionStore;
use crate::stream::{ChannelSource, PageOutcome, PageRequest, PlatformSession};
use crate::types::{Envelope, WireChat, WireFile, WireMe, WireMessage};

/// Wait used when a rate-limit answer carries no duration at all.
const FALLBACK_RETRY_AFTER_SECS: u64 = 60;

static RETRY_AFTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)(?:retry after|flood_wait_)\s*(\d+)").expect("valid retry-after regex")
});

/// Connection settings for [`TelegramClient`].
#[derive(Clone)]
pub struct ClientSettings {
    pub api_id: i64,
    pub api_hash: String,
    pub bot_token: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub backoff_base_ms: u64,
    pub user_agent: String,
    pub data_dir: PathBuf,
    pub session_file: PathBuf,
}

impl ClientSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            api_id: config.telegram_api_id,
            api_hash: config.telegram_api_hash.clone(),
            bot_token: config.telegram_bot_token.clone(),
            base_url: config.telegram_api_base_url.clone(),
            timeout_secs: config.telegram_request_timeout_secs,
            max_retries: config.telegram_max_retries,
            backoff_base_ms: config.telegram_retry_backoff_base_ms,
            user_agent: config.scraper_user_agent.clone(),
            data_dir: config.data_dir.clone(),
            session_file: config.session_file(),
        }
    }
}

impl std::fmt::Debug for ClientSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClientSettings")
            .field("api_id", &self.api_id)
            .field("api_hash", &"[redacted]")
            .field("bot_token", &"[redacted]")
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("max_retries", &self.max_retries)
            .field("backoff_base_ms", &self.backoff_base_ms)
            .field("user_agent", &self.user_agent)
            .field("data_dir", &self.data_dir)
            .field("session_file", &self.session_file)
            .finish()
    }
}

/// Classified gateway answer.
#[derive(Debug)]
pub(crate) enum Reply<T> {
    Ok(T),
    RetryAfter(Duration),
    NotFound { code: i64, description: String },
}

/// Client for the Telegram gateway.
///
/// Platform calls other than [`TelegramClient::connect`] fail with
/// [`TelegramError::NotConnected`] until a connect has succeeded.
pub struct TelegramClient {
    client: Client,
    base_url: Url,
    settings: ClientSettings,
    session: SessionStore,
    layout: DataLayout,
    connected: bool,
}

impl TelegramClient {
    /// # Errors
    ///
    /// Returns [`TelegramError::Http`] if the `reqwest::Client` cannot be
    /// built, or [`TelegramError::InvalidBaseUrl`] if the base URL does not parse.
    pub fn new(settings: ClientSettings) -> Result<Self, TelegramError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent(settings.user_agent.clone())
            .build()?;

        let normalised = format!("{}/", settings.base_url.trim_end_matches('/'));
        let base_url = Url::parse(&normalised).map_err(|e| TelegramError::InvalidBaseUrl {
            url: settings.base_url.clone(),
            reason: e.to_string(),
        })?;

        let session = SessionStore::new(settings.session_file.clone());
        let layout = DataLayout::new(settings.data_dir.clone());

        Ok(Self {
            client,
            base_url,
            settings,
            session,
            layout,
            connected: false,
        })
    }

    /// # Errors
    ///
    /// See [`TelegramClient::new`].
    pub fn from_config(config: &AppConfig) -> Result<Self, TelegramError> {
        Self::new(ClientSettings::from_app_config(config))
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Authenticates, reusing a stored session token when there is one and
    /// persisting the token the gateway hands back.
    ///
    /// # Errors
    ///
    /// - [`TelegramError::Authentication`] if the credentials are rejected.
    /// - [`TelegramError::Io`] if the session file cannot be read or written.
    /// - Transport errors after retries are exhausted.
    pub async fn connect(&mut self) -> Result<(), TelegramError> {
        let stored = self.session.load()?;
        let params = serde_json::json!({
            "api_id": self.settings.api_id,
            "api_hash": self.settings.api_hash,
            "session": stored,
        });

        let Some(me) = self
            .call_waiting::<WireMe>("getMe", &params, None)
            .await?
        else {
            return Err(TelegramError::Authentication(
                "gateway does not recognise the bot token".to_owned(),
            ));
        };

        if let Some(token) = me.session.as_deref().or(stored.as_deref()) {
            self.session.save(token)?;
        }

        self.connected = true;
        tracing::info!(
            user_id = me.id,
            username = me.username.as_deref().unwrap_or(""),
            restored_session = stored.is_some(),
            "connected to Telegram"
        );
        Ok(())
    }

    /// Idempotent; safe to call without a prior successful connect.
    pub fn disconnect(&mut self) {
        if self.connected {
            self.connected = false;
            tracing::info!("disconnected from Telegram");
        }
    }

    fn ensure_connected(&self) -> Result<(), TelegramError> {
        if self.connected {
            Ok(())
        } else {
            Err(TelegramError::NotConnected)
        }
    }

    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.settings.max_retries,
            base_delay_ms: self.settings.backoff_base_ms,
        }
    }

    fn method_url(&self, method: &str) -> Result<Url, TelegramError> {
        self.base_url
            .join(&format!("./bot{}/{method}", self.settings.bot_token))
            .map_err(|e| TelegramError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                reason: e.to_string(),
            })
    }

    fn file_url(&self, file_path: &str) -> Result<Url, TelegramError> {
        self.base_url
            .join(&format!(
                "./file/bot{}/{}",
                self.settings.bot_token,
                file_path.trim_start_matches('/')
            ))
            .map_err(|e| TelegramError::InvalidBaseUrl {
                url: self.base_url.to_string(),
                reason: e.to_string(),
            })
    }

    /// One classified gateway call, with transient failures retried.
    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &serde_json::Value,
        channel: Option<&str>,
    ) -> Result<Reply<T>, TelegramError> {
        let url = self.method_url(method)?;
        let url = &url;
        let client = &self.client;
        retry_with_backoff(
            self.retry_policy(),
            move || async move {
                let response = client.post(url.clone()).json(params).send().await?;
                let status = response.status().as_u16();
                let retry_after = response
                    .headers()
                    .get(RETRY_AFTER)
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.trim().parse::<u64>().ok());
                let body = response.text().await?;
                classify(status, retry_after, &body, method, channel)
            },
        )
        .await
    }

    /// Like [`Self::call`] but waits out rate limits. `Ok(None)` is "not found".
    async fn call_waiting<T: DeserializeOwned>(
        &self,
        method: &str,
        params: &serde_json::Value,
        channel: Option<&str>,
    ) -> Result<Option<T>, TelegramError> {
        loop {
            match self.call(method, params, channel).await? {
                Reply::Ok(value) => return Ok(Some(value)),
                Reply::NotFound { .. } => return Ok(None),
                Reply::RetryAfter(wait) => {
                    tracing::warn!(
                        operation = method,
                        channel = channel.unwrap_or(""),
                        retry_after_secs = wait.as_secs(),
                        "rate limited, waiting"
                    );
                    tokio::time::sleep(wait).await;
                }
            }
        }
    }

    /// Subscriber count. Best effort: any failure is logged and yields `None`.
    async fn member_count(&self, chat_id: &str) -> Option<i64> {
        let params = serde_json::json!({ "chat_id": chat_id });
        match self
            .call::<i64>("getChatMemberCount", &params, Some(chat_id))
            .await
        {
            Ok(Reply::Ok(count)) => Some(count),
            Ok(_) => None,
            Err(e) => {
                tracing::debug!(channel = chat_id, error = %e, "member count unavailable");
                None
            }
        }
    }

    async fn download_file(&self, file_path: &str) -> Result<Vec<u8>, TelegramError> {
        let url = self.file_url(file_path)?;
        let url = &url;
        let client = &self.client;
        retry_with_backoff(
            self.retry_policy(),
            move || async move {
                let response = client.get(url.clone()).send().await?;
                let response = response.error_for_status()?;
                Ok(response.bytes().await?.to_vec())
            },
        )
        .await
    }
}

/// Public usernames are addressed as `@name`; numeric ids pass through.
fn chat_id(channel: &str) -> String {
    let trimmed = channel.trim_start_matches('@');
    if trimmed.starts_with('-') || trimmed.chars().all(|c| c.is_ascii_digit()) {
        trimmed.to_owned()
    } else {
        format!("@{trimmed}")
    }
}

#[async_trait::async_trait]
impl ChannelSource for TelegramClient {
    async fn channel_info(&self, channel: &str) -> Result<Option<ChannelInfo>, TelegramError> {
        self.ensure_connected()?;
        let target = chat_id(channel);
        let params = serde_json::json!({ "chat_id": target });
        let Some(chat) = self
            .call_waiting::<WireChat>("getChat", &params, Some(channel))
            .await?
        else {
            tracing::warn!(channel, "channel not found");
            return Ok(None);
        };
        let participants = self.member_count(&target).await;
        Ok(Some(normalize_chat(chat, participants)))
    }

    async fn fetch_page(&self, request: &PageRequest) -> Result<PageOutcome, TelegramError> {
        self.ensure_connected()?;
        let params = serde_json::json!({
            "chat_id": chat_id(&request.channel),
            "offset_id": request.after_id,
            "min_date": request.since.map(|s| s.timestamp()),
            "limit": request.limit,
        });

        match self
            .call::<Vec<WireMessage>>("getChatHistory", &params, Some(&request.channel))
            .await?
        {
            Reply::Ok(wire) => {
                let scraped_at = Utc::now();
                let page = wire
                    .into_iter()
                    .filter_map(|m| normalize_message(m, &request.channel, scraped_at))
                    .collect();
                Ok(PageOutcome::Messages(page))
            }
            Reply::RetryAfter(wait) => Ok(PageOutcome::RetryAfter(wait)),
            Reply::NotFound { code, description } => Err(TelegramError::Api { code, description }),
        }
    }

    async fn download_media(
        &self,
        media: &MediaRef,
        message: &NormalizedMessage,
    ) -> Result<PathBuf, TelegramError> {
        self.ensure_connected()?;
        let params = serde_json::json!({ "file_id": media.file_id });
        let file: WireFile = self
            .call_waiting("getFile", &params, Some(&message.channel_username))
            .await?
            .ok_or_else(|| TelegramError::Api {
                code: 404,
                description: format!("file {} not found", media.file_id),
            })?;
        let remote = file.file_path.ok_or_else(|| TelegramError::Api {
            code: 400,
            description: format!("file {} has no download path", media.file_id),
        })?;

        let extension =
            extension_of(&remote).or_else(|| media.file_name.as_deref().and_then(extension_of));
        let dest = self
            .layout
            .media_path(
                media.kind,
                message.date.date_naive(),
                &message.channel_username,
                message.message_id,
                extension,
            )
            .ok_or_else(|| TelegramError::Api {
                code: 400,
                description: format!("message {} has no downloadable media", message.message_id),
            })?;

        let bytes = self.download_file(&remote).await?;
        write_media(&dest, &bytes).await?;
        tracing::debug!(
            channel = %message.channel_username,
            message_id = message.message_id,
            path = %dest.display(),
            "media downloaded"
        );
        Ok(dest)
    }
}

#[async_trait::async_trait]
impl PlatformSession for TelegramClient {
    async fn connect(&mut self) -> Result<(), TelegramError> {
        TelegramClient::connect(self).await
    }

    fn disconnect(&mut self) {
        TelegramClient::disconnect(self);
    }
}

/// Turn a raw gateway answer into a [`Reply`] or an error.
pub(crate) fn classify<T: DeserializeOwned>(
    status: u16,
    retry_after_header: Option<u64>,
    body: &str,
    method: &str,
    channel: Option<&str>,
) -> Result<Reply<T>, TelegramError> {
    let success = (200..300).contains(&status);
    let envelope: Envelope<T> = match serde_json::from_str(body) {
        Ok(envelope) => envelope,
        Err(source) if success => {
            return Err(TelegramError::Deserialize {
                context: method.to_owned(),
                source,
            })
        }
        Err(_) => Envelope {
            ok: false,
            result: None,
            error_code: None,
            description: Some(body.trim().to_owned()),
            parameters: None,
        },
    };

    if envelope.ok {
        return envelope.result.map(Reply::Ok).ok_or_else(|| TelegramError::Api {
            code: i64::from(status),
            description: format!("{method} answered ok without a result"),
        });
    }

    let code = envelope.error_code.unwrap_or(i64::from(status));
    let description = envelope.description.unwrap_or_default();

    if code == 429 || status == 429 {
        let secs = envelope
            .parameters
            .and_then(|p| p.retry_after)
            .or(retry_after_header)
            .or_else(|| parse_retry_after(&description))
            .unwrap_or(FALLBACK_RETRY_AFTER_SECS);
        return Ok(Reply::RetryAfter(Duration::from_secs(secs)));
    }

    if code == 401 {
        return Err(TelegramError::Authentication(description));
    }

    let upper = description.to_uppercase();
    if code == 403 || upper.contains("CHANNEL_PRIVATE") || upper.contains("CHAT_ADMIN_REQUIRED") {
        return Err(TelegramError::AccessDenied {
            channel: channel.unwrap_or_default().to_owned(),
            reason: description,
        });
    }

    if code == 404 || (code == 400 && upper.contains("CHAT NOT FOUND")) {
        return Ok(Reply::NotFound { code, description });
    }

    Err(TelegramError::Api { code, description })
}

fn parse_retry_after(description: &str) -> Option<u64> {
    RETRY_AFTER_RE
        .captures(description)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
