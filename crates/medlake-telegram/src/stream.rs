//! Lazy, oldest-first message sequence for one channel.
//!
//! [`MessageStream`] pulls pages from a [`ChannelSource`] after a message-id
//! cursor. A rate-limit answer is a [`PageOutcome::RetryAfter`] value: the
//! stream sleeps for the requested duration and asks for the same cursor
//! again, so a pause never drops or repeats a message.

use std::collections::VecDeque;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use medlake_core::{ChannelInfo, MediaKind, NormalizedMessage};

use crate::error::TelegramError;
use crate::media::{MediaPolicy, MediaRef};

pub const DEFAULT_ITEM_DELAY: Duration = Duration::from_millis(100);
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// A normalized record together with the attachment it can still download.
#[derive(Debug, Clone)]
pub struct FetchedMessage {
    pub message: NormalizedMessage,
    pub media: Option<MediaRef>,
}

/// One page request: up to `limit` messages newer than `after_id`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub channel: String,
    pub after_id: i64,
    pub since: Option<DateTime<Utc>>,
    pub limit: usize,
}

#[derive(Debug)]
pub enum PageOutcome {
    /// Oldest-first messages with ids greater than the request cursor.
    /// An empty page means the history is exhausted.
    Messages(Vec<FetchedMessage>),
    /// The platform asked us to wait before asking again.
    RetryAfter(Duration),
}

/// The platform operations a [`MessageStream`] and the orchestrator need.
#[async_trait::async_trait]
pub trait ChannelSource: Send + Sync {
    /// Resolves channel metadata. `Ok(None)` means the channel does not exist.
    async fn channel_info(&self, channel: &str) -> Result<Option<ChannelInfo>, TelegramError>;

    async fn fetch_page(&self, request: &PageRequest) -> Result<PageOutcome, TelegramError>;

    /// Downloads an attachment and returns where it was written.
    async fn download_media(
        &self,
        media: &MediaRef,
        message: &NormalizedMessage,
    ) -> Result<PathBuf, TelegramError>;
}

/// A [`ChannelSource`] that needs an authenticated session first.
#[async_trait::async_trait]
pub trait PlatformSession: ChannelSource {
    async fn connect(&mut self) -> Result<(), TelegramError>;

    /// Idempotent; safe without a prior successful connect.
    fn disconnect(&mut self);
}

#[derive(Debug, Clone)]
pub struct StreamOptions {
    pub limit: usize,
    /// Messages strictly older than this are excluded.
    pub since: Option<DateTime<Utc>>,
    pub item_delay: Duration,
    pub page_size: usize,
    pub media: MediaPolicy,
}

impl StreamOptions {
    #[must_use]
    pub fn new(limit: usize) -> Self {
        Self {
            limit,
            since: None,
            item_delay: DEFAULT_ITEM_DELAY,
            page_size: DEFAULT_PAGE_SIZE,
            media: MediaPolicy::none(),
        }
    }

    #[must_use]
    pub fn since(mut self, since: Option<DateTime<Utc>>) -> Self {
        self.since = since;
        self
    }

    #[must_use]
    pub fn item_delay(mut self, delay: Duration) -> Self {
        self.item_delay = delay;
        self
    }

    #[must_use]
    pub fn page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    #[must_use]
    pub fn media(mut self, media: MediaPolicy) -> Self {
        self.media = media;
        self
    }
}

/// Finite, non-restartable message sequence. Once it has returned `None` or
/// an error it only ever returns `None`.
pub struct MessageStream<'a, S: ChannelSource> {
    source: &'a S,
    channel: String,
    options: StreamOptions,
    cursor: i64,
    remaining: usize,
    buffer: VecDeque<FetchedMessage>,
    history_exhausted: bool,
    finished: bool,
    yielded: usize,
}

impl<'a, S: ChannelSource> MessageStream<'a, S> {
    #[must_use]
    pub fn new(source: &'a S, channel: &str, options: StreamOptions) -> Self {
        let remaining = options.limit;
        Self {
            source,
            channel: channel.to_owned(),
            options,
            cursor: 0,
            remaining,
            buffer: VecDeque::new(),
            history_exhausted: false,
            finished: remaining == 0,
            yielded: 0,
        }
    }

    /// Number of records yielded so far.
    #[must_use]
    pub fn yielded(&self) -> usize {
        self.yielded
    }

    /// Next record, `None` at the end, or the error that ended the sequence.
    pub async fn next(&mut self) -> Option<Result<NormalizedMessage, TelegramError>> {
        if self.finished {
            return None;
        }

        let fetched = loop {
            if let Some(candidate) = self.buffer.pop_front() {
                // Ignore anything at or behind the cursor so an overlapping
                // page can never duplicate a record.
                if candidate.message.message_id <= self.cursor {
                    continue;
                }
                if self
                    .options
                    .since
                    .is_some_and(|since| candidate.message.date < since)
                {
                    self.cursor = candidate.message.message_id;
                    continue;
                }
                break candidate;
            }

            if self.history_exhausted {
                self.finished = true;
                return None;
            }

            if let Err(e) = self.fill_buffer().await {
                self.finished = true;
                return Some(Err(e));
            }
        };

        self.cursor = fetched.message.message_id;

        if self.yielded > 0 && !self.options.item_delay.is_zero() {
            tokio::time::sleep(self.options.item_delay).await;
        }

        let message = self.attach_media(fetched).await;

        self.yielded += 1;
        self.remaining -= 1;
        if self.remaining == 0 {
            self.finished = true;
        }
        Some(Ok(message))
    }

    /// Fetch the next page into the buffer, waiting out rate limits in place.
    async fn fill_buffer(&mut self) -> Result<(), TelegramError> {
        let request = PageRequest {
            channel: self.channel.clone(),
            after_id: self.cursor,
            since: self.options.since,
            limit: self.options.page_size.min(self.remaining),
        };

        loop {
            match self.source.fetch_page(&request).await? {
                PageOutcome::RetryAfter(wait) => {
                    tracing::warn!(
                        channel = %self.channel,
                        cursor = self.cursor,
                        retry_after_secs = wait.as_secs(),
                        "rate limited, pausing stream"
                    );
                    tokio::time::sleep(wait).await;
                }
                PageOutcome::Messages(page) => {
                    if page.len() < request.limit
                        || page.iter().all(|m| m.message.message_id <= self.cursor)
                    {
                        self.history_exhausted = true;
                    }
                    tracing::debug!(
                        channel = %self.channel,
                        count = page.len(),
                        after_id = request.after_id,
                        "fetched page"
                    );
                    self.buffer.extend(page);
                    return Ok(());
                }
            }
        }
    }

    /// Download the record's attachment if the policy wants it. A failure
    /// only clears that record's media paths.
    async fn attach_media(&self, fetched: FetchedMessage) -> NormalizedMessage {
        let FetchedMessage { mut message, media } = fetched;
        let Some(media) = media.filter(|m| self.options.media.wants(m.kind)) else {
            return message;
        };

        match self.source.download_media(&media, &message).await {
            Ok(path) => {
                let path = path.display().to_string();
                match media.kind {
                    MediaKind::Photo => message.image_paths.push(path),
                    MediaKind::Document => message.document_paths.push(path),
                    MediaKind::None => {}
                }
            }
            Err(e) => {
                tracing::warn!(
                    channel = %self.channel,
                    message_id = message.message_id,
                    error = %e,
                    "media download failed"
                );
                message.clear_media_paths();
            }
        }
        message
    }
}

#[cfg(test)]
#[path = "stream_test.rs"]
mod tests;
