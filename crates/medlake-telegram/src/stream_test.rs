use std::collections::HashSet;
use std::sync::Mutex;

use chrono::{Duration as TimeDelta, TimeZone};

use super::*;

fn base_date() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn text_message(id: i64) -> FetchedMessage {
    FetchedMessage {
        message: NormalizedMessage::text_only(
            id,
            "chemed",
            base_date() + TimeDelta::minutes(id),
            &format!("message {id}"),
        ),
        media: None,
    }
}

fn photo_message(id: i64) -> FetchedMessage {
    let mut fetched = text_message(id);
    fetched.message.media = MediaKind::Photo;
    fetched.message.has_image = true;
    fetched.media = Some(MediaRef {
        kind: MediaKind::Photo,
        file_id: format!("file-{id}"),
        file_name: None,
    });
    fetched
}

/// In-memory channel history served page by page.
struct FakeSource {
    history: Vec<FetchedMessage>,
    /// 1-based fetch call numbers that answer with a rate-limit signal.
    rate_limited_calls: Mutex<HashSet<usize>>,
    retry_after: Duration,
    /// 1-based fetch call number that fails with an access-denied error.
    fail_on_call: Option<usize>,
    fail_media: bool,
    requests: Mutex<Vec<PageRequest>>,
}

impl FakeSource {
    fn new(history: Vec<FetchedMessage>) -> Self {
        Self {
            history,
            rate_limited_calls: Mutex::new(HashSet::new()),
            retry_after: Duration::from_secs(5),
            fail_on_call: None,
            fail_media: false,
            requests: Mutex::new(Vec::new()),
        }
    }

    fn with_history(count: i64) -> Self {
        Self::new((1..=count).map(text_message).collect())
    }

    fn rate_limit_on(self, call: usize) -> Self {
        self.rate_limited_calls.lock().unwrap().insert(call);
        self
    }

    fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl ChannelSource for FakeSource {
    async fn channel_info(&self, _channel: &str) -> Result<Option<ChannelInfo>, TelegramError> {
        Ok(None)
    }

    async fn fetch_page(&self, request: &PageRequest) -> Result<PageOutcome, TelegramError> {
        let call = {
            let mut requests = self.requests.lock().unwrap();
            requests.push(request.clone());
            requests.len()
        };
        if self.rate_limited_calls.lock().unwrap().remove(&call) {
            return Ok(PageOutcome::RetryAfter(self.retry_after));
        }
        if self.fail_on_call == Some(call) {
            return Err(TelegramError::AccessDenied {
                channel: request.channel.clone(),
                reason: "CHANNEL_PRIVATE".to_owned(),
            });
        }
        let page = self
            .history
            .iter()
            .filter(|m| m.message.message_id > request.after_id)
            .filter(|m| request.since.is_none_or(|since| m.message.date >= since))
            .take(request.limit)
            .cloned()
            .collect();
        Ok(PageOutcome::Messages(page))
    }

    async fn download_media(
        &self,
        media: &MediaRef,
        message: &NormalizedMessage,
    ) -> Result<PathBuf, TelegramError> {
        if self.fail_media {
            return Err(TelegramError::Api {
                code: 400,
                description: format!("file {} is too big", media.file_id),
            });
        }
        Ok(PathBuf::from(format!("/media/{}_image.jpg", message.message_id)))
    }
}

async fn collect_ids<S: ChannelSource>(stream: &mut MessageStream<'_, S>) -> Vec<i64> {
    let mut ids = Vec::new();
    while let Some(item) = stream.next().await {
        ids.push(item.expect("stream should not fail").message_id);
    }
    ids
}

#[tokio::test(start_paused = true)]
async fn zero_limit_yields_nothing_and_never_fetches() {
    let source = FakeSource::with_history(5);
    let mut stream = MessageStream::new(&source, "chemed", StreamOptions::new(0));
    assert!(stream.next().await.is_none());
    assert!(source.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn yields_oldest_first_up_to_limit() {
    let source = FakeSource::with_history(10);
    let mut stream =
        MessageStream::new(&source, "chemed", StreamOptions::new(4).page_size(3));
    assert_eq!(collect_ids(&mut stream).await, vec![1, 2, 3, 4]);
    assert!(stream.next().await.is_none(), "stream is not restartable");

    let requests = source.requests();
    assert_eq!(requests[0].after_id, 0);
    assert_eq!(requests[1].after_id, 3);
    assert_eq!(requests[1].limit, 1, "second page asks only for what is left");
}

#[tokio::test(start_paused = true)]
async fn short_page_ends_the_history() {
    let source = FakeSource::with_history(3);
    let mut stream =
        MessageStream::new(&source, "chemed", StreamOptions::new(100).page_size(10));
    assert_eq!(collect_ids(&mut stream).await, vec![1, 2, 3]);
    assert_eq!(source.requests().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn since_excludes_strictly_older_messages() {
    let source = FakeSource::with_history(6);
    let since = base_date() + TimeDelta::minutes(4);
    let mut stream = MessageStream::new(
        &source,
        "chemed",
        StreamOptions::new(100).since(Some(since)),
    );
    assert_eq!(collect_ids(&mut stream).await, vec![4, 5, 6]);
}

#[tokio::test(start_paused = true)]
async fn rate_limit_pauses_without_loss_or_duplication() {
    let source = FakeSource::with_history(6).rate_limit_on(2);
    let mut stream = MessageStream::new(
        &source,
        "chemed",
        StreamOptions::new(6)
            .page_size(3)
            .item_delay(Duration::ZERO),
    );

    let mut ids = Vec::new();
    let mut gaps = Vec::new();
    let mut last = tokio::time::Instant::now();
    while let Some(item) = stream.next().await {
        let now = tokio::time::Instant::now();
        gaps.push(now - last);
        last = now;
        ids.push(item.unwrap().message_id);
    }

    assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
    assert!(
        gaps[3] >= Duration::from_secs(5),
        "expected a 5 s pause before message 4, got {:?}",
        gaps[3]
    );
    assert!(gaps[1] < Duration::from_secs(1));

    let requests = source.requests();
    assert_eq!(requests.len(), 3, "rate-limited call plus its retry");
    assert_eq!(requests[1].after_id, 3);
    assert_eq!(requests[2].after_id, 3, "retry resumes from the same cursor");
}

#[tokio::test(start_paused = true)]
async fn item_delay_separates_yields() {
    let source = FakeSource::with_history(3);
    let mut stream = MessageStream::new(&source, "chemed", StreamOptions::new(3));
    let start = tokio::time::Instant::now();
    assert_eq!(collect_ids(&mut stream).await, vec![1, 2, 3]);
    assert!(start.elapsed() >= DEFAULT_ITEM_DELAY * 2);
}

#[tokio::test(start_paused = true)]
async fn terminal_error_ends_the_sequence() {
    let mut source = FakeSource::with_history(6);
    source.fail_on_call = Some(2);
    let mut stream =
        MessageStream::new(&source, "chemed", StreamOptions::new(6).page_size(3));

    for expected in 1..=3 {
        assert_eq!(stream.next().await.unwrap().unwrap().message_id, expected);
    }
    let err = stream.next().await.unwrap().unwrap_err();
    assert!(matches!(err, TelegramError::AccessDenied { .. }));
    assert!(stream.next().await.is_none());
    assert_eq!(stream.yielded(), 3);
}

#[tokio::test(start_paused = true)]
async fn media_is_downloaded_when_policy_allows() {
    let source = FakeSource::new(vec![photo_message(1)]);
    let policy = MediaPolicy {
        images: true,
        documents: false,
    };
    let mut stream =
        MessageStream::new(&source, "chemed", StreamOptions::new(1).media(policy));
    let msg = stream.next().await.unwrap().unwrap();
    assert_eq!(msg.image_paths, vec!["/media/1_image.jpg".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn media_is_skipped_when_policy_disallows() {
    let source = FakeSource::new(vec![photo_message(1)]);
    let mut stream = MessageStream::new(&source, "chemed", StreamOptions::new(1));
    let msg = stream.next().await.unwrap().unwrap();
    assert!(msg.has_image);
    assert!(msg.image_paths.is_empty());
}

#[tokio::test(start_paused = true)]
async fn media_failure_keeps_the_record() {
    let mut source = FakeSource::new(vec![photo_message(1), text_message(2)]);
    source.fail_media = true;
    let policy = MediaPolicy {
        images: true,
        documents: true,
    };
    let mut stream =
        MessageStream::new(&source, "chemed", StreamOptions::new(5).media(policy));
    let first = stream.next().await.unwrap().unwrap();
    assert_eq!(first.message_id, 1);
    assert!(first.has_image);
    assert!(first.image_paths.is_empty());
    assert_eq!(stream.next().await.unwrap().unwrap().message_id, 2);
}
