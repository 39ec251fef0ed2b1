//! Telegram platform client: authentication, channel metadata, a lazy
//! message stream with rate-limit suspend/resume, and media download.

pub mod client;
pub mod error;
pub mod media;
pub(crate) mod normalize;
pub(crate) mod retry;
pub mod session;
pub mod stream;
pub(crate) mod types;

pub use client::{ClientSettings, TelegramClient};
pub use error::TelegramError;
pub use media::{MediaPolicy, MediaRef};
pub use session::SessionStore;
pub use stream::{
    ChannelSource, FetchedMessage, MessageStream, PageOutcome, PageRequest, PlatformSession,
    StreamOptions, DEFAULT_ITEM_DELAY, DEFAULT_PAGE_SIZE,
};
