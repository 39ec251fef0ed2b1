//! Normalization from gateway wire types to `medlake_core` domain types.
//!
//! Anything optional on the wire stays optional; a field that cannot be
//! interpreted degrades to `None` rather than failing the record.

use chrono::{DateTime, Utc};
use medlake_core::{
    ChannelInfo, ForwardRef, MediaKind, MessageEntity, NormalizedMessage, Reaction,
};

use crate::media::MediaRef;
use crate::stream::FetchedMessage;
use crate::types::{WireChat, WireMessage};

pub(crate) fn normalize_chat(chat: WireChat, participants_count: Option<i64>) -> ChannelInfo {
    ChannelInfo {
        id: chat.id,
        title: chat.title,
        username: chat.username,
        participants_count,
        description: chat.description.filter(|d| !d.is_empty()),
        verified: chat.is_verified,
        scam: chat.is_scam,
        fake: chat.is_fake,
    }
}

/// Converts a wire message into a record plus its downloadable attachment.
///
/// Returns `None` when the message timestamp is out of range; there is no
/// partition such a record could be filed under.
pub(crate) fn normalize_message(
    wire: WireMessage,
    channel: &str,
    scraped_at: DateTime<Utc>,
) -> Option<FetchedMessage> {
    let Some(date) = DateTime::from_timestamp(wire.date, 0) else {
        tracing::warn!(
            channel,
            message_id = wire.message_id,
            date = wire.date,
            "skipping message with out-of-range timestamp"
        );
        return None;
    };

    // Photos come as several sizes; the last one is the largest.
    let media = if let Some(largest) = wire.photo.last() {
        Some(MediaRef {
            kind: MediaKind::Photo,
            file_id: largest.file_id.clone(),
            file_name: None,
        })
    } else {
        wire.document.as_ref().map(|doc| MediaRef {
            kind: MediaKind::Document,
            file_id: doc.file_id.clone(),
            file_name: doc.file_name.clone(),
        })
    };
    let kind = media.as_ref().map_or(MediaKind::None, |m| m.kind);

    let (text, wire_entities) = match (wire.text, wire.caption) {
        (Some(text), _) => (text, wire.entities),
        (None, Some(caption)) => (caption, wire.caption_entities),
        (None, None) => (String::new(), Vec::new()),
    };

    let entities = wire_entities
        .into_iter()
        .map(|e| MessageEntity {
            kind: e.kind,
            offset: e.offset,
            length: e.length,
            url: e.url,
        })
        .collect();

    let forward_from = wire.forward_origin.map(|origin| ForwardRef {
        chat_id: origin.chat.map(|c| c.id),
        user_id: origin.sender_user.map(|u| u.id),
        date: origin.date.and_then(|d| DateTime::from_timestamp(d, 0)),
    });

    let reactions = wire
        .reactions
        .into_iter()
        .map(|r| Reaction {
            emoji: r.reaction.emoji,
            count: r.total_count,
        })
        .collect();

    let message = NormalizedMessage {
        message_id: wire.message_id,
        channel_username: channel.to_owned(),
        date,
        text,
        media: kind,
        has_image: kind == MediaKind::Photo,
        has_document: kind == MediaKind::Document,
        image_paths: Vec::new(),
        document_paths: Vec::new(),
        forward_from,
        reply_to: wire.reply_to_message.map(|r| r.message_id),
        views: wire.views,
        forwards: wire.forwards,
        reactions,
        entities,
        scraped_at,
    };

    Some(FetchedMessage { message, media })
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
