use chrono::TimeZone;
use medlake_core::EntityKind;

use super::*;

fn wire(value: serde_json::Value) -> WireMessage {
    serde_json::from_value(value).expect("wire message should parse")
}

fn scraped_at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap()
}

// -----------------------------------------------------------------------
// normalize_message
// -----------------------------------------------------------------------

#[test]
fn plain_text_message_has_no_media() {
    let fetched = normalize_message(
        wire(serde_json::json!({
            "message_id": 10,
            "date": 1_704_067_200,
            "text": "Paracetamol back in stock"
        })),
        "chemed",
        scraped_at(),
    )
    .unwrap();

    let msg = fetched.message;
    assert_eq!(msg.message_id, 10);
    assert_eq!(msg.channel_username, "chemed");
    assert_eq!(msg.date, Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
    assert_eq!(msg.text, "Paracetamol back in stock");
    assert_eq!(msg.media, MediaKind::None);
    assert!(!msg.has_image && !msg.has_document);
    assert!(msg.forward_from.is_none());
    assert!(msg.reply_to.is_none());
    assert!(fetched.media.is_none());
}

#[test]
fn photo_uses_largest_size_and_caption() {
    let fetched = normalize_message(
        wire(serde_json::json!({
            "message_id": 11,
            "date": 1_704_067_200,
            "caption": "New arrivals",
            "caption_entities": [{ "type": "hashtag", "offset": 0, "length": 3 }],
            "photo": [
                { "file_id": "small", "width": 90, "height": 90 },
                { "file_id": "large", "width": 1280, "height": 1280 }
            ]
        })),
        "lobelia4cosmetics",
        scraped_at(),
    )
    .unwrap();

    assert_eq!(fetched.message.text, "New arrivals");
    assert_eq!(fetched.message.media, MediaKind::Photo);
    assert!(fetched.message.has_image);
    assert_eq!(fetched.message.entities.len(), 1);
    assert_eq!(fetched.message.entities[0].kind, EntityKind::Hashtag);
    let media = fetched.media.unwrap();
    assert_eq!(media.file_id, "large");
    assert_eq!(media.kind, MediaKind::Photo);
}

#[test]
fn document_keeps_file_name() {
    let fetched = normalize_message(
        wire(serde_json::json!({
            "message_id": 12,
            "date": 1_704_067_200,
            "document": { "file_id": "doc-1", "file_name": "price_list.pdf", "mime_type": "application/pdf" }
        })),
        "tikvahpharma",
        scraped_at(),
    )
    .unwrap();

    assert_eq!(fetched.message.media, MediaKind::Document);
    assert!(fetched.message.has_document);
    assert_eq!(fetched.message.text, "");
    assert_eq!(
        fetched.media.unwrap().file_name.as_deref(),
        Some("price_list.pdf")
    );
}

#[test]
fn forward_reply_and_engagement_are_carried() {
    let fetched = normalize_message(
        wire(serde_json::json!({
            "message_id": 13,
            "date": 1_704_067_200,
            "text": "fwd",
            "reply_to_message": { "message_id": 5 },
            "forward_origin": { "type": "channel", "date": 1_704_000_000, "chat": { "id": -100_123 } },
            "views": 420,
            "forwards": 3,
            "reactions": [{ "type": { "type": "emoji", "emoji": "👍" }, "total_count": 7 }]
        })),
        "chemed",
        scraped_at(),
    )
    .unwrap();

    let msg = fetched.message;
    assert_eq!(msg.reply_to, Some(5));
    let forward = msg.forward_from.unwrap();
    assert_eq!(forward.chat_id, Some(-100_123));
    assert_eq!(forward.user_id, None);
    assert!(forward.date.is_some());
    assert_eq!(msg.views, Some(420));
    assert_eq!(msg.forwards, Some(3));
    assert_eq!(msg.reactions[0].emoji.as_deref(), Some("👍"));
    assert_eq!(msg.reactions[0].count, 7);
}

#[test]
fn out_of_range_timestamp_is_skipped() {
    let fetched = normalize_message(
        wire(serde_json::json!({ "message_id": 1, "date": i64::MAX, "text": "x" })),
        "chemed",
        scraped_at(),
    );
    assert!(fetched.is_none());
}

// -----------------------------------------------------------------------
// normalize_chat
// -----------------------------------------------------------------------

#[test]
fn chat_blank_description_becomes_none() {
    let chat: WireChat = serde_json::from_value(serde_json::json!({
        "id": -1001,
        "title": "Chemed",
        "username": "chemed",
        "description": "",
        "is_verified": true
    }))
    .unwrap();
    let info = normalize_chat(chat, Some(1500));
    assert_eq!(info.participants_count, Some(1500));
    assert!(info.description.is_none());
    assert!(info.verified);
    assert!(!info.scam && !info.fake);
}
