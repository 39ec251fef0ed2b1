use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Channel-level attributes resolved from the platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChannelInfo {
    pub id: i64,
    pub title: Option<String>,
    pub username: Option<String>,
    /// Subscriber count; `None` when the platform does not disclose it.
    pub participants_count: Option<i64>,
    pub description: Option<String>,
    pub verified: bool,
    pub scam: bool,
    pub fake: bool,
}

/// What kind of media a message carried, decoded once at the client boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaKind {
    #[default]
    None,
    Photo,
    Document,
}

impl MediaKind {
    /// Directory-name stem and file suffix used for downloaded media.
    #[must_use]
    pub fn label(self) -> Option<&'static str> {
        match self {
            MediaKind::None => None,
            MediaKind::Photo => Some("image"),
            MediaKind::Document => Some("document"),
        }
    }
}

/// Inline text entity types. Unknown platform types decode to `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Mention,
    Hashtag,
    Cashtag,
    BotCommand,
    Url,
    Email,
    PhoneNumber,
    Bold,
    Italic,
    Underline,
    Strikethrough,
    Spoiler,
    Code,
    Pre,
    TextLink,
    TextMention,
    CustomEmoji,
    Blockquote,
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEntity {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub offset: u32,
    pub length: u32,
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reaction {
    pub emoji: Option<String>,
    pub count: u32,
}

/// Origin of a forwarded message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardRef {
    pub chat_id: Option<i64>,
    pub user_id: Option<i64>,
    pub date: Option<DateTime<Utc>>,
}

/// Canonical record for one platform message.
///
/// Every field is always serialized; absent optionals are written as `null`
/// and empty collections as `[]` so downstream readers never see missing
/// keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NormalizedMessage {
    pub message_id: i64,
    pub channel_username: String,
    pub date: DateTime<Utc>,
    pub text: String,
    pub media: MediaKind,
    pub has_image: bool,
    pub has_document: bool,
    pub image_paths: Vec<String>,
    pub document_paths: Vec<String>,
    pub forward_from: Option<ForwardRef>,
    pub reply_to: Option<i64>,
    pub views: Option<i64>,
    pub forwards: Option<i64>,
    pub reactions: Vec<Reaction>,
    pub entities: Vec<MessageEntity>,
    pub scraped_at: DateTime<Utc>,
}

impl NormalizedMessage {
    /// A text-only message with no media, linkage, or engagement data.
    #[must_use]
    pub fn text_only(
        message_id: i64,
        channel_username: &str,
        date: DateTime<Utc>,
        text: &str,
    ) -> Self {
        Self {
            message_id,
            channel_username: channel_username.to_owned(),
            date,
            text: text.to_owned(),
            media: MediaKind::None,
            has_image: false,
            has_document: false,
            image_paths: Vec::new(),
            document_paths: Vec::new(),
            forward_from: None,
            reply_to: None,
            views: None,
            forwards: None,
            reactions: Vec::new(),
            entities: Vec::new(),
            scraped_at: Utc::now(),
        }
    }

    /// Drop any downloaded media paths, keeping the presence flags.
    pub fn clear_media_paths(&mut self) {
        self.image_paths.clear();
        self.document_paths.clear();
    }
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn sample_date() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn bare_message_serializes_every_key() {
        let msg = NormalizedMessage::text_only(1, "chemed", sample_date(), "");
        let value = serde_json::to_value(&msg).unwrap();
        let obj = value.as_object().unwrap();
        for key in [
            "message_id",
            "channel_username",
            "date",
            "text",
            "media",
            "has_image",
            "has_document",
            "image_paths",
            "document_paths",
            "forward_from",
            "reply_to",
            "views",
            "forwards",
            "reactions",
            "entities",
            "scraped_at",
        ] {
            assert!(obj.contains_key(key), "missing key {key}");
        }
        assert!(obj["forward_from"].is_null());
        assert!(obj["reply_to"].is_null());
        assert_eq!(obj["entities"], serde_json::json!([]));
        assert_eq!(obj["media"], serde_json::json!("none"));
    }

    #[test]
    fn bare_message_round_trips() {
        let msg = NormalizedMessage::text_only(7, "chemed", sample_date(), "hello");
        let json = serde_json::to_string(&msg).unwrap();
        let back: NormalizedMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, msg);
        assert!(back.forward_from.is_none());
        assert!(back.entities.is_empty());
    }

    #[test]
    fn unknown_entity_type_decodes_to_other() {
        let entity: MessageEntity =
            serde_json::from_str(r#"{"type":"date_time","offset":0,"length":4,"url":null}"#)
                .unwrap();
        assert_eq!(entity.kind, EntityKind::Other);
    }

    #[test]
    fn entity_kind_uses_snake_case() {
        let entity = MessageEntity {
            kind: EntityKind::TextLink,
            offset: 3,
            length: 5,
            url: Some("https://example.com".to_string()),
        };
        let value = serde_json::to_value(&entity).unwrap();
        assert_eq!(value["type"], serde_json::json!("text_link"));
    }

    #[test]
    fn media_kind_labels() {
        assert_eq!(MediaKind::None.label(), None);
        assert_eq!(MediaKind::Photo.label(), Some("image"));
        assert_eq!(MediaKind::Document.label(), Some("document"));
    }

    #[test]
    fn clear_media_paths_keeps_flags() {
        let mut msg = NormalizedMessage::text_only(2, "chemed", sample_date(), "pic");
        msg.media = MediaKind::Photo;
        msg.has_image = true;
        msg.image_paths.push("/tmp/2_image.jpg".to_string());
        msg.clear_media_paths();
        assert!(msg.has_image);
        assert!(msg.image_paths.is_empty());
    }
}
