//! Wire types for the Bot-API-compatible gateway.
//!
//! These mirror the JSON the gateway sends. Nothing outside this crate sees
//! them; [`crate::normalize`] turns them into `medlake_core` domain types.

use medlake_core::EntityKind;
use serde::Deserialize;

/// Envelope every gateway method answers with.
#[derive(Debug, Deserialize)]
pub(crate) struct Envelope<T> {
    pub ok: bool,
    pub result: Option<T>,
    pub error_code: Option<i64>,
    pub description: Option<String>,
    pub parameters: Option<ResponseParameters>,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ResponseParameters {
    pub retry_after: Option<u64>,
}

/// `getMe` result. `session` is only present when the gateway rotated it.
#[derive(Debug, Deserialize)]
pub(crate) struct WireMe {
    pub id: i64,
    pub username: Option<String>,
    pub session: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireChat {
    pub id: i64,
    pub title: Option<String>,
    pub username: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub is_verified: bool,
    #[serde(default)]
    pub is_scam: bool,
    #[serde(default)]
    pub is_fake: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WireMessage {
    pub message_id: i64,
    /// Unix seconds.
    pub date: i64,
    pub text: Option<String>,
    pub caption: Option<String>,
    #[serde(default)]
    pub entities: Vec<WireEntity>,
    #[serde(default)]
    pub caption_entities: Vec<WireEntity>,
    #[serde(default)]
    pub photo: Vec<WirePhotoSize>,
    pub document: Option<WireDocument>,
    pub reply_to_message: Option<WireReplyRef>,
    pub forward_origin: Option<WireForwardOrigin>,
    pub views: Option<i64>,
    pub forwards: Option<i64>,
    #[serde(default)]
    pub reactions: Vec<WireReactionCount>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WireEntity {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub offset: u32,
    pub length: u32,
    pub url: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WirePhotoSize {
    pub file_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WireDocument {
    pub file_id: String,
    pub file_name: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WireReplyRef {
    pub message_id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WireIdRef {
    pub id: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WireForwardOrigin {
    /// Unix seconds.
    pub date: Option<i64>,
    pub chat: Option<WireIdRef>,
    pub sender_user: Option<WireIdRef>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WireReactionType {
    pub emoji: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct WireReactionCount {
    #[serde(rename = "type")]
    pub reaction: WireReactionType,
    pub total_count: u32,
}

#[derive(Debug, Deserialize)]
pub(crate) struct WireFile {
    pub file_path: Option<String>,
}
