//! Media references and on-disk writes for downloaded attachments.

use std::ffi::OsStr;
use std::path::Path;

use medlake_core::{ChannelPolicy, MediaKind};

use crate::error::TelegramError;

/// Handle to a downloadable attachment, kept beside the normalized record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRef {
    pub kind: MediaKind,
    pub file_id: String,
    /// Original file name, documents only.
    pub file_name: Option<String>,
}

/// Which media types a stream downloads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MediaPolicy {
    pub images: bool,
    pub documents: bool,
}

impl MediaPolicy {
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_channel(policy: &ChannelPolicy) -> Self {
        Self {
            images: policy.image_download,
            documents: policy.document_download,
        }
    }

    #[must_use]
    pub fn wants(self, kind: MediaKind) -> bool {
        match kind {
            MediaKind::None => false,
            MediaKind::Photo => self.images,
            MediaKind::Document => self.documents,
        }
    }
}

/// File extension of a remote path or file name, without the dot.
pub(crate) fn extension_of(name: &str) -> Option<&str> {
    Path::new(name)
        .extension()
        .and_then(OsStr::to_str)
        .filter(|ext| !ext.is_empty())
}

/// Write downloaded bytes, creating the partition directory first.
pub(crate) async fn write_media(dest: &Path, bytes: &[u8]) -> Result<(), TelegramError> {
    if let Some(parent) = dest.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|e| TelegramError::io(parent, e))?;
    }
    tokio::fs::write(dest, bytes)
        .await
        .map_err(|e| TelegramError::io(dest, e))
}
