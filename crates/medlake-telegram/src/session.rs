//! Persisted session token.
//!
//! The token is a single line in a text file. A missing or blank file means
//! there is no stored session. Writes land in a sibling temp file first and
//! are renamed over the target.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use crate::error::TelegramError;

#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// # Errors
    ///
    /// Returns [`TelegramError::Io`] if the file exists but cannot be read.
    pub fn load(&self) -> Result<Option<String>, TelegramError> {
        match std::fs::read_to_string(&self.path) {
            Ok(raw) => {
                let token = raw.trim();
                Ok((!token.is_empty()).then(|| token.to_owned()))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(TelegramError::io(&self.path, e)),
        }
    }

    /// # Errors
    ///
    /// Returns [`TelegramError::Io`] if the directory, temp file, or rename fails.
    pub fn save(&self, token: &str) -> Result<(), TelegramError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| TelegramError::io(parent, e))?;
        }
        let tmp = self.path.with_extension("txt.tmp");
        std::fs::write(&tmp, token).map_err(|e| TelegramError::io(&tmp, e))?;
        std::fs::rename(&tmp, &self.path).map_err(|e| TelegramError::io(&self.path, e))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_means_no_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("telegram_session.txt"));
        assert_eq!(store.load().unwrap(), None);
    }

    #[test]
    fn blank_file_means_no_session() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("telegram_session.txt");
        std::fs::write(&path, "  \n").unwrap();
        assert_eq!(SessionStore::new(path).load().unwrap(), None);
    }

    #[test]
    fn save_creates_parent_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let store = SessionStore::new(dir.path().join("nested/telegram_session.txt"));
        store.save("first").unwrap();
        store.save("second").unwrap();
        assert_eq!(store.load().unwrap().as_deref(), Some("second"));
        assert!(!dir.path().join("nested/telegram_session.txt.tmp").exists());
    }
}
