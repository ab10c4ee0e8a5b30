//! One JSON file of saved conversations per user.

use std::io;
use std::path::{Path, PathBuf};

use parley_types::{ConversationRecord, RecordId};
use parley_utils::{WriteOptions, atomic_write_with, recover_bak_file};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HistoryError {
    #[error("user id {0:?} may only contain ASCII letters, digits, '-' and '_'")]
    InvalidUserId(String),
    #[error("failed to encode history: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct HistoryStore {
    dir: PathBuf,
}

impl HistoryStore {
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// History file for `user_id`.
    ///
    /// The id is used verbatim as the file stem, so it may only contain ASCII
    /// alphanumerics, `-` and `_`. Anything else is rejected rather than
    /// stripped, which keeps distinct ids in distinct files.
    pub fn path_for(&self, user_id: &str) -> Result<PathBuf, HistoryError> {
        let valid = !user_id.is_empty()
            && user_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_'));
        if !valid {
            return Err(HistoryError::InvalidUserId(user_id.to_string()));
        }
        Ok(self.dir.join(format!("{user_id}.json")))
    }

    /// Saved conversations for `user_id`, oldest first.
    ///
    /// A missing, unreadable or corrupt file yields an empty list.
    #[must_use]
    pub fn load(&self, user_id: &str) -> Vec<ConversationRecord> {
        let path = match self.path_for(user_id) {
            Ok(path) => path,
            Err(e) => {
                tracing::warn!("Cannot load history: {e}");
                return Vec::new();
            }
        };
        recover_bak_file(&path);

        let raw = match std::fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                tracing::warn!(path = %path.display(), "Failed to read history: {e}");
                return Vec::new();
            }
        };

        match serde_json::from_str::<Vec<ConversationRecord>>(&raw) {
            Ok(records) => {
                tracing::debug!(path = %path.display(), count = records.len(), "history loaded");
                records
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), "Ignoring corrupt history file: {e}");
                Vec::new()
            }
        }
    }

    /// Replace the user's history file with `records`.
    pub fn save(&self, user_id: &str, records: &[ConversationRecord]) -> Result<(), HistoryError> {
        let path = self.path_for(user_id)?;
        let json = serde_json::to_string_pretty(records)?;
        let options = WriteOptions {
            owner_only: true,
            ..WriteOptions::default()
        };
        atomic_write_with(&path, json.as_bytes(), options)
            .map_err(|source| HistoryError::Write { path, source })?;
        tracing::debug!(user_id, count = records.len(), "history saved");
        Ok(())
    }

    pub fn delete_all(&self, user_id: &str) -> Result<(), HistoryError> {
        self.save(user_id, &[])
    }

    /// Remove the record `id` from `records` and persist the rest.
    ///
    /// Returns `Ok(None)` without writing when no record has that id. The
    /// in-memory removal stands even when the write fails.
    pub fn delete_one(
        &self,
        user_id: &str,
        records: &mut Vec<ConversationRecord>,
        id: &RecordId,
    ) -> Result<Option<ConversationRecord>, HistoryError> {
        let Some(pos) = records.iter().position(|r| &r.id == id) else {
            return Ok(None);
        };
        let removed = records.remove(pos);
        self.save(user_id, records)?;
        Ok(Some(removed))
    }
}
