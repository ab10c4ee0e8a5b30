//! Saved conversations.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::message::{Message, Role};
use crate::text::truncate_preview;

const TITLE_CHARS: usize = 30;
const UNTITLED: &str = "Chat";

/// Stable identifier of a saved conversation.
///
/// Assigned once when the record is created; positions in the history list
/// shift on delete, ids do not.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordId(String);

impl RecordId {
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RecordId {
    fn default() -> Self {
        Self::generate()
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationRecord {
    /// Files written before ids existed get a fresh one on load.
    #[serde(default)]
    pub id: RecordId,
    pub name: String,
    pub messages: Vec<Message>,
    /// Local time, `%Y-%m-%d %H:%M`.
    pub timestamp: String,
    pub model: String,
    /// Last reply was cut short by the user.
    #[serde(default)]
    pub truncated: bool,
}

impl ConversationRecord {
    /// Title derived from the first user message.
    #[must_use]
    pub fn title_for(messages: &[Message]) -> String {
        messages
            .iter()
            .find(|m| m.role() == Role::User)
            .map_or_else(
                || UNTITLED.to_string(),
                |m| truncate_preview(m.content(), TITLE_CHARS, "..."),
            )
    }

    /// Number of user/assistant exchanges.
    #[must_use]
    pub fn exchange_count(&self) -> usize {
        self.messages.len() / 2
    }
}
