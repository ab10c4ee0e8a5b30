//! Chat message domain model.
//!
//! A `Message` is the unit exchanged with the model server and stored in
//! conversation records. The serialized shape (`role`, `content`, optional
//! `formatted`) is the on-disk history format.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[allow(clippy::trivially_copy_pass_by_ref)]
fn is_false(value: &bool) -> bool {
    !*value
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    role: Role,
    content: String,
    /// Set on assistant replies that already went through the code-fence formatter.
    #[serde(default, skip_serializing_if = "is_false")]
    formatted: bool,
}

impl Message {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content, false)
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content, false)
    }

    /// Assistant text exactly as the server produced it.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content, false)
    }

    /// Finalized assistant reply whose fences were normalized.
    #[must_use]
    pub fn assistant_formatted(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content, true)
    }

    fn new(role: Role, content: impl Into<String>, formatted: bool) -> Self {
        Self {
            role,
            content: content.into(),
            formatted,
        }
    }

    #[must_use]
    pub const fn role(&self) -> Role {
        self.role
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    #[must_use]
    pub const fn is_formatted(&self) -> bool {
        self.formatted
    }
}

#[cfg(test)]
mod tests {
    use super::{Message, Role};

    #[test]
    fn role_serializes_lowercase() {
        let json = serde_json::to_string(&Role::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }

    #[test]
    fn unformatted_message_omits_flag() {
        let json = serde_json::to_value(Message::user("hi")).unwrap();
        assert_eq!(json, serde_json::json!({"role": "user", "content": "hi"}));
    }

    #[test]
    fn formatted_flag_is_written_and_read() {
        let msg = Message::assistant_formatted("```py\nx\n```");
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"formatted\":true"));

        let back: Message = serde_json::from_str(&json).unwrap();
        assert!(back.is_formatted());
        assert_eq!(back.role(), Role::Assistant);
    }

    #[test]
    fn legacy_message_without_flag_loads() {
        let msg: Message =
            serde_json::from_str(r#"{"role":"assistant","content":"hello"}"#).unwrap();
        assert!(!msg.is_formatted());
        assert_eq!(msg.content(), "hello");
    }
}
