//! Request and streaming event types shared by providers and the engine.

use serde::Serialize;

use crate::message::Message;

/// A chat request: model id plus the system prompt followed by the
/// conversation so far.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
}

impl ChatRequest {
    #[must_use]
    pub fn new(model: impl Into<String>, system_prompt: &str, history: &[Message]) -> Self {
        let mut messages = Vec::with_capacity(history.len() + 1);
        messages.push(Message::system(system_prompt));
        messages.extend_from_slice(history);
        Self {
            model: model.into(),
            messages,
        }
    }
}

/// Events emitted while a reply is streaming.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    TextDelta(String),
    Done,
    Error(String),
}
