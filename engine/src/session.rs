//! Per-session conversation state and history operations.

use std::time::Duration;

use parley_context::{HistoryError, HistoryStore};
use parley_types::{ChatRequest, ConversationRecord, Message, ModelName, ModelParseError, RecordId};

use crate::state::{CancelToken, TurnState};

/// Everything one user's chat session needs between turns.
///
/// `current` is `None` for a conversation that has not been saved yet;
/// otherwise it names the history record the working messages belong to.
#[derive(Debug)]
pub struct ChatSession {
    pub(crate) user_id: String,
    pub(crate) store: HistoryStore,
    pub(crate) history: Vec<ConversationRecord>,
    pub(crate) messages: Vec<Message>,
    pub(crate) current: Option<RecordId>,
    pub(crate) state: TurnState,
    pub(crate) cancel: CancelToken,
    pub(crate) system_prompt: String,
    pub(crate) file_context: Option<String>,
    pub(crate) model: String,
    pub(crate) streaming: bool,
    pub(crate) render_delay: Duration,
}

impl ChatSession {
    /// Open `user_id`'s session and load their saved conversations.
    pub fn open(
        user_id: impl Into<String>,
        store: HistoryStore,
        model: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Result<Self, HistoryError> {
        let user_id = user_id.into();
        store.path_for(&user_id)?;
        let history = store.load(&user_id);
        tracing::info!(records = history.len(), "session opened");

        Ok(Self {
            user_id,
            store,
            history,
            messages: Vec::new(),
            current: None,
            state: TurnState::Idle,
            cancel: CancelToken::new(),
            system_prompt: system_prompt.into(),
            file_context: None,
            model: model.into(),
            streaming: true,
            render_delay: Duration::ZERO,
        })
    }

    /// Pause between rendered chunks. Cosmetic only.
    #[must_use]
    pub fn with_render_delay(mut self, delay: Duration) -> Self {
        self.render_delay = delay;
        self
    }

    /// Ask for the whole reply at once instead of streaming it.
    #[must_use]
    pub fn with_streaming(mut self, streaming: bool) -> Self {
        self.streaming = streaming;
        self
    }

    fn reset_working_state(&mut self) {
        self.messages.clear();
        self.current = None;
        self.state = TurnState::Idle;
        self.cancel.reset();
    }

    /// Start an empty, unsaved conversation.
    pub fn new_chat(&mut self) {
        self.reset_working_state();
        self.file_context = None;
    }

    /// Make the saved conversation `id` the working one.
    ///
    /// Returns false when no record has that id.
    pub fn load_conversation(&mut self, id: &RecordId) -> bool {
        let Some(record) = self.history.iter().find(|r| &r.id == id) else {
            return false;
        };
        self.messages = record.messages.clone();
        self.current = Some(record.id.clone());
        self.state = TurnState::Idle;
        self.cancel.reset();
        true
    }

    /// Delete the saved conversation `id`.
    ///
    /// Deleting the active conversation also clears the working messages.
    pub fn delete_conversation(
        &mut self,
        id: &RecordId,
    ) -> Result<Option<ConversationRecord>, HistoryError> {
        if self.current.as_ref() == Some(id) {
            self.reset_working_state();
        }
        self.store.delete_one(&self.user_id, &mut self.history, id)
    }

    /// Delete every saved conversation and start fresh.
    pub fn clear_history(&mut self) -> Result<(), HistoryError> {
        self.history.clear();
        self.reset_working_state();
        self.store.delete_all(&self.user_id)
    }

    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.system_prompt = prompt.into();
    }

    pub fn set_model(&mut self, model: &str) -> Result<(), ModelParseError> {
        let model = ModelName::parse(model)?;
        self.model = model.as_str().to_string();
        Ok(())
    }

    /// Prepend `text` to the next user message.
    pub fn attach_file_context(&mut self, text: impl Into<String>) {
        self.file_context = Some(text.into());
    }

    pub fn clear_file_context(&mut self) {
        self.file_context = None;
    }

    /// Handle for stopping the reply that is being generated.
    #[must_use]
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    #[must_use]
    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    /// Saved conversations, oldest first.
    #[must_use]
    pub fn history(&self) -> &[ConversationRecord] {
        &self.history
    }

    #[must_use]
    pub fn current(&self) -> Option<&RecordId> {
        self.current.as_ref()
    }

    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    #[must_use]
    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    #[must_use]
    pub fn file_context(&self) -> Option<&str> {
        self.file_context.as_deref()
    }

    #[must_use]
    pub fn pending_request(&self) -> Option<&ChatRequest> {
        self.state.pending_request()
    }

    #[must_use]
    pub fn is_streaming(&self) -> bool {
        self.state.is_streaming()
    }
}

/// Display name for the record at `position` (0-based) in the history list.
#[must_use]
pub fn conversation_label(record: &ConversationRecord, position: usize) -> String {
    if record.name.trim().is_empty() {
        format!(
            "Chat {} ({} messages)",
            position + 1,
            record.exchange_count()
        )
    } else {
        record.name.clone()
    }
}
