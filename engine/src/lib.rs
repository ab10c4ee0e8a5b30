//! Core engine for Parley - conversation state and reply streaming.
//!
//! This crate has no terminal dependencies. Front ends feed it user input,
//! hand it a [`ChatBackend`] and a [`RenderSink`], and read back
//! [`TurnOutcome`]s.
//!
//! ```text
//! submit ──► ChatSession (Streaming) ──run_turn──► RenderSink
//!                                          │
//!                                          └──► HistoryStore (on finish)
//! ```

pub mod errors;
pub mod format;
pub mod ingest;
mod session;
mod state;
mod streaming;

pub use parley_context::{HistoryError, HistoryStore};
pub use parley_providers::{self, ChatBackend};
pub use parley_types::{
    ChatRequest, ConversationRecord, Message, RecordId, Role, StreamEvent, sanitize_terminal_text,
};

pub use format::{FenceMode, format_code_fences, format_code_fences_with};
pub use ingest::IngestError;
pub use session::{ChatSession, conversation_label};
pub use state::{CancelToken, TurnState};
pub use streaming::{CURSOR_MARKER, SubmitError, TIMESTAMP_FORMAT, TurnFinish, TurnOutcome};

/// What the front end should show for the reply in progress.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderEvent {
    /// Formatted text so far, ending with the cursor marker.
    Partial(String),
    /// The finished reply.
    Final(String),
}

pub trait RenderSink {
    fn render(&mut self, event: RenderEvent);
}

/// Collects render events; useful for tests and non-interactive callers.
impl RenderSink for Vec<RenderEvent> {
    fn render(&mut self, event: RenderEvent) {
        self.push(event);
    }
}
