//! Conversation history persistence.
//!
//! ```text
//! HistoryStore (dir)
//! └── <user_id>.json   pretty JSON array of ConversationRecord
//! ```
//!
//! The store is stateless beyond its directory: callers own the in-memory
//! record list and hand it back on every save.

mod history;

pub use history::{HistoryError, HistoryStore};
