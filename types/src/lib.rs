//! Core domain types for Parley.
//!
//! This crate contains pure domain types with no IO, no async, and minimal dependencies.
//! Everything here can be used from any layer of the application.

#![allow(clippy::missing_errors_doc)]

mod message;
mod model;
mod record;
mod sanitize;
mod stream;
mod text;

pub use message::{Message, Role};
pub use model::{ModelName, ModelParseError};
pub use record::{ConversationRecord, RecordId};
pub use sanitize::sanitize_terminal_text;
pub use stream::{ChatRequest, StreamEvent};
pub use text::{truncate_preview, truncate_to_fit};
