//! Driving a reply from submit to saved history.

use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use parley_context::HistoryError;
use parley_providers::ChatBackend;
use parley_types::{ChatRequest, ConversationRecord, Message, RecordId, StreamEvent};
use thiserror::Error;

use crate::errors::error_reply;
use crate::format::format_code_fences;
use crate::session::ChatSession;
use crate::state::TurnState;
use crate::{RenderEvent, RenderSink};

/// Shown after the partial reply while text is still arriving.
pub const CURSOR_MARKER: char = '▌';
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("message is empty")]
    Empty,
    #[error("a reply is still being generated")]
    Busy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnFinish {
    Completed,
    /// Stopped through the cancel token; the partial reply was kept.
    Cancelled,
    /// The server failed; the reply holds the error text.
    Failed(String),
}

#[derive(Debug)]
pub struct TurnOutcome {
    /// Formatted assistant text as stored in history.
    pub reply: String,
    pub finish: TurnFinish,
    /// A failed save leaves the in-memory conversation intact.
    pub persisted: Result<(), HistoryError>,
}

/// Adapt a one-shot reply to the event sequence of a stream.
fn oneshot_events(
    backend: &dyn ChatBackend,
    request: ChatRequest,
) -> BoxStream<'static, StreamEvent> {
    futures_util::stream::once(backend.chat(request))
        .flat_map(|result| {
            let events = match result {
                Ok(text) => vec![StreamEvent::TextDelta(text), StreamEvent::Done],
                Err(e) => vec![StreamEvent::Error(format!("{e:#}"))],
            };
            futures_util::stream::iter(events)
        })
        .boxed()
}

impl ChatSession {
    /// Accept a user message and queue the request for [`ChatSession::run_turn`].
    pub fn submit(&mut self, text: &str) -> Result<(), SubmitError> {
        if self.state.is_streaming() {
            return Err(SubmitError::Busy);
        }
        if text.trim().is_empty() {
            return Err(SubmitError::Empty);
        }

        let content = match self.file_context.take() {
            Some(context) => format!("File context:\n{context}\n\n---\n\n{text}"),
            None => text.to_string(),
        };
        self.messages.push(Message::user(content));

        let request = ChatRequest::new(self.model.clone(), &self.system_prompt, &self.messages);
        tracing::debug!(model = %request.model, messages = request.messages.len(), "turn submitted");
        self.state = TurnState::Streaming(request);
        self.cancel.reset();
        Ok(())
    }

    /// Stream the pending reply into `sink`, then save the conversation.
    ///
    /// Returns `None` when nothing was submitted.
    pub async fn run_turn(
        &mut self,
        backend: &dyn ChatBackend,
        sink: &mut dyn RenderSink,
    ) -> Option<TurnOutcome> {
        let request = self.state.pending_request()?.clone();
        let mut events = if self.streaming {
            backend.stream_chat(request)
        } else {
            oneshot_events(backend, request)
        };

        let cancel = self.cancel.clone();
        let mut accumulated = String::new();
        let mut finish = TurnFinish::Completed;

        loop {
            if cancel.is_cancelled() {
                finish = TurnFinish::Cancelled;
                break;
            }
            let next = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    finish = TurnFinish::Cancelled;
                    break;
                }
                next = events.next() => next,
            };

            match next {
                Some(StreamEvent::TextDelta(delta)) => {
                    accumulated.push_str(&delta);
                    let mut partial = format_code_fences(&accumulated);
                    partial.push(CURSOR_MARKER);
                    sink.render(RenderEvent::Partial(partial));
                    if !self.render_delay.is_zero() {
                        tokio::time::sleep(self.render_delay).await;
                    }
                }
                Some(StreamEvent::Done) | None => break,
                Some(StreamEvent::Error(message)) => {
                    tracing::warn!(model = %self.model, "reply failed: {message}");
                    accumulated = error_reply(&message);
                    finish = TurnFinish::Failed(message);
                    break;
                }
            }
        }
        // Abandon whatever the server still has to say.
        drop(events);

        if finish == TurnFinish::Cancelled {
            tracing::info!(chars = accumulated.len(), "reply stopped by user");
        }
        Some(self.finalize_turn(&accumulated, finish, sink))
    }

    fn finalize_turn(
        &mut self,
        accumulated: &str,
        finish: TurnFinish,
        sink: &mut dyn RenderSink,
    ) -> TurnOutcome {
        let reply = format_code_fences(accumulated);
        sink.render(RenderEvent::Final(reply.clone()));
        self.messages.push(Message::assistant_formatted(reply.clone()));

        let persisted = self.record_turn(finish == TurnFinish::Cancelled);
        if let Err(e) = &persisted {
            tracing::warn!("history not saved: {e}");
        }

        self.state = TurnState::Idle;
        self.cancel.reset();
        TurnOutcome {
            reply,
            finish,
            persisted,
        }
    }

    /// Fold the working messages into history and write it out.
    fn record_turn(&mut self, truncated: bool) -> Result<(), HistoryError> {
        let timestamp = chrono::Local::now().format(TIMESTAMP_FORMAT).to_string();
        let position = self
            .current
            .as_ref()
            .and_then(|id| self.history.iter().position(|r| &r.id == id));

        if let Some(pos) = position {
            let record = &mut self.history[pos];
            record.messages.clone_from(&self.messages);
            record.timestamp = timestamp;
            record.model.clone_from(&self.model);
            record.truncated = truncated;
        } else {
            if let Some(missing) = &self.current {
                tracing::warn!(id = %missing, "active conversation vanished; saving as new");
            }
            let record = ConversationRecord {
                id: RecordId::generate(),
                name: ConversationRecord::title_for(&self.messages),
                messages: self.messages.clone(),
                timestamp,
                model: self.model.clone(),
                truncated,
            };
            self.current = Some(record.id.clone());
            self.history.push(record);
        }

        self.store.save(&self.user_id, &self.history)
    }
}
