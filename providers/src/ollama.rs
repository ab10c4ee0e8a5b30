//! Ollama chat API client.
//!
//! `POST {base_url}/api/chat` with `"stream": true` answers with one JSON
//! object per line:
//!
//! ```text
//! {"message":{"role":"assistant","content":"Hel"},"done":false}
//! {"message":{"role":"assistant","content":"lo"},"done":false}
//! {"message":{"role":"assistant","content":""},"done":true,"eval_count":2}
//! ```
//!
//! Failures arrive either as a non-2xx status or as a line `{"error":"..."}`.

use std::time::Duration;

use anyhow::Context;
use futures_util::future::{AbortHandle, Abortable, BoxFuture};
use futures_util::stream::BoxStream;
use futures_util::{FutureExt, StreamExt};
use parley_types::{ChatRequest, Message, Role, StreamEvent};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::{
    ChatBackend, STREAM_EVENT_CHANNEL_CAPACITY, http_client, read_capped_error_body, send_event,
};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

/// A single line above this size is treated as a broken stream.
const MAX_LINE_BUFFER_BYTES: usize = 4 * 1024 * 1024;
const MAX_PARSE_ERRORS: usize = 3;

#[derive(Debug, Serialize)]
struct WireMessage {
    role: Role,
    content: String,
}

impl From<&Message> for WireMessage {
    fn from(message: &Message) -> Self {
        Self {
            role: message.role(),
            content: message.content().to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatBody {
    model: String,
    messages: Vec<WireMessage>,
    stream: bool,
}

impl ChatBody {
    fn new(request: &ChatRequest, stream: bool) -> Self {
        Self {
            model: request.model.clone(),
            messages: request.messages.iter().map(WireMessage::from).collect(),
            stream,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChunkMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatChunk {
    #[serde(default)]
    message: Option<ChunkMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Clone)]
pub struct OllamaClient {
    base_url: String,
    client: reqwest::Client,
    idle_timeout: Option<Duration>,
}

impl OllamaClient {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            client: http_client().clone(),
            idle_timeout: None,
        }
    }

    /// Fail the stream when no bytes arrive for `timeout`. `None` waits forever.
    #[must_use]
    pub fn with_idle_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.idle_timeout = timeout.filter(|t| !t.is_zero());
        self
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }
}

impl Default for OllamaClient {
    fn default() -> Self {
        Self::new(DEFAULT_OLLAMA_URL)
    }
}

/// Aborts the producer task once the consumer lets go of the stream.
struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

impl ChatBackend for OllamaClient {
    fn stream_chat(&self, request: ChatRequest) -> BoxStream<'static, StreamEvent> {
        let (tx, rx) = mpsc::channel(STREAM_EVENT_CHANNEL_CAPACITY);
        let body = ChatBody::new(&request, true);
        let client = self.client.clone();
        let url = self.chat_url();
        let idle_timeout = self.idle_timeout;

        tracing::debug!(model = %body.model, messages = body.messages.len(), %url, "starting chat stream");

        let (abort_handle, abort_registration) = AbortHandle::new_pair();
        let task = async move {
            stream_reply(&client, &url, &body, &tx, idle_timeout).await;
        };
        tokio::spawn(Abortable::new(task, abort_registration));

        let guard = AbortOnDrop(abort_handle);
        futures_util::stream::unfold((rx, guard), |(mut rx, guard)| async move {
            let event = rx.recv().await?;
            Some((event, (rx, guard)))
        })
        .boxed()
    }

    fn chat(&self, request: ChatRequest) -> BoxFuture<'static, anyhow::Result<String>> {
        let body = ChatBody::new(&request, false);
        let client = self.client.clone();
        let url = self.chat_url();

        async move {
            let response = client
                .post(&url)
                .json(&body)
                .send()
                .await
                .with_context(|| format!("request to {url} failed"))?;
            if !response.status().is_success() {
                let status = response.status();
                let text = read_capped_error_body(response).await;
                anyhow::bail!("API error {status}: {text}");
            }
            let reply: ChatChunk = response
                .json()
                .await
                .context("model server sent an unreadable reply")?;
            if let Some(error) = reply.error {
                anyhow::bail!(error);
            }
            Ok(reply.message.map(|m| m.content).unwrap_or_default())
        }
        .boxed()
    }
}

async fn stream_reply(
    client: &reqwest::Client,
    url: &str,
    body: &ChatBody,
    tx: &mpsc::Sender<StreamEvent>,
    idle_timeout: Option<Duration>,
) {
    let response = match client.post(url).json(body).send().await {
        Ok(response) => response,
        Err(e) => {
            tracing::warn!(%url, "chat request failed: {e}");
            let _ = send_event(tx, StreamEvent::Error(format!("Request failed: {e}"))).await;
            return;
        }
    };

    if !response.status().is_success() {
        let status = response.status();
        let error_text = read_capped_error_body(response).await;
        tracing::warn!(%status, "model server rejected chat request");
        let _ = send_event(
            tx,
            StreamEvent::Error(format!("API error {status}: {error_text}")),
        )
        .await;
        return;
    }

    process_ndjson_stream(response, tx, idle_timeout).await;
}

/// Pump newline-delimited JSON from `response` into `tx`.
///
/// Returns after the first terminal event, when the receiver is gone, or at
/// end of body. End of body without `done` sends nothing extra.
async fn process_ndjson_stream(
    response: reqwest::Response,
    tx: &mpsc::Sender<StreamEvent>,
    idle_timeout: Option<Duration>,
) {
    let mut stream = response.bytes_stream();
    let mut buffer: Vec<u8> = Vec::new();
    let mut parse_errors = 0usize;

    loop {
        let next = match idle_timeout {
            Some(limit) => {
                if let Ok(next) = tokio::time::timeout(limit, stream.next()).await {
                    next
                } else {
                    let _ = send_event(tx, StreamEvent::Error("Stream idle timeout".into())).await;
                    return;
                }
            }
            None => stream.next().await,
        };

        let Some(chunk) = next else { break };
        let chunk = match chunk {
            Ok(chunk) => chunk,
            Err(e) => {
                let _ = send_event(tx, StreamEvent::Error(format!("Stream read failed: {e}"))).await;
                return;
            }
        };
        buffer.extend_from_slice(&chunk);

        while let Some(line) = drain_next_line(&mut buffer) {
            if !dispatch_line(&line, tx, &mut parse_errors).await {
                return;
            }
        }

        if buffer.len() > MAX_LINE_BUFFER_BYTES {
            let _ = send_event(
                tx,
                StreamEvent::Error("Stream line exceeded maximum size (4 MiB)".into()),
            )
            .await;
            return;
        }
    }

    if !buffer.is_empty() {
        dispatch_line(&buffer, tx, &mut parse_errors).await;
    }
}

fn drain_next_line(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let pos = buffer.iter().position(|&b| b == b'\n')?;
    let mut line: Vec<u8> = buffer.drain(..=pos).collect();
    line.pop();
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    Some(line)
}

/// Forward the events of one line. Returns false when the stream is over.
async fn dispatch_line(
    line: &[u8],
    tx: &mpsc::Sender<StreamEvent>,
    parse_errors: &mut usize,
) -> bool {
    let Ok(line) = std::str::from_utf8(line) else {
        let _ = send_event(
            tx,
            StreamEvent::Error("Received invalid UTF-8 from model server".into()),
        )
        .await;
        return false;
    };
    if line.trim().is_empty() {
        return true;
    }

    let events = match parse_line(line) {
        Ok(events) => {
            *parse_errors = 0;
            events
        }
        Err(e) => {
            *parse_errors += 1;
            tracing::warn!(%e, payload_bytes = line.len(), "Invalid stream line");
            if *parse_errors >= MAX_PARSE_ERRORS {
                let _ = send_event(tx, StreamEvent::Error(format!("Invalid stream payload: {e}")))
                    .await;
                return false;
            }
            return true;
        }
    };

    for event in events {
        let terminal = matches!(event, StreamEvent::Done | StreamEvent::Error(_));
        if !send_event(tx, event).await || terminal {
            return false;
        }
    }
    true
}

fn parse_line(line: &str) -> Result<Vec<StreamEvent>, serde_json::Error> {
    let chunk: ChatChunk = serde_json::from_str(line)?;
    if let Some(error) = chunk.error {
        return Ok(vec![StreamEvent::Error(error)]);
    }

    let mut events = Vec::with_capacity(2);
    if let Some(text) = chunk.message.map(|m| m.content).filter(|c| !c.is_empty()) {
        events.push(StreamEvent::TextDelta(text));
    }
    if chunk.done {
        events.push(StreamEvent::Done);
    }
    Ok(events)
}
