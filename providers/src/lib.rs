//! Model server clients with streaming support.
//!
//! # Architecture
//!
//! - [`ChatBackend`] - the inference boundary the engine drives
//! - [`ollama`] - Ollama `/api/chat` client (newline-delimited JSON stream)
//! - [`catalog`] - installed-model discovery through the `ollama list` command
//!
//! Streaming clients run the HTTP exchange on a spawned task that pushes
//! [`StreamEvent`]s into a bounded [`tokio::sync::mpsc`] channel. The caller
//! consumes them as a [`BoxStream`]; dropping that stream aborts the task, so
//! abandoning a reply also tears down the HTTP request.
//!
//! # Error Handling
//!
//! Failures during streaming are delivered as `StreamEvent::Error` rather than
//! `Err` returns, so text received before the failure is kept. The one-shot
//! [`ChatBackend::chat`] call returns `anyhow::Result`.

pub mod catalog;
pub mod ollama;

use std::sync::OnceLock;
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
pub use parley_types::{ChatRequest, StreamEvent};
use tokio::sync::mpsc;

pub use catalog::{Discovery, DiscoveryError, FALLBACK_MODELS, ModelCatalog, parse_model_list};
pub use ollama::{DEFAULT_OLLAMA_URL, OllamaClient};

const CONNECT_TIMEOUT_SECS: u64 = 10;
const TCP_KEEPALIVE_SECS: u64 = 60;
const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;
pub(crate) const STREAM_EVENT_CHANNEL_CAPACITY: usize = 256;

/// Something that can answer a [`ChatRequest`].
pub trait ChatBackend: Send + Sync {
    /// Stream the reply as it is generated.
    ///
    /// The stream ends after `Done` or `Error`. It may also simply end, which
    /// callers treat as completion.
    fn stream_chat(&self, request: ChatRequest) -> BoxStream<'static, StreamEvent>;

    /// Request the whole reply in one response.
    fn chat(&self, request: ChatRequest) -> BoxFuture<'static, anyhow::Result<String>>;
}

/// Shared HTTP client for the local model server.
pub fn http_client() -> &'static reqwest::Client {
    static CLIENT: OnceLock<reqwest::Client> = OnceLock::new();
    CLIENT.get_or_init(|| {
        base_client_builder().build().unwrap_or_else(|e| {
            tracing::error!("Failed to build HTTP client: {e}. Using defaults.");
            reqwest::Client::new()
        })
    })
}

fn base_client_builder() -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .redirect(reqwest::redirect::Policy::none())
}

pub(crate) async fn send_event(tx: &mpsc::Sender<StreamEvent>, event: StreamEvent) -> bool {
    tx.send(event).await.is_ok()
}

/// Read at most 32 KiB of an error response body.
pub async fn read_capped_error_body(response: reqwest::Response) -> String {
    use futures_util::StreamExt;

    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            return format!("{}...(truncated)", String::from_utf8_lossy(&body));
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}
