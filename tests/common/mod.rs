//! Shared fixtures: a mock Ollama server and scratch history directories.

#![allow(dead_code)]

use parley_engine::{ChatSession, HistoryStore};
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const MODEL: &str = "llama3";
pub const USER: &str = "tester";

/// One `/api/chat` stream line carrying `content`.
pub fn delta_line(content: &str) -> String {
    serde_json::json!({
        "model": MODEL,
        "message": {"role": "assistant", "content": content},
        "done": false
    })
    .to_string()
}

pub fn done_line() -> String {
    serde_json::json!({
        "model": MODEL,
        "message": {"role": "assistant", "content": ""},
        "done": true,
        "eval_count": 2
    })
    .to_string()
}

/// Newline-delimited body streaming `chunks` and, if `finished`, a done line.
pub fn ndjson_body(chunks: &[&str], finished: bool) -> String {
    let mut body = String::new();
    for chunk in chunks {
        body.push_str(&delta_line(chunk));
        body.push('\n');
    }
    if finished {
        body.push_str(&done_line());
        body.push('\n');
    }
    body
}

pub async fn mount_stream(server: &MockServer, chunks: &[&str]) {
    mount_raw_stream(server, ndjson_body(chunks, true)).await;
}

pub async fn mount_raw_stream(server: &MockServer, body: String) {
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(body)
                .insert_header("content-type", "application/x-ndjson"),
        )
        .mount(server)
        .await;
}

pub async fn mount_status(server: &MockServer, status: u16, body: &str) {
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(server)
        .await;
}

/// A session writing history under a fresh temporary directory.
pub fn temp_session() -> (TempDir, ChatSession) {
    let dir = tempfile::tempdir().unwrap();
    let session = open_session(&dir);
    (dir, session)
}

pub fn open_session(dir: &TempDir) -> ChatSession {
    ChatSession::open(
        USER,
        HistoryStore::new(dir.path()),
        MODEL,
        "You are a helpful AI assistant.",
    )
    .unwrap()
}
