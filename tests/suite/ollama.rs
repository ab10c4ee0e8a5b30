//! Ollama client against a mock `/api/chat`.

use futures_util::StreamExt;
use parley_engine::parley_providers::OllamaClient;
use parley_engine::{ChatBackend, ChatRequest, Message, StreamEvent};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{MODEL, delta_line, mount_raw_stream, mount_status, mount_stream, ndjson_body};

fn request(text: &str) -> ChatRequest {
    ChatRequest::new(MODEL, "Be brief.", &[Message::user(text)])
}

async fn collect(client: &OllamaClient, text: &str) -> Vec<StreamEvent> {
    client.stream_chat(request(text)).collect().await
}

#[tokio::test]
async fn streams_deltas_then_done() {
    let server = MockServer::start().await;
    mount_stream(&server, &["Hel", "lo", "!"]).await;

    let client = OllamaClient::new(server.uri());
    let events = collect(&client, "hi").await;

    assert_eq!(
        events,
        vec![
            StreamEvent::TextDelta("Hel".into()),
            StreamEvent::TextDelta("lo".into()),
            StreamEvent::TextDelta("!".into()),
            StreamEvent::Done,
        ]
    );
}

#[tokio::test]
async fn sends_model_system_prompt_and_stream_flag() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(serde_json::json!({
            "model": MODEL,
            "stream": true,
            "messages": [
                {"role": "system", "content": "Be brief."},
                {"role": "user", "content": "hi"}
            ]
        })))
        .respond_with(ResponseTemplate::new(200).set_body_string(ndjson_body(&["ok"], true)))
        .expect(1)
        .mount(&server)
        .await;

    let client = OllamaClient::new(format!("{}/", server.uri()));
    let events = collect(&client, "hi").await;

    assert_eq!(events.last(), Some(&StreamEvent::Done));
}

#[tokio::test]
async fn non_success_status_is_api_error() {
    let server = MockServer::start().await;
    mount_status(&server, 404, r#"{"error":"model 'nope' not found"}"#).await;

    let client = OllamaClient::new(server.uri());
    let events = collect(&client, "hi").await;

    assert_eq!(events.len(), 1);
    let StreamEvent::Error(message) = &events[0] else {
        panic!("expected error, got {events:?}");
    };
    assert!(message.starts_with("API error 404"), "{message}");
    assert!(message.contains("model 'nope' not found"));
}

#[tokio::test]
async fn error_line_ends_stream_after_earlier_text() {
    let server = MockServer::start().await;
    let body = format!(
        "{}\n{}\n{}\n",
        delta_line("partial"),
        r#"{"error":"out of memory"}"#,
        delta_line("never seen")
    );
    mount_raw_stream(&server, body).await;

    let client = OllamaClient::new(server.uri());
    let events = collect(&client, "hi").await;

    assert_eq!(
        events,
        vec![
            StreamEvent::TextDelta("partial".into()),
            StreamEvent::Error("out of memory".into()),
        ]
    );
}

#[tokio::test]
async fn body_without_done_just_ends() {
    let server = MockServer::start().await;
    mount_raw_stream(&server, ndjson_body(&["a", "b"], false)).await;

    let client = OllamaClient::new(server.uri());
    let events = collect(&client, "hi").await;

    assert_eq!(
        events,
        vec![
            StreamEvent::TextDelta("a".into()),
            StreamEvent::TextDelta("b".into()),
        ]
    );
}

#[tokio::test]
async fn isolated_garbage_line_is_skipped() {
    let server = MockServer::start().await;
    let body = format!("{}\nnot json\n{}\n", delta_line("x"), ndjson_body(&["y"], true));
    mount_raw_stream(&server, body).await;

    let client = OllamaClient::new(server.uri());
    let events = collect(&client, "hi").await;

    assert_eq!(
        events,
        vec![
            StreamEvent::TextDelta("x".into()),
            StreamEvent::TextDelta("y".into()),
            StreamEvent::Done,
        ]
    );
}

#[tokio::test]
async fn unreachable_server_is_request_failure() {
    // Nothing listens on port 9 of localhost in a test environment.
    let client = OllamaClient::new("http://127.0.0.1:9");
    let events = collect(&client, "hi").await;

    assert!(matches!(
        events.as_slice(),
        [StreamEvent::Error(message)] if message.starts_with("Request failed")
    ));
}

#[tokio::test]
async fn one_shot_chat_returns_whole_reply() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .and(body_partial_json(serde_json::json!({"stream": false})))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "model": MODEL,
            "message": {"role": "assistant", "content": "All at once."},
            "done": true
        })))
        .mount(&server)
        .await;

    let client = OllamaClient::new(server.uri());
    let reply = client.chat(request("hi")).await.unwrap();

    assert_eq!(reply, "All at once.");
}

#[tokio::test]
async fn one_shot_chat_reports_status() {
    let server = MockServer::start().await;
    mount_status(&server, 500, "boom").await;

    let client = OllamaClient::new(server.uri());
    let err = client.chat(request("hi")).await.unwrap_err();

    assert!(err.to_string().contains("API error 500"), "{err}");
}
