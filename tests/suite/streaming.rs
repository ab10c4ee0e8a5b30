//! Full turns: session, Ollama client, mock server and history on disk.

use std::time::Duration;

use parley_engine::parley_providers::OllamaClient;
use parley_engine::{HistoryStore, RenderEvent, Role, TurnFinish};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::common::{USER, mount_status, mount_stream, ndjson_body, open_session, temp_session};

#[tokio::test]
async fn streamed_turn_is_rendered_and_saved() {
    let server = MockServer::start().await;
    mount_stream(&server, &["Here:\n```py\n", "print(1)\n", "```"]).await;
    let client = OllamaClient::new(server.uri());
    let (dir, mut session) = temp_session();

    session.submit("Show me Python").unwrap();
    let mut events = Vec::new();
    let outcome = session.run_turn(&client, &mut events).await.unwrap();

    assert_eq!(outcome.finish, TurnFinish::Completed);
    assert!(outcome.persisted.is_ok());
    assert_eq!(outcome.reply, "Here:\n```py\nprint(1)\n```");
    assert!(matches!(events.last(), Some(RenderEvent::Final(text)) if *text == outcome.reply));
    assert!(
        events[..events.len() - 1]
            .iter()
            .all(|e| matches!(e, RenderEvent::Partial(text) if text.ends_with('▌')))
    );

    let saved = HistoryStore::new(dir.path()).load(USER);
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].name, "Show me Python");
    assert_eq!(saved[0].messages.len(), 2);
    assert_eq!(saved[0].messages[1].role(), Role::Assistant);
    assert!(saved[0].messages[1].is_formatted());
    assert!(!saved[0].truncated);
}

#[tokio::test]
async fn server_error_becomes_saved_error_reply() {
    let server = MockServer::start().await;
    mount_status(&server, 404, r#"{"error":"model 'llama3' not found"}"#).await;
    let client = OllamaClient::new(server.uri());
    let (dir, mut session) = temp_session();

    session.submit("hello").unwrap();
    let outcome = session.run_turn(&client, &mut Vec::new()).await.unwrap();

    assert!(matches!(outcome.finish, TurnFinish::Failed(_)));
    assert!(outcome.reply.starts_with("**Error:**"), "{}", outcome.reply);
    assert!(outcome.reply.contains("model 'llama3' not found"));

    let saved = HistoryStore::new(dir.path()).load(USER);
    assert_eq!(saved[0].messages[1].content(), outcome.reply);
}

#[tokio::test]
async fn second_turn_updates_same_record() {
    let server = MockServer::start().await;
    mount_stream(&server, &["ok"]).await;
    let client = OllamaClient::new(server.uri());
    let (dir, mut session) = temp_session();

    session.submit("first question that is rather long").unwrap();
    session.run_turn(&client, &mut Vec::new()).await.unwrap();
    session.submit("second").unwrap();
    session.run_turn(&client, &mut Vec::new()).await.unwrap();

    let saved = HistoryStore::new(dir.path()).load(USER);
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].name, "first question that is rather ...");
    assert_eq!(saved[0].messages.len(), 4);
}

#[tokio::test]
async fn history_survives_reopening_and_continues() {
    let server = MockServer::start().await;
    mount_stream(&server, &["answer"]).await;
    let client = OllamaClient::new(server.uri());
    let (dir, mut session) = temp_session();

    session.submit("remember me").unwrap();
    session.run_turn(&client, &mut Vec::new()).await.unwrap();
    drop(session);

    let mut reopened = open_session(&dir);
    let id = reopened.history()[0].id.clone();
    assert!(reopened.load_conversation(&id));
    reopened.submit("and again").unwrap();

    let request = reopened.pending_request().unwrap();
    assert_eq!(request.messages.len(), 4);
    assert_eq!(request.messages[0].role(), Role::System);

    reopened.run_turn(&client, &mut Vec::new()).await.unwrap();
    let saved = HistoryStore::new(dir.path()).load(USER);
    assert_eq!(saved.len(), 1);
    assert_eq!(saved[0].messages.len(), 4);
}

#[tokio::test]
async fn cancel_interrupts_a_stalled_server() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(ndjson_body(&["too late"], true))
                .set_delay(Duration::from_secs(30)),
        )
        .mount(&server)
        .await;
    let client = OllamaClient::new(server.uri());
    let (dir, mut session) = temp_session();

    session.submit("slow question").unwrap();
    let token = session.cancel_token();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        token.cancel();
    });

    let outcome = tokio::time::timeout(
        Duration::from_secs(5),
        session.run_turn(&client, &mut Vec::new()),
    )
    .await
    .expect("cancel should end the turn promptly")
    .unwrap();

    assert_eq!(outcome.finish, TurnFinish::Cancelled);
    assert_eq!(outcome.reply, "");
    assert!(!session.is_streaming());

    let saved = HistoryStore::new(dir.path()).load(USER);
    assert!(saved[0].truncated);
}

#[tokio::test]
async fn one_shot_mode_uses_non_streaming_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/chat"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "message": {"role": "assistant", "content": "whole"},
            "done": true
        })))
        .mount(&server)
        .await;
    let client = OllamaClient::new(server.uri());
    let (_dir, session) = temp_session();
    let mut session = session.with_streaming(false);

    session.submit("hi").unwrap();
    let outcome = session.run_turn(&client, &mut Vec::new()).await.unwrap();

    assert_eq!(outcome.finish, TurnFinish::Completed);
    assert_eq!(outcome.reply, "whole");
}
