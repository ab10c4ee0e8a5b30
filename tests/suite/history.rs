//! History files on disk, driven through the session.

use std::fs;

use parley_engine::{ChatSession, HistoryError, HistoryStore, Role, conversation_label};

use crate::common::{USER, open_session};

const LEGACY_FILE: &str = r#"[
  {
    "name": "What is Rust?",
    "messages": [
      {"role": "user", "content": "What is Rust?"},
      {"role": "assistant", "content": "A systems language."}
    ],
    "timestamp": "2024-03-02 18:40",
    "model": "mistral"
  },
  {
    "name": "",
    "messages": [
      {"role": "user", "content": "hi"},
      {"role": "assistant", "content": "hello"}
    ],
    "timestamp": "2024-03-03 09:12",
    "model": "llama3"
  }
]"#;

#[test]
fn records_without_ids_load_with_fresh_ones() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(format!("{USER}.json")), LEGACY_FILE).unwrap();

    let records = HistoryStore::new(dir.path()).load(USER);

    assert_eq!(records.len(), 2);
    assert_ne!(records[0].id, records[1].id);
    assert!(!records[0].truncated);
    assert_eq!(records[0].messages[1].role(), Role::Assistant);
    assert!(!records[0].messages[1].is_formatted());
    assert_eq!(conversation_label(&records[0], 0), "What is Rust?");
    assert_eq!(conversation_label(&records[1], 1), "Chat 2 (1 messages)");
}

#[test]
fn corrupt_file_opens_empty_and_is_replaced_on_save() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(format!("{USER}.json"));
    fs::write(&path, "{ not json").unwrap();

    let mut session = open_session(&dir);
    assert!(session.history().is_empty());

    session.clear_history().unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap().trim(), "[]");
}

#[test]
fn users_have_separate_files() {
    let dir = tempfile::tempdir().unwrap();
    let store = HistoryStore::new(dir.path());
    fs::write(store.path_for("alice").unwrap(), LEGACY_FILE).unwrap();

    assert_eq!(store.load("alice").len(), 2);
    assert!(store.load("bob").is_empty());
}

#[test]
fn user_id_cannot_leave_history_dir() {
    let dir = tempfile::tempdir().unwrap();
    let store = HistoryStore::new(dir.path());

    assert!(matches!(
        store.path_for("../../etc/passwd"),
        Err(HistoryError::InvalidUserId(_))
    ));
    assert!(ChatSession::open("../escape", store, "llama3", "sys").is_err());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 0);
}

#[test]
fn dotted_and_plain_ids_stay_separate() {
    let dir = tempfile::tempdir().unwrap();
    let store = HistoryStore::new(dir.path());
    fs::write(store.path_for("alicesmith").unwrap(), LEGACY_FILE).unwrap();

    assert!(ChatSession::open("alice.smith", store.clone(), "llama3", "sys").is_err());
    let session = ChatSession::open("alicesmith", store, "llama3", "sys").unwrap();
    assert_eq!(session.history().len(), 2);
}

#[test]
fn deleting_through_session_persists() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(format!("{USER}.json")), LEGACY_FILE).unwrap();
    let mut session = open_session(&dir);

    let first = session.history()[0].id.clone();
    assert!(session.load_conversation(&first));
    let removed = session.delete_conversation(&first).unwrap().unwrap();

    assert_eq!(removed.name, "What is Rust?");
    assert!(session.messages().is_empty());
    assert!(session.current().is_none());

    let on_disk = HistoryStore::new(dir.path()).load(USER);
    assert_eq!(on_disk.len(), 1);
    assert_eq!(on_disk[0].model, "llama3");
}

#[test]
fn ids_are_stable_across_saves() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join(format!("{USER}.json")), LEGACY_FILE).unwrap();
    let mut session = open_session(&dir);

    let second = session.history()[1].id.clone();
    let first = session.history()[0].id.clone();
    session.delete_conversation(&first).unwrap();

    let reopened = open_session(&dir);
    assert_eq!(reopened.history()[0].id, second);
}
