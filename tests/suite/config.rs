//! Config files as the binary reads them.

use std::fs;
use std::time::Duration;

use parley_config::{ParleyConfig, UserIdOrigin, persist_user_id_at, resolve_user_id_at};

#[test]
fn env_vars_expand_in_config_values() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    // HOME is set in any test environment
    let home = std::env::var("HOME").unwrap();
    fs::write(
        &path,
        "[ollama]\nbase_url = \"http://${PARLEY_TEST_SURELY_UNSET_HOST}localhost:11434\"\n\n[history]\ndir = \"${HOME}/chats\"\n",
    )
    .unwrap();

    let config = ParleyConfig::load_from(&path).unwrap().unwrap();

    assert_eq!(config.base_url(), "http://localhost:11434");
    assert_eq!(config.history_dir(), std::path::Path::new(&home).join("chats"));
}

#[test]
fn generated_user_id_is_read_back_with_other_keys() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        "[app]\nmodel = \"phi3\"\nstream = false\n\n[ollama]\nstream_idle_timeout_secs = 45\n",
    )
    .unwrap();

    persist_user_id_at(&path, "0b6f2c1e").unwrap();
    let config = ParleyConfig::load_from(&path).unwrap().unwrap();

    assert_eq!(config.user_id().as_deref(), Some("0b6f2c1e"));
    assert_eq!(config.model().as_deref(), Some("phi3"));
    assert!(!config.streaming());
    assert_eq!(config.stream_idle_timeout(), Some(Duration::from_secs(45)));
}

#[test]
fn relaunch_with_broken_config_keeps_user_history() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");

    let (first, origin) = resolve_user_id_at(&path, || "a1".to_string());
    assert!(matches!(origin, UserIdOrigin::Saved));

    // A typo the typed schema rejects but the TOML document still holds.
    let content = fs::read_to_string(&path).unwrap();
    fs::write(&path, format!("{content}\n[ollama]\nstream_idle_timeout_secs = \"soon\"\n")).unwrap();
    assert!(ParleyConfig::load_from(&path).is_err());

    let (second, origin) = resolve_user_id_at(&path, || "b2".to_string());
    assert_eq!(second, first);
    assert!(matches!(origin, UserIdOrigin::Stored));
}
