//! Configuration for Parley.
//!
//! Read from `~/.parley/config.toml`, or from the file named by
//! `PARLEY_CONFIG`. Every key is optional; string values may reference
//! environment variables as `${VAR}`.
//!
//! ```toml
//! [app]
//! model = "llama3"
//! user_id = "4f9c..."
//! system_prompt = "You are a helpful AI assistant."
//! stream = true
//! render_delay_ms = 0
//!
//! [ollama]
//! base_url = "http://localhost:11434"
//! list_command = ["ollama", "list"]
//! stream_idle_timeout_secs = 0
//!
//! [history]
//! dir = "~/.parley/chat_histories"
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;
use std::{env, fs, io};

use serde::Deserialize;
use thiserror::Error;

pub const CONFIG_ENV_VAR: &str = "PARLEY_CONFIG";
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

const DATA_DIR_NAME: &str = ".parley";
const HISTORY_DIR_NAME: &str = "chat_histories";

#[derive(Debug, Default, Deserialize)]
pub struct ParleyConfig {
    pub app: Option<AppConfig>,
    pub ollama: Option<OllamaConfig>,
    pub history: Option<HistoryConfig>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config at {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to parse config at {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            ConfigError::Read { path, .. } | ConfigError::Parse { path, .. } => path,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct AppConfig {
    /// Model selected at startup. Unset means the first installed model.
    pub model: Option<String>,
    /// History file stem. Generated and written back on first run when unset.
    pub user_id: Option<String>,
    pub system_prompt: Option<String>,
    /// Show replies as they are generated. Defaults to true.
    pub stream: Option<bool>,
    /// Pause between streamed chunks, for a typewriter effect.
    pub render_delay_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct OllamaConfig {
    pub base_url: Option<String>,
    /// Program and arguments printing the installed models.
    pub list_command: Option<Vec<String>>,
    /// Seconds without stream data before a reply is failed. 0 disables.
    pub stream_idle_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct HistoryConfig {
    pub dir: Option<String>,
}

/// Replace `${VAR}` with the variable's value (empty when unset).
///
/// `${}` and an unclosed `${` are kept literally.
#[must_use]
pub fn expand_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;

    while let Some(start) = rest.find("${") {
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(0) => {
                out.push_str(&rest[..start + 3]);
                rest = &after[1..];
            }
            Some(end) => {
                out.push_str(&rest[..start]);
                out.push_str(&env::var(&after[..end]).unwrap_or_default());
                rest = &after[end + 1..];
            }
            None => break,
        }
    }

    out.push_str(rest);
    out
}

/// Expand a leading `~/` to the home directory.
fn expand_home(raw: &str) -> PathBuf {
    match raw.strip_prefix("~/") {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => PathBuf::from(rest),
        },
        None => PathBuf::from(raw),
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value
        .map(|v| expand_env_vars(v).trim().to_string())
        .filter(|v| !v.is_empty())
}

impl ParleyConfig {
    /// Load the config file. `Ok(None)` when there is no file.
    pub fn load() -> Result<Option<Self>, ConfigError> {
        match config_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(None),
        }
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>, ConfigError> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path).map_err(|source| {
            tracing::warn!(path = %path.display(), "Failed to read config: {source}");
            ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;

        toml::from_str(&content).map(Some).map_err(|source| {
            tracing::warn!(path = %path.display(), "Failed to parse config: {source}");
            ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            }
        })
    }

    #[must_use]
    pub fn model(&self) -> Option<String> {
        non_empty(self.app.as_ref().and_then(|a| a.model.as_ref()))
    }

    #[must_use]
    pub fn user_id(&self) -> Option<String> {
        non_empty(self.app.as_ref().and_then(|a| a.user_id.as_ref()))
    }

    #[must_use]
    pub fn system_prompt(&self) -> String {
        self.app
            .as_ref()
            .and_then(|a| a.system_prompt.as_deref())
            .map_or_else(|| DEFAULT_SYSTEM_PROMPT.to_string(), expand_env_vars)
    }

    #[must_use]
    pub fn streaming(&self) -> bool {
        self.app.as_ref().and_then(|a| a.stream).unwrap_or(true)
    }

    #[must_use]
    pub fn render_delay(&self) -> Duration {
        Duration::from_millis(self.app.as_ref().and_then(|a| a.render_delay_ms).unwrap_or(0))
    }

    #[must_use]
    pub fn base_url(&self) -> String {
        non_empty(self.ollama.as_ref().and_then(|o| o.base_url.as_ref()))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string())
    }

    /// Model listing command; empty means `ollama list`.
    #[must_use]
    pub fn list_command(&self) -> Vec<String> {
        self.ollama
            .as_ref()
            .and_then(|o| o.list_command.as_ref())
            .map(|argv| argv.iter().map(|a| expand_env_vars(a)).collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn stream_idle_timeout(&self) -> Option<Duration> {
        self.ollama
            .as_ref()
            .and_then(|o| o.stream_idle_timeout_secs)
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    #[must_use]
    pub fn history_dir(&self) -> PathBuf {
        match non_empty(self.history.as_ref().and_then(|h| h.dir.as_ref())) {
            Some(dir) => expand_home(&dir),
            None => default_history_dir(),
        }
    }
}

/// `$PARLEY_CONFIG`, else `~/.parley/config.toml`.
#[must_use]
pub fn config_path() -> Option<PathBuf> {
    if let Some(path) = env::var_os(CONFIG_ENV_VAR).filter(|p| !p.is_empty()) {
        return Some(PathBuf::from(path));
    }
    dirs::home_dir().map(|home| home.join(DATA_DIR_NAME).join("config.toml"))
}

#[must_use]
pub fn default_history_dir() -> PathBuf {
    match dirs::home_dir() {
        Some(home) => home.join(DATA_DIR_NAME).join(HISTORY_DIR_NAME),
        None => PathBuf::from(HISTORY_DIR_NAME),
    }
}

/// `[app] user_id` from the config file, read without the typed schema so a
/// file that fails to deserialize still yields it.
#[must_use]
pub fn stored_user_id_at(path: &Path) -> Option<String> {
    let content = fs::read_to_string(path).ok()?;
    let doc = content.parse::<toml_edit::DocumentMut>().ok()?;
    let raw = doc.get("app")?.as_table_like()?.get("user_id")?.as_str()?;
    non_empty(Some(&raw.to_string()))
}

/// Where the user id of this run came from.
#[derive(Debug)]
pub enum UserIdOrigin {
    /// Read from the config file.
    Stored,
    /// Generated and written to the config file.
    Saved,
    /// Generated for this run only.
    Unsaved(io::Error),
}

/// [`resolve_user_id_at`] for the default config path.
pub fn resolve_user_id(fresh: impl FnOnce() -> String) -> (String, UserIdOrigin) {
    match config_path() {
        Some(path) => resolve_user_id_at(&path, fresh),
        None => (
            fresh(),
            UserIdOrigin::Unsaved(io::Error::new(
                io::ErrorKind::NotFound,
                "Could not determine config path",
            )),
        ),
    }
}

/// The user id stored in the config at `path`, or `fresh()` saved back to it.
///
/// A file that exists but does not parse is never rewritten, so a user id
/// added to it later is not replaced on every launch.
pub fn resolve_user_id_at(path: &Path, fresh: impl FnOnce() -> String) -> (String, UserIdOrigin) {
    if let Some(id) = stored_user_id_at(path) {
        return (id, UserIdOrigin::Stored);
    }

    let id = fresh();
    if let Err(e) = ParleyConfig::load_from(path) {
        let reason = io::Error::new(io::ErrorKind::InvalidData, e.to_string());
        return (id, UserIdOrigin::Unsaved(reason));
    }
    match persist_user_id_at(path, &id) {
        Ok(()) => (id, UserIdOrigin::Saved),
        Err(e) => (id, UserIdOrigin::Unsaved(e)),
    }
}

/// Write `[app] user_id` into the config file, keeping comments and layout.
pub fn persist_user_id_at(path: &Path, user_id: &str) -> io::Result<()> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == io::ErrorKind::NotFound => String::new(),
        Err(e) => return Err(e),
    };

    let mut doc = content
        .parse::<toml_edit::DocumentMut>()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    let app = doc
        .entry("app")
        .or_insert(toml_edit::table())
        .as_table_like_mut()
        .ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("`app` in {} is not a table", path.display()),
            )
        })?;
    app.insert("user_id", toml_edit::value(user_id));

    let options = parley_utils::WriteOptions {
        owner_only: true,
        ..parley_utils::WriteOptions::default()
    };
    parley_utils::atomic_write_with(path, doc.to_string().as_bytes(), options)?;
    tracing::info!(path = %path.display(), "Saved generated user id to config");
    Ok(())
}
