//! Parley - terminal chat with locally hosted Ollama models.
//!
//! ```text
//! main() -> config + user id -> ChatSession::open -> repl()
//!                                                    |
//!                          stdin line ── Command::parse ──┬── /command -> commands::execute
//!                                                         └── text -> submit + run_turn -> TerminalSink
//! ```
//!
//! Ctrl-C is owned by a listener task: during a reply it trips the session's
//! cancel token, otherwise it ends the REPL.

mod commands;
mod render;

use std::fs::{self, OpenOptions};
use std::io::stdout;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use parley_config::{ParleyConfig, UserIdOrigin};
use parley_engine::parley_providers::{FALLBACK_MODELS, ModelCatalog, OllamaClient};
use parley_engine::{CancelToken, ChatSession, HistoryStore, SubmitError, TurnFinish};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

use crate::commands::{Command, Flow};
use crate::render::TerminalSink;

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    let (log_file, init_warnings) = open_log_file();

    if let Some((log_path, file)) = log_file {
        tracing_subscriber::registry()
            .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
            .with(env_filter)
            .init();

        tracing::info!(path = %log_path.display(), "Logging initialized");
        for warning in init_warnings {
            tracing::warn!("{warning}");
        }
        return;
    }

    // No log file: stay silent rather than interleave logs with the chat.
    tracing_subscriber::registry().with(env_filter).init();
}

fn open_log_file() -> (Option<(PathBuf, fs::File)>, Vec<String>) {
    let mut warnings = Vec::new();

    for candidate in log_file_candidates() {
        if let Some(parent) = candidate.parent()
            && let Err(e) = fs::create_dir_all(parent)
        {
            warnings.push(format!("Failed to create log dir {}: {e}", parent.display()));
            continue;
        }

        match OpenOptions::new().create(true).append(true).open(&candidate) {
            Ok(file) => return (Some((candidate, file)), warnings),
            Err(e) => {
                warnings.push(format!("Failed to open log file {}: {e}", candidate.display()));
            }
        }
    }

    (None, warnings)
}

fn log_file_candidates() -> Vec<PathBuf> {
    let mut candidates = Vec::new();

    // ~/.parley/logs/parley.log
    if let Some(config_path) = parley_config::config_path()
        && let Some(config_dir) = config_path.parent()
    {
        candidates.push(config_dir.join("logs").join("parley.log"));
    }

    candidates.push(PathBuf::from(".parley").join("logs").join("parley.log"));
    candidates
}

fn load_config() -> ParleyConfig {
    match ParleyConfig::load() {
        Ok(config) => config.unwrap_or_default(),
        Err(e) => {
            render::print_error(&format!("{e}; using defaults"));
            ParleyConfig::default()
        }
    }
}

/// The configured user id, or a fresh one saved for next time.
fn resolve_user_id() -> String {
    let (id, origin) = parley_config::resolve_user_id(|| uuid::Uuid::new_v4().to_string());
    match origin {
        UserIdOrigin::Stored => {}
        UserIdOrigin::Saved => tracing::info!("Generated a new user id"),
        UserIdOrigin::Unsaved(e) => {
            tracing::warn!("Could not save generated user id: {e}");
            render::print_notice(
                "Could not save your user id; this session's history will not be found next time.",
            );
        }
    }
    id
}

/// Marks a chat turn as running until dropped, so Ctrl-C goes to the cancel
/// token instead of ending the REPL.
struct TurnActive<'a>(&'a AtomicBool);

impl<'a> TurnActive<'a> {
    fn begin(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for TurnActive<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Forward Ctrl-C: cancel the running reply, or ask the REPL to quit.
fn spawn_interrupt_listener(
    token: CancelToken,
    turn_active: Arc<AtomicBool>,
) -> mpsc::Receiver<()> {
    let (tx, rx) = mpsc::channel(1);
    tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("Ctrl-C handler unavailable: {e}");
                break;
            }
            if turn_active.load(Ordering::SeqCst) {
                tracing::debug!("interrupt: stopping reply");
                token.cancel();
            } else if tx.send(()).await.is_err() {
                break;
            }
        }
    });
    rx
}

async fn chat_turn(
    session: &mut ChatSession,
    client: &OllamaClient,
    turn_active: &AtomicBool,
    text: &str,
) {
    let active = TurnActive::begin(turn_active);
    match session.submit(text) {
        Ok(()) => {}
        Err(SubmitError::Empty) => return,
        Err(e @ SubmitError::Busy) => {
            render::print_error(&e.to_string());
            return;
        }
    }

    render::print_assistant_header(session.model());
    let mut sink = TerminalSink::new(stdout());
    let outcome = session.run_turn(client, &mut sink).await;
    drop(active);

    let Some(outcome) = outcome else { return };
    if outcome.finish == TurnFinish::Cancelled {
        render::print_notice("Stopped.");
    }
    if let Err(e) = outcome.persisted {
        render::print_error(&format!("history not saved: {e}"));
    }
}

async fn repl(
    session: &mut ChatSession,
    client: &OllamaClient,
    catalog: &ModelCatalog,
) -> Result<()> {
    let turn_active = Arc::new(AtomicBool::new(false));
    let mut interrupts = spawn_interrupt_listener(session.cancel_token(), Arc::clone(&turn_active));
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        render::print_prompt();
        let line = tokio::select! {
            line = lines.next_line() => line.context("failed to read input")?,
            _ = interrupts.recv() => {
                println!();
                None
            }
        };
        let Some(line) = line else { break };

        match Command::parse(&line) {
            Ok(Command::Chat(text)) => chat_turn(session, client, &turn_active, &text).await,
            Ok(command) => {
                if commands::execute(command, session, catalog).await == Flow::Quit {
                    break;
                }
            }
            Err(e) => render::print_error(&e.to_string()),
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = load_config();
    let user_id = resolve_user_id();

    let catalog = ModelCatalog::from_argv(&config.list_command());
    let model = match config.model() {
        Some(model) => model,
        None => {
            let discovery = catalog.discover().await;
            if discovery.fallback {
                render::print_notice("Could not list installed models; using defaults.");
            }
            discovery
                .models
                .into_iter()
                .next()
                .unwrap_or_else(|| FALLBACK_MODELS[0].to_string())
        }
    };

    let store = HistoryStore::new(config.history_dir());
    let mut session = ChatSession::open(user_id, store, model, config.system_prompt())
        .context("failed to open chat session")?
        .with_streaming(config.streaming())
        .with_render_delay(config.render_delay());

    let client =
        OllamaClient::new(config.base_url()).with_idle_timeout(config.stream_idle_timeout());

    render::print_banner(session.user_id(), session.model(), client.base_url());
    if !session.history().is_empty() {
        render::print_notice(&format!(
            "{} saved chats. /history to list them.",
            session.history().len()
        ));
    }

    repl(&mut session, &client, &catalog).await
}
