//! Slash commands typed at the prompt.

use std::path::PathBuf;

use parley_engine::ingest::{self, PREVIEW_CHARS};
use parley_engine::parley_providers::ModelCatalog;
use parley_engine::ChatSession;
use thiserror::Error;

use crate::render;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Plain text: a chat turn.
    Chat(String),
    New,
    History,
    /// 1-based position as shown by `/history`.
    Load(usize),
    Delete(usize),
    ClearHistory,
    Models,
    Model(String),
    System(String),
    File(PathBuf),
    Unfile,
    Help,
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command /{0}; try /help")]
    Unknown(String),
    #[error("/{0} needs an argument")]
    MissingArgument(&'static str),
    #[error("{0:?} is not a conversation number")]
    BadNumber(String),
}

pub const HELP: &str = "\
Commands:
  /new              start a new chat
  /history          list saved chats
  /load <n>         continue saved chat n
  /delete <n>       delete saved chat n
  /clear-history    delete all saved chats
  /models           list installed models
  /model <name>     switch model
  /system <text>    set the system prompt
  /file <path>      attach a file to the next message
  /unfile           drop the attached file
  /help             show this help
  /quit             exit
Anything else is sent to the model. Ctrl-C stops a reply.";

fn number(name: &'static str, arg: &str) -> Result<usize, CommandError> {
    if arg.is_empty() {
        return Err(CommandError::MissingArgument(name));
    }
    match arg.parse::<usize>() {
        Ok(n) if n > 0 => Ok(n),
        _ => Err(CommandError::BadNumber(arg.to_string())),
    }
}

fn required(name: &'static str, arg: &str) -> Result<String, CommandError> {
    if arg.is_empty() {
        Err(CommandError::MissingArgument(name))
    } else {
        Ok(arg.to_string())
    }
}

impl Command {
    /// Parse one input line. Lines not starting with `/` are chat text.
    pub fn parse(line: &str) -> Result<Self, CommandError> {
        let Some(rest) = line.trim_start().strip_prefix('/') else {
            return Ok(Command::Chat(line.to_string()));
        };
        let (name, arg) = match rest.split_once(char::is_whitespace) {
            Some((name, arg)) => (name, arg.trim()),
            None => (rest.trim_end(), ""),
        };

        Ok(match name {
            "new" => Command::New,
            "history" => Command::History,
            "load" => Command::Load(number("load", arg)?),
            "delete" => Command::Delete(number("delete", arg)?),
            "clear-history" => Command::ClearHistory,
            "models" => Command::Models,
            "model" => Command::Model(required("model", arg)?),
            "system" => Command::System(required("system", arg)?),
            "file" => Command::File(PathBuf::from(required("file", arg)?)),
            "unfile" => Command::Unfile,
            "help" | "?" => Command::Help,
            "quit" | "exit" => Command::Quit,
            other => return Err(CommandError::Unknown(other.to_string())),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Run every command except `Chat`, which the REPL streams itself.
pub async fn execute(
    command: Command,
    session: &mut ChatSession,
    catalog: &ModelCatalog,
) -> Flow {
    match command {
        Command::Chat(_) => {}
        Command::New => {
            session.new_chat();
            render::print_notice("Started a new chat.");
        }
        Command::History => render::print_history(session.history()),
        Command::Load(n) => {
            let Some(id) = session.history().get(n - 1).map(|r| r.id.clone()) else {
                render::print_error(&format!("No saved chat number {n}."));
                return Flow::Continue;
            };
            session.load_conversation(&id);
            for message in session.messages() {
                render::print_message(message);
            }
        }
        Command::Delete(n) => {
            let Some(id) = session.history().get(n - 1).map(|r| r.id.clone()) else {
                render::print_error(&format!("No saved chat number {n}."));
                return Flow::Continue;
            };
            match session.delete_conversation(&id) {
                Ok(Some(record)) => {
                    render::print_notice(&format!("Deleted \"{}\".", record.name));
                }
                Ok(None) => {}
                Err(e) => render::print_error(&format!("history not saved: {e}")),
            }
        }
        Command::ClearHistory => match session.clear_history() {
            Ok(()) => render::print_notice("Cleared all chat history."),
            Err(e) => render::print_error(&format!("history not saved: {e}")),
        },
        Command::Models => {
            let discovery = catalog.discover().await;
            if discovery.fallback {
                render::print_notice("Could not list installed models; showing defaults.");
            }
            for model in &discovery.models {
                let marker = if model == session.model() { "*" } else { " " };
                println!("{marker} {model}");
            }
        }
        Command::Model(name) => match session.set_model(&name) {
            Ok(()) => render::print_notice(&format!("Using model {}.", session.model())),
            Err(e) => render::print_error(&e.to_string()),
        },
        Command::System(prompt) => {
            session.set_system_prompt(prompt);
            render::print_notice("System prompt updated.");
        }
        Command::File(path) => match ingest::load_file(&path) {
            Ok(text) => {
                render::print_notice(&format!(
                    "Extracted {} characters; they will be sent with your next message.",
                    text.chars().count()
                ));
                println!("{}", ingest::preview(&text, PREVIEW_CHARS));
                session.attach_file_context(text);
            }
            Err(e) => render::print_error(&format!("Error processing file: {e}")),
        },
        Command::Unfile => {
            session.clear_file_context();
            render::print_notice("File content cleared.");
        }
        Command::Help => println!("{HELP}"),
        Command::Quit => return Flow::Quit,
    }
    Flow::Continue
}
