//! Terminal output for the REPL.
//!
//! Streamed replies are drawn in place: each partial render is compared with
//! what is already on screen and only the difference is written. The
//! formatter almost always extends the previous text; when it rewrites the
//! line in progress (a fence tag being trimmed) that line is cleared and
//! redrawn.

use std::io::{self, Write};

use crossterm::cursor::{MoveLeft, MoveToColumn};
use crossterm::queue;
use crossterm::style::Stylize;
use crossterm::terminal::{Clear, ClearType};
use parley_engine::{
    CURSOR_MARKER, ConversationRecord, Message, RenderEvent, RenderSink, Role,
    conversation_label, sanitize_terminal_text,
};

#[derive(Debug, PartialEq, Eq)]
enum Update<'a> {
    /// New text continues what is shown.
    Append(&'a str),
    /// The last shown line changed; redraw it from its start.
    RewriteLine(&'a str),
    /// An earlier line changed; continue on a fresh line from there.
    Reprint(&'a str),
}

fn common_prefix_len(a: &str, b: &str) -> usize {
    a.char_indices()
        .zip(b.chars())
        .find(|((_, x), y)| x != y)
        .map_or_else(|| a.len().min(b.len()), |((idx, _), _)| idx)
}

fn plan_update<'a>(shown: &str, next: &'a str) -> Update<'a> {
    let common = common_prefix_len(shown, next);
    if common == shown.len() {
        return Update::Append(&next[common..]);
    }
    let line_start = shown[..common].rfind('\n').map_or(0, |i| i + 1);
    if shown[line_start..].contains('\n') {
        Update::Reprint(&next[line_start..])
    } else {
        Update::RewriteLine(&next[line_start..])
    }
}

/// Draws one assistant reply at a time onto `out`.
pub struct TerminalSink<W: Write> {
    out: W,
    shown: String,
    marker_visible: bool,
}

impl<W: Write> TerminalSink<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            shown: String::new(),
            marker_visible: false,
        }
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }

    fn draw(&mut self, text: &str, cursor: bool) -> io::Result<()> {
        if self.marker_visible {
            queue!(self.out, MoveLeft(1), Clear(ClearType::UntilNewLine))?;
            self.marker_visible = false;
        }

        match plan_update(&self.shown, text) {
            Update::Append(tail) => self.out.write_all(tail.as_bytes())?,
            Update::RewriteLine(line) => {
                queue!(self.out, MoveToColumn(0), Clear(ClearType::CurrentLine))?;
                self.out.write_all(line.as_bytes())?;
            }
            Update::Reprint(rest) => {
                self.out.write_all(b"\n")?;
                self.out.write_all(rest.as_bytes())?;
            }
        }
        text.clone_into(&mut self.shown);

        if cursor {
            write!(self.out, "{CURSOR_MARKER}")?;
            self.marker_visible = true;
        }
        self.out.flush()
    }

    fn finish(&mut self, text: &str) -> io::Result<()> {
        self.draw(text, false)?;
        self.out.write_all(b"\n\n")?;
        self.shown.clear();
        self.out.flush()
    }
}

impl<W: Write> RenderSink for TerminalSink<W> {
    fn render(&mut self, event: RenderEvent) {
        let result = match event {
            RenderEvent::Partial(text) => {
                let body = text.strip_suffix(CURSOR_MARKER).unwrap_or(&text);
                let clean = sanitize_terminal_text(body);
                self.draw(&clean, true)
            }
            RenderEvent::Final(text) => self.finish(&sanitize_terminal_text(&text)),
        };
        if let Err(e) = result {
            tracing::debug!("terminal write failed: {e}");
        }
    }
}

pub fn print_banner(user_id: &str, model: &str, base_url: &str) {
    let short_id: String = user_id.chars().take(8).collect();
    println!("{}", "Parley - chat with Ollama".bold());
    println!(
        "{}",
        format!("user {short_id} | model {model} | {base_url}").dark_grey()
    );
    println!("{}", "Type /help for commands. Ctrl-C stops a reply.".dark_grey());
    println!();
}

pub fn print_notice(text: &str) {
    println!("{}", text.dark_yellow());
}

pub fn print_error(text: &str) {
    eprintln!("{}", sanitize_terminal_text(text).red());
}

pub fn print_assistant_header(model: &str) {
    println!("{}", format!("{model}:").cyan().bold());
}

pub fn print_prompt() {
    print!("{} ", "you>".green().bold());
    let _ = io::stdout().flush();
}

pub fn print_message(message: &Message) {
    let label = match message.role() {
        Role::User => "you:".green().bold(),
        Role::Assistant => "assistant:".cyan().bold(),
        Role::System => "system:".dark_grey().bold(),
    };
    println!("{label}");
    println!("{}\n", sanitize_terminal_text(message.content()));
}

/// One line per saved conversation, newest first.
pub fn print_history(records: &[ConversationRecord]) {
    if records.is_empty() {
        print_notice("No chat history yet.");
        return;
    }
    for (position, record) in records.iter().enumerate().rev() {
        let label = conversation_label(record, position);
        let mut line = format!(
            "{:>3}. {} {}",
            position + 1,
            sanitize_terminal_text(&label),
            record.timestamp.as_str().dark_grey()
        );
        if record.truncated {
            line.push_str(&format!(" {}", "(stopped)".dark_grey()));
        }
        println!("{line}");
    }
}
