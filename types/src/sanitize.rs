//! Terminal-safe rendering of untrusted text.
//!
//! Model output, server error bodies and persisted history are all shown in
//! the user's terminal. Escape sequences in that text could move the cursor,
//! rewrite earlier output, or talk to the clipboard, so they are removed
//! before display.

use std::borrow::Cow;

const ESC: char = '\x1b';
const BEL: char = '\x07';
const C1_CSI: char = '\u{009b}';

#[derive(Clone, Copy, PartialEq, Eq)]
enum Scan {
    Text,
    /// Just saw ESC.
    Escape,
    /// Inside `ESC [` or C1 CSI, waiting for a final byte.
    Csi,
    /// Inside OSC/DCS/PM/APC, waiting for BEL or `ESC \`.
    String { allow_bel: bool },
    /// Saw ESC while inside a string sequence.
    StringEscape { allow_bel: bool },
    /// Charset designators (`ESC ( B`) consume one more char.
    SkipOne,
}

/// Strip escape sequences and control characters except `\n`, `\t`, `\r`.
///
/// Returns the input unchanged (borrowed) when nothing needs removing.
///
/// ```
/// use parley_types::sanitize_terminal_text;
///
/// assert_eq!(sanitize_terminal_text("plain"), "plain");
/// assert_eq!(sanitize_terminal_text("a\x1b[31mb"), "ab");
/// ```
#[must_use]
pub fn sanitize_terminal_text(input: &str) -> Cow<'_, str> {
    if !input.chars().any(is_unsafe) {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len());
    let mut state = Scan::Text;

    for c in input.chars() {
        state = match state {
            Scan::Text => match c {
                ESC => Scan::Escape,
                C1_CSI => Scan::Csi,
                c if is_unsafe(c) => Scan::Text,
                c => {
                    out.push(c);
                    Scan::Text
                }
            },
            Scan::Escape => match c {
                '[' => Scan::Csi,
                ']' => Scan::String { allow_bel: true },
                'P' | '^' | '_' => Scan::String { allow_bel: false },
                '(' | ')' | '*' | '+' | '#' | ' ' => Scan::SkipOne,
                '7' | '8' | 'c' | 'D' | 'E' | 'H' | 'M' | 'N' | 'O' | 'Z' | '=' | '>' | '<' => {
                    Scan::Text
                }
                ESC => Scan::Escape,
                // Unknown introducer: only the ESC is dropped.
                c => {
                    if !is_unsafe(c) {
                        out.push(c);
                    }
                    Scan::Text
                }
            },
            Scan::Csi => match c {
                '\x40'..='\x7e' => Scan::Text,
                '\x20'..='\x3f' => Scan::Csi,
                // Malformed CSI ends here; keep the char if it is printable.
                c => {
                    if !is_unsafe(c) {
                        out.push(c);
                    }
                    Scan::Text
                }
            },
            Scan::String { allow_bel } => match c {
                BEL if allow_bel => Scan::Text,
                ESC => Scan::StringEscape { allow_bel },
                _ => Scan::String { allow_bel },
            },
            Scan::StringEscape { allow_bel } => {
                if c == '\\' {
                    Scan::Text
                } else {
                    Scan::String { allow_bel }
                }
            }
            Scan::SkipOne => Scan::Text,
        };
    }

    Cow::Owned(out)
}

fn is_unsafe(c: char) -> bool {
    match c {
        '\n' | '\t' | '\r' => false,
        '\0'..='\x1f' | '\x7f' | '\u{0080}'..='\u{009f}' => true,
        _ => false,
    }
}
