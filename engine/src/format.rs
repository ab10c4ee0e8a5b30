//! Code-fence normalization for streamed replies.
//!
//! Models stream fenced code in whatever shape the tokens arrive. Every
//! fence is re-emitted as
//!
//! ````text
//! ```<language>
//! <body>
//! ```
//! ````
//!
//! Text outside fences passes through untouched.

const FENCE: &str = "```";

/// What to do with a fence that is still open at the end of the text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FenceMode {
    /// Emit the opening marker and buffered lines without a closing marker.
    #[default]
    EmitUnterminated,
    /// Discard the open fence and its lines.
    DropUnterminated,
}

struct OpenFence<'a> {
    language: &'a str,
    body: Vec<&'a str>,
}

impl<'a> OpenFence<'a> {
    /// Trailing text on the marker line is a language tag only when it is a
    /// single word; otherwise it is the first line of the body.
    fn open(marker_line: &'a str) -> Self {
        let trailing = marker_line[FENCE.len()..].trim();
        if trailing.is_empty() {
            Self {
                language: "",
                body: Vec::new(),
            }
        } else if trailing.contains(char::is_whitespace) {
            Self {
                language: "",
                body: vec![trailing],
            }
        } else {
            Self {
                language: trailing,
                body: Vec::new(),
            }
        }
    }

    fn write_head(&self, out: &mut Vec<String>) {
        out.push(format!("{FENCE}{}", self.language));
        out.extend(self.body.iter().map(|line| (*line).to_string()));
    }
}

#[must_use]
pub fn format_code_fences(text: &str) -> String {
    format_code_fences_with(text, FenceMode::default())
}

#[must_use]
pub fn format_code_fences_with(text: &str, mode: FenceMode) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut fence: Option<OpenFence<'_>> = None;

    for line in text.split('\n') {
        let is_marker = line.starts_with(FENCE);
        match (fence.take(), is_marker) {
            (None, true) => fence = Some(OpenFence::open(line)),
            (None, false) => out.push(line.to_string()),
            (Some(open), true) => {
                open.write_head(&mut out);
                out.push(FENCE.to_string());
            }
            (Some(mut open), false) => {
                open.body.push(line);
                fence = Some(open);
            }
        }
    }

    if let Some(open) = fence {
        match mode {
            FenceMode::EmitUnterminated => open.write_head(&mut out),
            FenceMode::DropUnterminated => {}
        }
    }

    out.join("\n")
}
