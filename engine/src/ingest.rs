//! Text extraction from attached files.
//!
//! Only text-like formats are decoded. PDF and Word documents are recognized
//! but need an extractor that Parley does not bundle.

use std::io;
use std::path::{Path, PathBuf};
use std::string::FromUtf8Error;

use parley_types::truncate_preview;
use thiserror::Error;

pub const MIME_PDF: &str = "application/pdf";
pub const MIME_DOCX: &str = "application/vnd.openxmlformats-officedocument.wordprocessingml.document";
pub const MIME_DOC: &str = "application/msword";

/// Characters of an extraction shown back to the user.
pub const PREVIEW_CHARS: usize = 2000;

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not decode {mime} as UTF-8: {source}")]
    Extraction {
        mime: String,
        #[source]
        source: FromUtf8Error,
    },
    #[error("{mime} files need an extractor that is not installed")]
    MissingDependency { mime: String },
    #[error("Unsupported file type: {0}")]
    UnsupportedType(String),
}

fn is_text_mime(mime: &str) -> bool {
    mime.starts_with("text/") || matches!(mime, "application/json" | "application/xml")
}

/// Decode `bytes` according to `mime`.
pub fn extract_text(mime: &str, bytes: &[u8]) -> Result<String, IngestError> {
    if is_text_mime(mime) {
        return String::from_utf8(bytes.to_vec()).map_err(|source| IngestError::Extraction {
            mime: mime.to_string(),
            source,
        });
    }
    match mime {
        MIME_PDF | MIME_DOCX | MIME_DOC => Err(IngestError::MissingDependency {
            mime: mime.to_string(),
        }),
        other => Err(IngestError::UnsupportedType(other.to_string())),
    }
}

/// MIME type guessed from the file extension.
#[must_use]
pub fn mime_from_path(path: &Path) -> Option<&'static str> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();
    let mime = match ext.as_str() {
        "txt" => "text/plain",
        "md" => "text/markdown",
        "csv" => "text/csv",
        "json" => "application/json",
        "xml" => "application/xml",
        "pdf" => MIME_PDF,
        "docx" => MIME_DOCX,
        "doc" => MIME_DOC,
        _ => return None,
    };
    Some(mime)
}

/// Read `path` and extract its text.
pub fn load_file(path: &Path) -> Result<String, IngestError> {
    let mime = mime_from_path(path).unwrap_or("application/octet-stream");
    let bytes = std::fs::read(path).map_err(|source| IngestError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let text = extract_text(mime, &bytes)?;
    tracing::debug!(path = %path.display(), mime, chars = text.chars().count(), "file extracted");
    Ok(text)
}

#[must_use]
pub fn preview(text: &str, max: usize) -> String {
    truncate_preview(text, max, "...")
}
