//! Plain-text documents
//!
//! Form feeds (`\x0c`) act as page breaks. Blank pages are kept as a
//! placeholder line; a document whose pages are all blank has no text.

use cardwright_domain::{DocumentError, DocumentSource};
use std::io::ErrorKind;
use std::path::Path;
use tracing::warn;

const EXTENSIONS: &[&str] = &["txt", "text", "md", "markdown"];

/// Reads UTF-8 text and Markdown files
#[derive(Debug, Default, Clone, Copy)]
pub struct PlainTextSource;

impl PlainTextSource {
    /// Create a new source
    pub fn new() -> Self {
        Self
    }
}

impl DocumentSource for PlainTextSource {
    fn supports(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| EXTENSIONS.iter().any(|known| known.eq_ignore_ascii_case(ext)))
            .unwrap_or(false)
    }

    fn extract_text(&self, path: &Path) -> Result<String, DocumentError> {
        if !self.supports(path) {
            return Err(DocumentError::UnsupportedFormat(path.to_path_buf()));
        }

        let bytes = std::fs::read(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => DocumentError::NotFound(path.to_path_buf()),
            _ => DocumentError::Unreadable {
                path: path.to_path_buf(),
                source: e,
            },
        })?;

        let text = String::from_utf8(bytes).map_err(|e| DocumentError::Corrupt {
            path: path.to_path_buf(),
            detail: format!("not valid UTF-8: {}", e.utf8_error()),
        })?;

        join_pages(path, &text)
    }
}

fn join_pages(path: &Path, text: &str) -> Result<String, DocumentError> {
    let pages: Vec<&str> = text.split('\x0c').collect();
    let mut parts = Vec::with_capacity(pages.len());
    let mut blank = 0;

    for (i, page) in pages.iter().enumerate() {
        if page.trim().is_empty() {
            blank += 1;
            if pages.len() > 1 {
                warn!("Page {} of {} has no text", i + 1, path.display());
            }
            parts.push(format!("\n[PAGE {}: NO TEXT DETECTED]\n", i + 1));
        } else {
            parts.push((*page).to_string());
        }
    }

    if blank == pages.len() {
        return Err(DocumentError::NoText(path.to_path_buf()));
    }
    if pages.len() == 1 {
        return Ok(text.to_string());
    }
    Ok(parts.join("\n"))
}
