//! Trait definitions for external interactions
//!
//! These traits define the boundaries between domain logic and infrastructure.
//! Infrastructure implementations live in other crates.

use std::error::Error;
use std::fmt;
use std::path::{Path, PathBuf};

/// Turns a document on disk into plain text
///
/// Implemented by the infrastructure layer (cardwright-extractor ships a
/// plain-text source; richer formats plug in here).
pub trait DocumentSource: Send + Sync {
    /// Extract the full text of the document at `path`
    fn extract_text(&self, path: &Path) -> Result<String, DocumentError>;

    /// Whether this source understands the given file
    fn supports(&self, path: &Path) -> bool;
}

/// Errors raised while turning a document into text
#[derive(Debug)]
pub enum DocumentError {
    /// The file does not exist
    NotFound(PathBuf),
    /// The file exists but could not be read
    Unreadable {
        /// Offending file
        path: PathBuf,
        /// Underlying I/O failure
        source: std::io::Error,
    },
    /// The file was read but its contents are malformed
    Corrupt {
        /// Offending file
        path: PathBuf,
        /// What was wrong
        detail: String,
    },
    /// No source handles this file type
    UnsupportedFormat(PathBuf),
    /// The document contains no extractable text
    NoText(PathBuf),
}

impl fmt::Display for DocumentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentError::NotFound(path) => {
                write!(f, "document not found: {}", path.display())
            }
            DocumentError::Unreadable { path, source } => {
                write!(f, "failed to read {}: {}", path.display(), source)
            }
            DocumentError::Corrupt { path, detail } => {
                write!(f, "corrupt document {}: {}", path.display(), detail)
            }
            DocumentError::UnsupportedFormat(path) => {
                write!(f, "unsupported document format: {}", path.display())
            }
            DocumentError::NoText(path) => {
                write!(f, "no text could be extracted from {}", path.display())
            }
        }
    }
}

impl Error for DocumentError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            DocumentError::Unreadable { source, .. } => Some(source),
            _ => None,
        }
    }
}
