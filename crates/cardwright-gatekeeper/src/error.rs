//! Gatekeeper error types

use thiserror::Error;

/// Errors raised by pre-flight resource checks
#[derive(Error, Debug)]
pub enum GatekeeperError {
    /// Source file exceeds the size ceiling
    #[error("File too large ({size_mb:.2}MB). Max allowed is {max_mb}MB.")]
    FileTooLarge {
        /// Actual size in megabytes
        size_mb: f64,
        /// Configured ceiling
        max_mb: u64,
    },

    /// Chunking produced more chunks than allowed
    #[error("Too many chunks ({count}). Max allowed is {max}. Try a smaller file or different density.")]
    TooManyChunks {
        /// Chunks produced
        count: usize,
        /// Configured ceiling
        max: usize,
    },

    /// File metadata could not be read
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}
