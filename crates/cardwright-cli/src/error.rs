//! Error types for the CLI application.

use cardwright_domain::DocumentError;
use cardwright_extractor::ExtractorError;
use cardwright_llm::LlmError;
use thiserror::Error;

/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Pipeline error
    #[error("{0}")]
    Extractor(#[from] ExtractorError),

    /// Model client error
    #[error("Model error: {0}")]
    Llm(#[from] LlmError),

    /// Document could not be read
    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
