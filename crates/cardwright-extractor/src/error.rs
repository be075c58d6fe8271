//! Error types for the generation pipeline

use cardwright_domain::DocumentError;
use cardwright_gatekeeper::GatekeeperError;
use thiserror::Error;

/// Errors that end a whole run
///
/// Per-chunk failures are absorbed by the pipeline and never surface here.
#[derive(Error, Debug)]
pub enum ExtractorError {
    /// The model endpoint did not answer the reachability probe
    #[error("Cannot connect to the model server: {0}")]
    Unreachable(String),

    /// A pre-flight ceiling was exceeded
    #[error(transparent)]
    ResourceLimit(#[from] GatekeeperError),

    /// The document could not be turned into text
    #[error("Document error: {0}")]
    Document(#[from] DocumentError),

    /// Invalid run configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// A worker task panicked or was aborted
    #[error("Worker failed: {0}")]
    Worker(String),
}
