//! Cardwright Domain Layer
//!
//! This crate contains the data model shared by every Cardwright crate. It
//! keeps its dependency surface to `serde` alone and defines the value
//! objects and trait interfaces that the infrastructure crates depend upon.
//!
//! ## Key Concepts
//!
//! - **Card**: A question/answer pair filed under a deck, with an optional
//!   verbatim source quote
//! - **Chunk**: A bounded contiguous slice of source text sent to the model
//!   in one request
//! - **ScoredCandidate**: A card paired with its deck-match score while decks
//!   are being resolved
//! - **DocumentSource**: The collaborator that turns a file path into text
//!
//! ## Architecture
//!
//! - Pure data and trait definitions only
//! - Model calling, validation and orchestration live in other crates

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod card;
pub mod chunk;
pub mod traits;

// Re-exports for convenience
pub use card::{Card, ScoredCandidate, DEFAULT_DECK};
pub use chunk::Chunk;
pub use traits::{DocumentError, DocumentSource};
