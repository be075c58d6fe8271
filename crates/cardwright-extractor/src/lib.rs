//! Cardwright Extractor
//!
//! Turns long-form text into question/answer study cards by driving a chat
//! model and cleaning up what it returns.
//!
//! # Overview
//!
//! The model is an unreliable collaborator: it wraps JSON in fences, stops
//! mid-array, answers "Yes." and invents deck names. The pipeline tolerates
//! all of that. Malformed output means fewer cards, a failing chunk is
//! isolated, and only an unreachable model or an exceeded resource ceiling
//! fail a run.
//!
//! # Architecture
//!
//! ```text
//! Text → TextChunker → chunks ─┬─ worker: ChatModel → extract_records → CardFilter → (Refiner → CardFilter)
//!                              ├─ worker: ...
//!                              └─ worker: ...
//!                                        ↓
//!                     aggregator: dedup → CardValidator → cards + PipelineStats
//! ```
//!
//! # Key Features
//!
//! - **Bounded chunking**: line, then sentence, then hard splits; lossless
//! - **Salvage parsing**: every complete card object is recovered from noisy output
//! - **Deck matching**: closed deck lists enforced, content-scored, majority-voted
//! - **Optional refinement**: a second model pass with quote restoration
//! - **Deterministic mode**: one worker and a seeded deck shuffle
//! - **Failure isolation**: failed chunks and rejected cards go to JSON Lines logs
//!
//! # Example Usage
//!
//! ```no_run
//! use cardwright_extractor::{CardPipeline, GenerationConfig};
//! use cardwright_llm::MockModel;
//! use tokio_util::sync::CancellationToken;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let model = MockModel::new(
//!     r#"[{"question":"What does insulin regulate?","answer":"Blood glucose levels.","deck":"Endocrine"}]"#,
//! );
//! let pipeline = CardPipeline::new(model, GenerationConfig::deterministic())?;
//!
//! let decks = vec!["Endocrine".to_string()];
//! let report = pipeline
//!     .generate("Insulin regulates blood glucose.", &decks, &CancellationToken::new())
//!     .await?;
//!
//! println!("{}", report.stats.summary());
//! for card in &report.cards {
//!     println!("{}", card);
//! }
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod chunking;
mod config;
mod error;
mod failure_log;
mod filter;
mod observer;
mod parser;
mod pipeline;
mod prompt;
mod refiner;
mod source;
mod stats;

#[cfg(test)]
mod tests;

pub use chunking::TextChunker;
pub use config::{CardDensity, GenerationConfig};
pub use error::ExtractorError;
pub use failure_log::{FailureLogger, FAILED_CHUNKS_FILE, REJECTED_CARDS_FILE};
pub use filter::{
    apply_majority_vote, cards_to_records, majority_deck, score_deck, CardFilter, DeckMatcher,
    MatchPolicy, YesNoVocabulary,
};
pub use observer::{PipelineObserver, TracingObserver};
pub use parser::{extract_records, Record};
pub use pipeline::{CardPipeline, GenerationReport};
pub use prompt::PromptBuilder;
pub use refiner::{restore_quotes, Refiner};
pub use source::PlainTextSource;
pub use stats::{PipelineStats, StatsSnapshot};
