//! Card module - the unit of output of the generation pipeline

use serde::{Deserialize, Serialize};
use std::fmt;

/// Deck name used when no allowed deck can be resolved for a card
pub const DEFAULT_DECK: &str = "Default";

/// A study card produced by the pipeline
///
/// Once a card leaves the pipeline its question and answer are non-empty
/// after trimming, and its deck is one of the caller-supplied deck names
/// (or [`DEFAULT_DECK`] when the caller supplied none).
///
/// # Examples
///
/// ```
/// use cardwright_domain::Card;
///
/// let card = Card::new("What is ATP?", "The cell's energy currency.", "Biology")
///     .with_quote("ATP is the energy currency of the cell.");
/// assert_eq!(card.deck, "Biology");
/// assert!(card.has_quote());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Card {
    /// Front of the card
    pub question: String,

    /// Back of the card
    pub answer: String,

    /// Deck (category) the card is filed under
    #[serde(default = "default_deck")]
    pub deck: String,

    /// Verbatim source snippet supporting the card; empty when unknown
    #[serde(default)]
    pub quote: String,
}

fn default_deck() -> String {
    DEFAULT_DECK.to_string()
}

impl Card {
    /// Create a card without a source quote
    pub fn new(
        question: impl Into<String>,
        answer: impl Into<String>,
        deck: impl Into<String>,
    ) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            deck: deck.into(),
            quote: String::new(),
        }
    }

    /// Attach a source quote
    pub fn with_quote(mut self, quote: impl Into<String>) -> Self {
        self.quote = quote.into();
        self
    }

    /// Whether the card carries a non-empty source quote
    pub fn has_quote(&self) -> bool {
        !self.quote.trim().is_empty()
    }
}

impl fmt::Display for Card {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] Q: {} | A: {}", self.deck, self.question, self.answer)
    }
}

/// A card together with the score of its currently assigned deck
///
/// Only used while decks are resolved for a batch; never stored.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    /// The candidate card
    pub card: Card,

    /// Non-negative deck-match score (0.0 means no keyword evidence)
    pub score: f64,
}

impl ScoredCandidate {
    /// Pair a card with its score
    pub fn new(card: Card, score: f64) -> Self {
        Self {
            card,
            score: score.max(0.0),
        }
    }

    /// Whether the assigned deck is backed by any content evidence
    pub fn is_confident(&self) -> bool {
        self.score > 0.0
    }
}
