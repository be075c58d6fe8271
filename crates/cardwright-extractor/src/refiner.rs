//! Optional second model pass over a chunk's cards
//!
//! The model is asked to edit the batch (drop yes/no and trivia cards,
//! make questions self-contained, enforce decks, merge duplicates). Models
//! often drop the `quote` field while rewriting, so quotes are restored
//! from the pre-refinement batch by matching questions and answers.
//!
//! Refinement never fails the chunk: any error, or an empty reply, returns
//! the original batch.

use crate::config::{GenerationConfig, REFINEMENT_MAX_TOKENS};
use crate::filter::{cards_to_records, field_text};
use crate::parser::{extract_records, Record};
use crate::prompt::{refinement_system_prompt, refinement_user_prompt};
use cardwright_domain::Card;
use cardwright_llm::{ChatModel, CompletionRequest};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Originals shorter than this never take part in fuzzy quote matching
const FUZZY_MIN_CHARS: usize = 10;

/// Runs the refinement pass
#[derive(Debug, Clone)]
pub struct Refiner {
    target_language: String,
    decks: Vec<String>,
    temperature: f32,
}

impl Refiner {
    /// Create a refiner for the given language and allowed decks
    pub fn new(target_language: impl Into<String>, decks: Vec<String>, temperature: f32) -> Self {
        Self {
            target_language: target_language.into(),
            decks,
            temperature,
        }
    }

    /// Create a refiner from a run configuration
    pub fn from_config(config: &GenerationConfig, decks: &[String]) -> Self {
        Self::new(config.target_language.clone(), decks.to_vec(), config.temperature)
    }

    /// Refine `cards`, returning raw records for a second filtering pass
    pub async fn refine<M: ChatModel>(
        &self,
        model: &M,
        cards: &[Card],
        cancel: &CancellationToken,
    ) -> Vec<Record> {
        if cards.is_empty() {
            return Vec::new();
        }

        let cards_json = match serde_json::to_string_pretty(cards) {
            Ok(json) => json,
            Err(e) => {
                warn!("Refinement skipped, cards did not serialize: {}", e);
                return cards_to_records(cards);
            }
        };

        info!("Refining {} cards", cards.len());
        for card in cards {
            debug!("[PRE-EDIT] Q: {} | A: {}", card.question, card.answer);
        }

        let request = CompletionRequest::new(
            refinement_system_prompt(&self.target_language, &self.decks),
            refinement_user_prompt(&cards_json),
        )
        .with_temperature(self.temperature)
        .with_max_tokens(REFINEMENT_MAX_TOKENS);

        let reply = match model.complete(&request, cancel).await {
            Ok(reply) => reply,
            Err(e) => {
                warn!("Refinement failed: {}. Using original cards.", e);
                return cards_to_records(cards);
            }
        };

        let mut refined = extract_records(&reply);
        if refined.is_empty() {
            warn!("Refinement returned no usable cards. Using original cards.");
            return cards_to_records(cards);
        }

        info!("Refinement returned {} cards", refined.len());
        restore_quotes(&mut refined, cards);
        refined
    }
}

/// Lowercased text → quote, insertion-ordered; later duplicates overwrite
#[derive(Default)]
struct QuoteIndex {
    entries: Vec<(String, String)>,
}

impl QuoteIndex {
    fn insert(&mut self, key: String, quote: &str) {
        match self.entries.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = quote.to_string(),
            None => self.entries.push((key, quote.to_string())),
        }
    }

    fn exact(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, quote)| quote.as_str())
    }

    fn overlapping(&self, key: &str) -> Option<&str> {
        if key.is_empty() {
            return None;
        }
        self.entries
            .iter()
            .find(|(existing, _)| {
                existing.chars().count() > FUZZY_MIN_CHARS
                    && (key.contains(existing.as_str()) || existing.contains(key))
            })
            .map(|(_, quote)| quote.as_str())
    }
}

fn has_quote(record: &Record) -> bool {
    match record.get("quote") {
        Some(Value::String(s)) => !s.is_empty(),
        Some(Value::Null) | None => false,
        Some(_) => true,
    }
}

/// Fill in missing quotes on refined records from the originals
///
/// Tries, in order: exact question, exact answer, question overlap,
/// answer overlap. Comparison is on trimmed, lowercased text.
pub fn restore_quotes(refined: &mut [Record], originals: &[Card]) {
    let mut by_question = QuoteIndex::default();
    let mut by_answer = QuoteIndex::default();
    for card in originals {
        by_question.insert(card.question.trim().to_lowercase(), &card.quote);
        by_answer.insert(card.answer.trim().to_lowercase(), &card.quote);
    }

    for record in refined.iter_mut().filter(|record| !has_quote(record)) {
        let question = field_text(record, "question", "Question").to_lowercase();
        let answer = field_text(record, "answer", "Answer").to_lowercase();

        let restored = by_question
            .exact(&question)
            .or_else(|| by_answer.exact(&answer))
            .or_else(|| by_question.overlapping(&question))
            .or_else(|| by_answer.overlapping(&answer));

        if let Some(quote) = restored {
            record.insert("quote".to_string(), Value::String(quote.to_string()));
        }
    }
}
