//! Card cleaning, yes/no filtering and deck assignment
//!
//! Turns raw records from the parser into [`Card`]s:
//!
//! 1. Read `question`/`answer` (or their capitalized variants), joining
//!    list values with spaces; drop records missing either
//! 2. Drop bare yes/no answers
//! 3. Force the deck into the allowed list (exact, case-insensitive,
//!    substring, default, first)
//! 4. Optionally re-score every allowed deck against the card content and
//!    switch to a strictly better one
//! 5. Reassign cards with no keyword evidence to the batch's majority deck
//!
//! Scoring is a pure function of the deck name and the card text.

use crate::parser::Record;
use cardwright_domain::{Card, ScoredCandidate, DEFAULT_DECK};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Weights used when scoring a deck against card content
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchPolicy {
    /// Per character of a deck phrase found in the question
    pub question_phrase_weight: f64,

    /// Per character of a deck phrase found in the answer
    pub answer_phrase_weight: f64,

    /// Per character of a deck word found in the question
    pub question_word_weight: f64,

    /// Per character of a deck word found in the answer
    pub answer_word_weight: f64,

    /// Deck words must be longer than this to count
    pub min_word_len: usize,

    /// Reassign zero-score cards to the batch's majority deck
    pub majority_vote: bool,
}

impl Default for MatchPolicy {
    fn default() -> Self {
        Self {
            question_phrase_weight: 3.0,
            answer_phrase_weight: 1.0,
            question_word_weight: 1.5,
            answer_word_weight: 0.5,
            min_word_len: 3,
            majority_vote: true,
        }
    }
}

impl MatchPolicy {
    /// Validate weights
    pub fn validate(&self) -> Result<(), String> {
        let weights = [
            self.question_phrase_weight,
            self.answer_phrase_weight,
            self.question_word_weight,
            self.answer_word_weight,
        ];
        if weights.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err("match weights must be finite and non-negative".to_string());
        }
        Ok(())
    }
}

/// Answers that mark a card as a yes/no question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YesNoVocabulary {
    /// Whole answers (lowercased) that are rejected
    pub exact: Vec<String>,

    /// Answer prefixes (lowercased) that are rejected
    pub prefixes: Vec<String>,
}

impl Default for YesNoVocabulary {
    fn default() -> Self {
        let exact = ["yes", "yes.", "no", "no.", "evet", "evet.", "hayır", "hayır."];
        let prefixes = ["yes,", "no,", "evet,", "hayır,"];
        Self {
            exact: exact.iter().map(|s| s.to_string()).collect(),
            prefixes: prefixes.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl YesNoVocabulary {
    /// Whether `answer` is a bare affirmative or negative
    pub fn matches(&self, answer: &str) -> bool {
        let answer = answer.trim().to_lowercase();
        self.exact.iter().any(|token| *token == answer)
            || self.prefixes.iter().any(|prefix| answer.starts_with(prefix.as_str()))
    }
}

/// One comma-separated part of a deck name, lowercased, with its significant words
#[derive(Debug, Clone, PartialEq)]
struct DeckPart {
    phrase: String,
    words: Vec<String>,
}

fn deck_parts(name: &str, min_word_len: usize) -> Vec<DeckPart> {
    name.split(',')
        .map(|part| part.trim().to_lowercase())
        .filter(|part| !part.is_empty())
        .map(|phrase| {
            let words = phrase
                .split_whitespace()
                .filter(|w| w.chars().count() > min_word_len)
                .map(str::to_string)
                .collect();
            DeckPart { phrase, words }
        })
        .collect()
}

fn score_parts(parts: &[DeckPart], question: &str, answer: &str, policy: &MatchPolicy) -> f64 {
    let mut score = 0.0;
    for part in parts {
        let len = part.phrase.chars().count() as f64;
        if question.contains(part.phrase.as_str()) {
            score += len * policy.question_phrase_weight;
        } else if answer.contains(part.phrase.as_str()) {
            score += len * policy.answer_phrase_weight;
        } else {
            for word in &part.words {
                let len = word.chars().count() as f64;
                if question.contains(word.as_str()) {
                    score += len * policy.question_word_weight;
                } else if answer.contains(word.as_str()) {
                    score += len * policy.answer_word_weight;
                }
            }
        }
    }
    score
}

/// Score how well `deck` fits a card
///
/// `question` and `answer` are expected lowercased. Each comma-separated
/// part of the deck name scores its length × 3 when it occurs in the
/// question, × 1 in the answer; otherwise each of its words longer than
/// the minimum scores its length × 1.5 in the question or × 0.5 in the answer.
pub fn score_deck(deck: &str, question: &str, answer: &str, policy: &MatchPolicy) -> f64 {
    score_parts(&deck_parts(deck, policy.min_word_len), question, answer, policy)
}

/// Most frequent deck among `decks`; ties go to the deck seen first
pub fn majority_deck<'a, I>(decks: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for deck in decks {
        match counts.iter_mut().find(|(name, _)| *name == deck) {
            Some((_, count)) => *count += 1,
            None => counts.push((deck, 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (name, count) in counts {
        if best.map_or(true, |(_, top)| count > top) {
            best = Some((name, count));
        }
    }
    best.map(|(name, _)| name.to_string())
}

/// Resolves and scores decks against a fixed allowed list
#[derive(Debug, Clone)]
pub struct DeckMatcher {
    allowed: Vec<(String, Vec<DeckPart>)>,
    default_deck: String,
    policy: MatchPolicy,
}

impl DeckMatcher {
    /// Prepare a matcher; deck names are split into parts once
    pub fn new(allowed: &[String], default_deck: impl Into<String>, policy: MatchPolicy) -> Self {
        let allowed = allowed
            .iter()
            .filter(|name| !name.trim().is_empty())
            .map(|name| (name.clone(), deck_parts(name, policy.min_word_len)))
            .collect();
        Self {
            allowed,
            default_deck: default_deck.into(),
            policy,
        }
    }

    /// Whether no allowed list was supplied
    pub fn is_unconstrained(&self) -> bool {
        self.allowed.is_empty()
    }

    fn is_allowed(&self, deck: &str) -> bool {
        self.allowed.iter().any(|(name, _)| name == deck)
    }

    /// Map a model-chosen deck onto the allowed list
    ///
    /// Exact member, then case-insensitive match, then an allowed name
    /// contained in `deck`, then the default deck if allowed, then the first
    /// allowed name. With no allowed list the deck is kept (or defaulted if blank).
    pub fn resolve(&self, deck: &str) -> String {
        let deck = deck.trim();
        if self.is_unconstrained() {
            return if deck.is_empty() {
                self.default_deck.clone()
            } else {
                deck.to_string()
            };
        }
        if self.is_allowed(deck) {
            return deck.to_string();
        }

        let lowered = deck.to_lowercase();
        if let Some((name, _)) = self
            .allowed
            .iter()
            .find(|(name, _)| name.to_lowercase() == lowered)
        {
            return name.clone();
        }
        if let Some((name, _)) = self
            .allowed
            .iter()
            .find(|(name, _)| deck.contains(name.as_str()))
        {
            return name.clone();
        }
        if self.is_allowed(&self.default_deck) {
            return self.default_deck.clone();
        }
        self.allowed
            .first()
            .map(|(name, _)| name.clone())
            .unwrap_or_else(|| self.default_deck.clone())
    }

    /// Score `deck` against lowercased card text
    pub fn score(&self, deck: &str, question: &str, answer: &str) -> f64 {
        score_deck(deck, question, answer, &self.policy)
    }

    /// Best-scoring allowed deck; the first deck wins ties
    pub fn best_match(&self, question: &str, answer: &str) -> Option<(String, f64)> {
        let mut best: Option<(&str, f64)> = None;
        for (name, parts) in &self.allowed {
            let score = score_parts(parts, question, answer, &self.policy);
            if best.map_or(true, |(_, top)| score > top) {
                best = Some((name.as_str(), score));
            }
        }
        best.map(|(name, score)| (name.to_string(), score))
    }

    /// Re-score a card and switch decks only on a strictly better, positive score
    pub fn rescore(&self, card: Card) -> ScoredCandidate {
        let question = card.question.to_lowercase();
        let answer = card.answer.to_lowercase();

        let current = self.score(&card.deck, &question, &answer);
        match self.best_match(&question, &answer) {
            Some((deck, best)) if best > 0.0 && best > current => {
                ScoredCandidate::new(Card { deck, ..card }, best)
            }
            _ => ScoredCandidate::new(card, current),
        }
    }
}

/// Render a field value as card text
fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items
            .iter()
            .map(|item| match item {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(" "),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map_or(true, |f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}

/// First truthy value under `lower` or its capitalized twin, as trimmed text
pub(crate) fn field_text(record: &Record, lower: &str, capitalized: &str) -> String {
    [lower, capitalized]
        .iter()
        .filter_map(|key| record.get(*key))
        .find(|value| is_truthy(value))
        .map(|value| value_text(value).trim().to_string())
        .unwrap_or_default()
}

/// Cleans raw records into cards and assigns decks
#[derive(Debug, Clone)]
pub struct CardFilter {
    matcher: DeckMatcher,
    vocabulary: YesNoVocabulary,
    filter_yes_no: bool,
    smart_match: bool,
}

impl CardFilter {
    /// Create a filter for the given allowed decks with default policy
    pub fn new(allowed_decks: &[String]) -> Self {
        Self {
            matcher: DeckMatcher::new(allowed_decks, DEFAULT_DECK, MatchPolicy::default()),
            vocabulary: YesNoVocabulary::default(),
            filter_yes_no: true,
            smart_match: true,
        }
    }

    /// Create a filter from a run configuration
    pub fn from_config(config: &crate::GenerationConfig, allowed_decks: &[String]) -> Self {
        Self {
            matcher: DeckMatcher::new(
                allowed_decks,
                config.default_deck.clone(),
                config.match_policy.clone(),
            ),
            vocabulary: config.yes_no.clone(),
            filter_yes_no: config.filter_yes_no,
            smart_match: config.smart_deck_match,
        }
    }

    /// Enable or disable yes/no filtering
    pub fn with_yes_no_filter(mut self, enabled: bool) -> Self {
        self.filter_yes_no = enabled;
        self
    }

    /// Enable or disable content-based deck matching
    pub fn with_smart_matching(mut self, enabled: bool) -> Self {
        self.smart_match = enabled;
        self
    }

    /// The deck matcher in use
    pub fn matcher(&self) -> &DeckMatcher {
        &self.matcher
    }

    /// Clean one record; `None` if it is unusable or filtered out
    fn clean(&self, record: &Record) -> Option<Card> {
        let question = field_text(record, "question", "Question");
        let answer = field_text(record, "answer", "Answer");
        if question.is_empty() || answer.is_empty() {
            return None;
        }
        if self.filter_yes_no && self.vocabulary.matches(&answer) {
            return None;
        }

        let deck = match record.get("deck") {
            Some(Value::String(deck)) => deck.clone(),
            _ => DEFAULT_DECK.to_string(),
        };
        let quote = record.get("quote").map(value_text).unwrap_or_default();

        Some(Card {
            question,
            answer,
            deck: self.matcher.resolve(&deck),
            quote,
        })
    }

    /// Process a batch of records
    pub fn process(&self, records: &[Record]) -> Vec<Card> {
        // Without an allowed list nothing is scored, so the vote alone groups the batch
        let score = self.smart_match && !self.matcher.is_unconstrained();

        let mut candidates: Vec<ScoredCandidate> = records
            .iter()
            .filter_map(|record| self.clean(record))
            .map(|card| {
                if score {
                    self.matcher.rescore(card)
                } else {
                    ScoredCandidate::new(card, 0.0)
                }
            })
            .collect();

        if self.smart_match && self.matcher.policy.majority_vote {
            apply_majority_vote(&mut candidates);
        }

        candidates.into_iter().map(|candidate| candidate.card).collect()
    }
}

/// Move zero-score cards to the batch's dominant deck
///
/// The dominant deck is the majority among confident cards, or among all
/// cards when none is confident.
pub fn apply_majority_vote(candidates: &mut [ScoredCandidate]) {
    let confident = majority_deck(
        candidates
            .iter()
            .filter(|c| c.is_confident())
            .map(|c| c.card.deck.as_str()),
    );
    let dominant = confident
        .or_else(|| majority_deck(candidates.iter().map(|c| c.card.deck.as_str())));

    if let Some(dominant) = dominant {
        for candidate in candidates.iter_mut().filter(|c| !c.is_confident()) {
            candidate.card.deck = dominant.clone();
        }
    }
}

/// Turn cards back into records, for a second filtering pass
pub fn cards_to_records(cards: &[Card]) -> Vec<Record> {
    cards
        .iter()
        .filter_map(|card| match serde_json::to_value(card) {
            Ok(Value::Object(map)) => Some(map),
            _ => None,
        })
        .collect()
}
