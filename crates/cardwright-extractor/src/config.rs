//! Configuration for the generation pipeline

use crate::filter::{MatchPolicy, YesNoVocabulary};
use cardwright_domain::DEFAULT_DECK;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Tokens held back from the context window for the system prompt and the reply
pub const RESERVED_TOKENS: u32 = 2500;

/// Smallest input budget, in tokens, regardless of context window
pub const MIN_INPUT_TOKENS: u32 = 1000;

/// Characters assumed per token when sizing chunks
pub const CHARS_PER_TOKEN: f64 = 1.2;

/// Characters assumed per token when estimating prompt size
pub const PROMPT_CHARS_PER_TOKEN: f64 = 2.5;

/// Token cap requested when none is configured
pub const DEFAULT_REPLY_TOKENS: u32 = 4000;

/// Lowest token cap ever requested
pub const MIN_REPLY_TOKENS: u32 = 500;

/// Token cap for refinement calls
pub const REFINEMENT_MAX_TOKENS: u32 = 4000;

/// How many cards to ask the model for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CardDensity {
    /// Only the big-picture concepts
    Low,
    /// Key concepts and important details
    #[default]
    Medium,
    /// Every distinct fact, one card each
    High,
}

impl CardDensity {
    /// Multiplier applied to the chunk budget
    ///
    /// Denser settings use smaller chunks so the model attends to detail.
    pub fn chunk_factor(self) -> f64 {
        match self {
            CardDensity::Low => 1.0,
            CardDensity::Medium => 0.8,
            CardDensity::High => 0.25,
        }
    }

    /// Instruction placed in the system prompt
    pub fn instruction(self) -> &'static str {
        match self {
            CardDensity::Low => {
                "Cover only the central, big-picture concepts. Produce fewer cards of \
                 higher quality and skip minor details."
            }
            CardDensity::Medium => {
                "Produce a balanced set covering the key concepts and the important \
                 details. Keep questions distinct and answers explanatory."
            }
            CardDensity::High => {
                "EXHAUSTIVE MODE. Produce as many valid cards as the text supports. \
                 Turn every distinct fact, definition, mechanism and detail into its own \
                 atomic card; a list of five items becomes five cards. Do not summarize, \
                 do not repeat yourself, and stop once every unique fact is covered."
            }
        }
    }
}

impl fmt::Display for CardDensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            CardDensity::Low => "Low",
            CardDensity::Medium => "Medium",
            CardDensity::High => "High",
        };
        f.write_str(label)
    }
}

impl FromStr for CardDensity {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(CardDensity::Low),
            "medium" => Ok(CardDensity::Medium),
            "high" => Ok(CardDensity::High),
            other => Err(format!("unknown density '{}' (expected low, medium or high)", other)),
        }
    }
}

/// Configuration for a generation run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Language the cards are written in
    pub target_language: String,

    /// How many cards to ask for
    pub card_density: CardDensity,

    /// Free-form tone/focus instructions from the user
    pub prompt_style: String,

    /// Model context window, in tokens
    pub context_window: u32,

    /// Fixed token cap; `None` derives one per chunk
    pub max_tokens: Option<u32>,

    /// Sampling temperature
    pub temperature: f32,

    /// Requested parallel chunk workers
    pub concurrency: usize,

    /// Chunks shorter than this are merged into their successor
    pub min_chunk_chars: usize,

    /// Drop cards answered by a bare yes/no
    pub filter_yes_no: bool,

    /// Tell the model to skip biographical trivia
    pub exclude_trivia: bool,

    /// Score card content against the allowed decks
    pub smart_deck_match: bool,

    /// Run a second model pass over each chunk's cards
    pub ai_refinement: bool,

    /// Single worker and seeded shuffling for repeatable output
    pub deterministic_mode: bool,

    /// Seed used in deterministic mode
    pub seed: u64,

    /// Fallback deck when nothing else resolves
    pub default_deck: String,

    /// Directory for the JSON Lines failure logs
    pub log_dir: PathBuf,

    /// Deck scoring weights
    pub match_policy: MatchPolicy,

    /// Answers treated as bare yes/no
    pub yes_no: YesNoVocabulary,
}

impl Default for GenerationConfig {
    /// Default configuration with balanced settings
    fn default() -> Self {
        Self {
            target_language: "English".to_string(),
            card_density: CardDensity::Medium,
            prompt_style: String::new(),
            context_window: 4096,
            max_tokens: None,
            temperature: 0.7,
            concurrency: 1,
            min_chunk_chars: 100,
            filter_yes_no: true,
            exclude_trivia: true,
            smart_deck_match: true,
            ai_refinement: false,
            deterministic_mode: false,
            seed: 42,
            default_deck: DEFAULT_DECK.to_string(),
            log_dir: PathBuf::from("."),
            match_policy: MatchPolicy::default(),
            yes_no: YesNoVocabulary::default(),
        }
    }
}

impl GenerationConfig {
    /// Deterministic preset: one worker, seeded shuffling
    pub fn deterministic() -> Self {
        Self {
            deterministic_mode: true,
            concurrency: 1,
            ..Self::default()
        }
    }

    /// Exhaustive preset: high density with a refinement pass
    pub fn exhaustive() -> Self {
        Self {
            card_density: CardDensity::High,
            ai_refinement: true,
            ..Self::default()
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.target_language.trim().is_empty() {
            return Err("target_language must not be empty".to_string());
        }
        if self.context_window == 0 {
            return Err("context_window must be greater than 0".to_string());
        }
        if self.concurrency == 0 {
            return Err("concurrency must be greater than 0".to_string());
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err("temperature must be within 0.0..=2.0".to_string());
        }
        if self.default_deck.trim().is_empty() {
            return Err("default_deck must not be empty".to_string());
        }
        self.match_policy.validate()?;
        Ok(())
    }

    /// Chunk budget in characters
    ///
    /// `max(context_window - 2500, 1000)` tokens at 1.2 characters per token,
    /// scaled by the density factor.
    pub fn chunk_char_budget(&self) -> usize {
        let available = self
            .context_window
            .saturating_sub(RESERVED_TOKENS)
            .max(MIN_INPUT_TOKENS);
        let budget = available as f64 * CHARS_PER_TOKEN * self.card_density.chunk_factor();
        (budget as usize).max(1)
    }

    /// Token cap for a generation request built from these prompts
    ///
    /// A configured cap wins. Otherwise request 4000, shrink it so the estimated
    /// prompt plus reply fits the context window, and never go below 500.
    pub fn resolve_max_tokens(&self, system_prompt: &str, user_prompt: &str) -> u32 {
        if let Some(tokens) = self.max_tokens.filter(|tokens| *tokens > 0) {
            return tokens;
        }

        let prompt_chars = system_prompt.chars().count() + user_prompt.chars().count();
        let estimated = prompt_chars as f64 / PROMPT_CHARS_PER_TOKEN;
        let window = self.context_window as f64;

        let mut requested = DEFAULT_REPLY_TOKENS as f64;
        if estimated + requested > window {
            requested = (window - estimated - 100.0).trunc();
        }
        if requested < MIN_REPLY_TOKENS as f64 {
            requested = MIN_REPLY_TOKENS as f64;
        }
        requested as u32
    }

    /// Worker count actually used: clamped to the available cores, 1 in deterministic mode
    pub fn effective_concurrency(&self) -> usize {
        if self.deterministic_mode {
            return 1;
        }
        let cores = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        self.concurrency.clamp(1, cores)
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }
}
