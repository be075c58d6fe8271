//! Card validation logic

use crate::ValidationConfig;
use cardwright_domain::Card;
use std::fmt;

/// Why a card was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    /// Question or answer is blank
    Empty,

    /// Question is shorter than the configured minimum
    QuestionTooShort {
        /// Configured minimum
        min: usize,
    },

    /// Answer is shorter than the configured minimum
    AnswerTooShort {
        /// Configured minimum
        min: usize,
    },

    /// Question or answer exceeds its maximum
    TooLong,

    /// Question and answer are the same text
    Identical,
}

impl fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RejectionReason::Empty => write!(f, "Empty Question or Answer"),
            RejectionReason::QuestionTooShort { min } => write!(f, "Question too short (<{})", min),
            RejectionReason::AnswerTooShort { min } => write!(f, "Answer too short (<{})", min),
            RejectionReason::TooLong => write!(f, "Content exceeds max length"),
            RejectionReason::Identical => write!(f, "Question and Answer are identical"),
        }
    }
}

/// Verdict for one card; never stored on the card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationResult {
    /// Whether the card passed
    pub valid: bool,

    /// First rule the card broke, if any
    pub reason: Option<RejectionReason>,
}

impl ValidationResult {
    fn accepted() -> Self {
        Self {
            valid: true,
            reason: None,
        }
    }

    fn rejected(reason: RejectionReason) -> Self {
        Self {
            valid: false,
            reason: Some(reason),
        }
    }

    /// Human-readable reason; empty for accepted cards
    pub fn reason_text(&self) -> String {
        self.reason
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default()
    }
}

/// Applies per-card acceptance rules
#[derive(Debug, Clone, Default)]
pub struct CardValidator {
    config: ValidationConfig,
}

impl CardValidator {
    /// Create a validator with the given configuration
    pub fn new(config: ValidationConfig) -> Self {
        Self { config }
    }

    /// The active configuration
    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Check a card against the rules, in order, stopping at the first failure
    pub fn validate(&self, card: &Card) -> ValidationResult {
        let question = card.question.trim();
        let answer = card.answer.trim();

        if question.is_empty() || answer.is_empty() {
            return ValidationResult::rejected(RejectionReason::Empty);
        }

        let question_len = question.chars().count();
        let answer_len = answer.chars().count();

        if question_len < self.config.min_question_len {
            return ValidationResult::rejected(RejectionReason::QuestionTooShort {
                min: self.config.min_question_len,
            });
        }
        if answer_len < self.config.min_answer_len {
            return ValidationResult::rejected(RejectionReason::AnswerTooShort {
                min: self.config.min_answer_len,
            });
        }
        if question_len > self.config.max_question_len || answer_len > self.config.max_answer_len {
            return ValidationResult::rejected(RejectionReason::TooLong);
        }
        if self.config.reject_identical && question.to_lowercase() == answer.to_lowercase() {
            return ValidationResult::rejected(RejectionReason::Identical);
        }

        ValidationResult::accepted()
    }
}
