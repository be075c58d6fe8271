//! Gatekeeper configuration

use serde::{Deserialize, Serialize};

/// Configuration for card acceptance rules
///
/// Lengths are measured in characters after trimming.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Shortest acceptable question
    pub min_question_len: usize,

    /// Shortest acceptable answer
    pub min_answer_len: usize,

    /// Longest acceptable question
    pub max_question_len: usize,

    /// Longest acceptable answer
    pub max_answer_len: usize,

    /// Reject cards whose question and answer match case-insensitively
    pub reject_identical: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            min_question_len: 10,
            min_answer_len: 3,
            max_question_len: 500,
            max_answer_len: 1000,
            reject_identical: true,
        }
    }
}

impl ValidationConfig {
    /// Create a permissive configuration (only empty fields are rejected)
    pub fn permissive() -> Self {
        Self {
            min_question_len: 1,
            min_answer_len: 1,
            max_question_len: usize::MAX,
            max_answer_len: usize::MAX,
            reject_identical: false,
        }
    }

    /// Create a strict configuration (tighter length bounds)
    pub fn strict() -> Self {
        Self {
            min_question_len: 15,
            min_answer_len: 5,
            max_question_len: 300,
            max_answer_len: 600,
            reject_identical: true,
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.min_question_len > self.max_question_len {
            return Err("min_question_len must not exceed max_question_len".to_string());
        }
        if self.min_answer_len > self.max_answer_len {
            return Err("min_answer_len must not exceed max_answer_len".to_string());
        }
        Ok(())
    }
}

/// Ceilings enforced before any model call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourceLimits {
    /// Largest source file accepted, in megabytes
    pub max_file_size_mb: u64,

    /// Most chunks a single run may produce
    pub max_chunks: usize,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_file_size_mb: 50,
            max_chunks: 500,
        }
    }
}

impl ResourceLimits {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.max_file_size_mb == 0 {
            return Err("max_file_size_mb must be > 0".to_string());
        }
        if self.max_chunks == 0 {
            return Err("max_chunks must be > 0".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ValidationConfig::default();
        assert_eq!(config.min_question_len, 10);
        assert_eq!(config.min_answer_len, 3);
        assert_eq!(config.max_question_len, 500);
        assert_eq!(config.max_answer_len, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_permissive_config() {
        let config = ValidationConfig::permissive();
        assert!(!config.reject_identical);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_strict_config() {
        let config = ValidationConfig::strict();
        assert_eq!(config.max_question_len, 300);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_inverted_bounds_rejected() {
        let config = ValidationConfig {
            min_question_len: 600,
            ..ValidationConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_limits() {
        let limits = ResourceLimits::default();
        assert_eq!(limits.max_file_size_mb, 50);
        assert_eq!(limits.max_chunks, 500);
        assert!(limits.validate().is_ok());
        assert!(ResourceLimits { max_chunks: 0, ..limits }.validate().is_err());
    }
}
