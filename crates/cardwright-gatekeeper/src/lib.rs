//! Cardwright Gatekeeper
//!
//! Acceptance rules for generated cards and pre-flight resource ceilings.
//!
//! The Gatekeeper provides:
//! - Card validation (non-empty fields, length bounds, question differs from answer)
//! - File size ceiling checked before a document is read
//! - Chunk count ceiling checked before any model call
//!
//! # Examples
//!
//! ```
//! use cardwright_domain::Card;
//! use cardwright_gatekeeper::{CardValidator, ValidationConfig};
//!
//! let validator = CardValidator::new(ValidationConfig::default());
//! let result = validator.validate(&Card::new("What does ATP stand for?", "Adenosine triphosphate", "Biology"));
//! assert!(result.valid);
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod guard;
mod validator;

pub use config::{ResourceLimits, ValidationConfig};
pub use error::GatekeeperError;
pub use guard::ResourceGuard;
pub use validator::{CardValidator, RejectionReason, ValidationResult};
