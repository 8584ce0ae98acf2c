//! Error types for the detection engine.
//!
//! All variants are construction-time failures. Runtime analyzer faults are
//! recovered locally and surface as `degraded = true` on the result, never
//! as an error from `detect`.

use thiserror::Error;

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors raised while building an engine from configuration.
///
/// # Security Notes
///
/// Construction is fail-fast: an engine with a partially loaded rule set
/// would silently under-detect, so any invalid rule or config reference
/// aborts creation.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A pattern rule failed to compile or exceeded its complexity budget.
    #[error("invalid pattern for {category}: '{pattern}': {reason}")]
    InvalidPattern {
        /// Category the rule belongs to.
        category: String,
        /// The offending pattern source.
        pattern: String,
        /// Compiler error or budget violation.
        reason: String,
    },

    /// Configuration referenced a category outside the closed set.
    #[error("unknown attack category: '{0}'")]
    UnknownCategory(String),

    /// A category weight was outside `[0, 1]`.
    #[error("invalid weight {weight} for {category}: must be within [0, 1]")]
    InvalidWeight {
        /// Category with the bad weight.
        category: String,
        /// The rejected value.
        weight: f64,
    },

    /// Threat-level breakpoints were not strictly increasing within (0, 100].
    #[error("invalid breakpoints {0:?}: must be strictly increasing within (0, 100]")]
    InvalidBreakpoints([f64; 4]),

    /// The expected-length distribution had a non-positive std deviation.
    #[error("invalid length distribution: std must be positive, got {0}")]
    InvalidLengthStd(f64),
}
