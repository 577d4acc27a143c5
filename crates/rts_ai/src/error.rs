//! Error types for loading AI configuration and game rules.
//!
//! Decision making itself never fails; these errors only surface while a host
//! is reading tunables or static data from disk.

use thiserror::Error;

/// Result type alias using [`AiError`].
pub type Result<T> = std::result::Result<T, AiError>;

/// Top-level error type for the AI crate.
#[derive(Debug, Error)]
pub enum AiError {
    /// Configuration file could not be found.
    #[error("AI config not found: {0}")]
    ConfigNotFound(String),

    /// Rules file could not be found.
    #[error("Rules table not found: {0}")]
    RulesNotFound(String),

    /// Data file parsing error.
    #[error("Failed to parse data file '{path}': {message}")]
    Parse {
        /// Path to the file that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// Underlying IO failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration values contradict each other.
    #[error("Invalid AI config: {0}")]
    InvalidConfig(String),

    /// Difficulty name did not match any tier.
    #[error("Unknown difficulty: {0}")]
    UnknownDifficulty(String),
}
