//! Error types for sorb-core.

use std::path::PathBuf;

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in sorb-core operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No absorb record to undo.
    #[error("no absorb operation to undo")]
    NothingToUndo,

    /// Alternative index outside the current assignment's list.
    #[error("invalid alternative {index} (expected 0..={available})")]
    InvalidAlternative {
        /// The requested index.
        index: usize,
        /// Number of alternatives available.
        available: usize,
    },

    /// The review was already accepted or cancelled.
    #[error("review is already finished")]
    ReviewFinished,

    /// Configuration value out of range or unknown.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// State file parsing error.
    #[error("failed to parse {file}: {message}")]
    StateParseError {
        /// The file that failed to parse.
        file: PathBuf,
        /// What was wrong with it.
        message: String,
    },

    /// IO error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error.
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Git operation error.
    #[error(transparent)]
    Git(#[from] sorb_git::Error),

    /// Oracle error.
    #[error(transparent)]
    Oracle(#[from] sorb_oracle::Error),
}
