//! Error types for sorb-git.

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during git operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Not inside a git repository.
    #[error("not a git repository")]
    NotARepository,

    /// Repository has no working directory.
    #[error("cannot operate on a bare repository")]
    BareRepository,

    /// HEAD is detached (not on a branch).
    #[error("HEAD is detached - checkout a branch first")]
    DetachedHead,

    /// A unified diff could not be parsed.
    #[error("failed to parse diff at line {line}: {message}")]
    DiffParse {
        /// 1-indexed line in the diff text.
        line: usize,
        /// What was wrong with it.
        message: String,
    },

    /// A git subprocess exited non-zero.
    #[error("`git {command}` failed: {stderr}")]
    Command {
        /// The git arguments that were run.
        command: String,
        /// Standard error of the failed process, verbatim.
        stderr: String,
    },

    /// A fixup was requested with nothing to apply.
    #[error("no hunks to apply")]
    NoHunks,

    /// Commit message was empty.
    #[error("commit message cannot be empty")]
    EmptyCommitMessage,

    /// IO error (spawning git, touching the working tree).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Underlying git2 error.
    #[error("git error: {0}")]
    Git2(#[from] git2::Error),
}
