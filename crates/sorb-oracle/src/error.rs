//! Error types for sorb-oracle.

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while asking the oracle for assignments.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The request carried no hunks.
    #[error("nothing to analyze")]
    NothingToAnalyze,

    /// The oracle answered with nothing.
    #[error("oracle returned an empty response")]
    EmptyResponse,

    /// The reply held no usable JSON.
    #[error("failed to parse oracle response: {0}")]
    Parse(String),

    /// The backend process or service failed.
    #[error("oracle backend failed: {0}")]
    Backend(String),

    /// The backend didn't answer in time.
    #[error("oracle timed out after {0}s")]
    Timeout(u64),

    /// The HTTP endpoint rejected the API key.
    #[error("oracle authentication failed - check the API key")]
    AuthenticationFailed,

    /// The HTTP endpoint is rate limiting us.
    #[error("oracle rate limit exceeded - wait and try again")]
    RateLimited,

    /// HTTP error with status code.
    #[error("oracle API error ({status}): {message}")]
    ApiError {
        /// HTTP status.
        status: u16,
        /// Response body.
        message: String,
    },

    /// Network error.
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// IO error talking to a backend process.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
