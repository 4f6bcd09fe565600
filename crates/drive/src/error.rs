//! Error types for remote document store calls

/// Errors from Google Drive API calls, classified by what the caller can do
/// about them: an expired token means re-authenticate or refresh, a missing
/// file is the caller's reference going stale, anything else is Drive's
/// problem.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("Drive rejected the access token")]
    AccessExpired,

    #[error("file not found: {0}")]
    NotFound(String),

    #[error("Drive returned {status}: {body}")]
    Upstream { status: u16, body: String },

    #[error("invalid Drive response: {0}")]
    Decode(String),
}

/// Result alias for Drive operations.
pub type Result<T> = std::result::Result<T, Error>;
