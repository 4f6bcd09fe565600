//! Error types for the letter API client

/// Errors surfaced to callers of the client.
///
/// `Unauthenticated` and `RefreshRejected` both leave the token store
/// cleared; the caller's only recovery is a new login. `Api` carries the
/// backend's status and message unchanged; the refresh coordinator is the
/// only place an error is recovered instead of surfaced.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("not authenticated: no stored credentials")]
    Unauthenticated,

    #[error("token refresh rejected: {0}")]
    RefreshRejected(String),

    #[error("API returned {status}: {message}")]
    Api { status: u16, message: String },

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("I/O error: {0}")]
    Io(String),

    #[error("parse error: {0}")]
    Parse(String),
}

/// Result alias for client operations.
pub type Result<T> = std::result::Result<T, Error>;
