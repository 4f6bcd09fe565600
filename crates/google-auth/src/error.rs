//! Error types for identity-provider operations

/// Errors from OAuth exchange, refresh, introspection, and profile fetch.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("token introspection failed: {0}")]
    Introspection(String),

    #[error("profile fetch failed: {0}")]
    Profile(String),
}

/// Result alias for identity-provider operations.
pub type Result<T> = std::result::Result<T, Error>;
