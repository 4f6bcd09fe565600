//! Service error taxonomy and HTTP response mapping
//!
//! Every error that reaches a client is rendered as a JSON envelope:
//! `{"error": {"type", "message", "request_id"}}`. The request_id is minted
//! here and included in the log line so a client report can be matched to
//! server logs.

use axum::http::{StatusCode, header::CONTENT_TYPE};
use axum::response::{IntoResponse, Response};
use google_auth::DRIVE_FILE_SCOPE;
use serde_json::json;
use uuid::Uuid;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// No usable credential on the request (no cookie, no bearer token)
    #[error("authentication required")]
    Unauthenticated,

    /// A credential was presented but Google rejected it
    #[error("invalid or expired token: {0}")]
    InvalidToken(String),

    /// The token is valid but was not granted the scope this API needs
    #[error("token is missing required scope: {required}")]
    InsufficientScope { required: &'static str },

    /// The request body failed validation
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    NotFound(String),

    /// Drive rejected our stored credential mid-request
    #[error("Your Google Drive access has expired. Please log in again.")]
    AuthExpired,

    /// An upstream call failed for reasons other than auth
    #[error("upstream request failed: {0}")]
    Remote(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn status(&self) -> StatusCode {
        match self {
            Error::Unauthenticated | Error::InvalidToken(_) | Error::AuthExpired => {
                StatusCode::UNAUTHORIZED
            }
            Error::InsufficientScope { .. } => StatusCode::FORBIDDEN,
            Error::Validation(_) => StatusCode::BAD_REQUEST,
            Error::NotFound(_) => StatusCode::NOT_FOUND,
            Error::Remote(_) => StatusCode::BAD_GATEWAY,
            Error::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn error_type(&self) -> &'static str {
        match self {
            Error::Unauthenticated => "unauthenticated",
            Error::InvalidToken(_) => "invalid_token",
            Error::InsufficientScope { .. } => "insufficient_scope",
            Error::Validation(_) => "validation_error",
            Error::NotFound(_) => "not_found",
            Error::AuthExpired => "auth_expired",
            Error::Remote(_) => "remote_error",
            Error::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let request_id = format!("req_{}", Uuid::new_v4().as_simple());
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(
                request_id = %request_id,
                status = status.as_u16(),
                error = %self,
                "request failed"
            );
        } else {
            tracing::warn!(
                request_id = %request_id,
                status = status.as_u16(),
                error = %self,
                "request rejected"
            );
        }

        match &self {
            Error::Remote(_) | Error::AuthExpired => {
                crate::metrics::record_upstream_error(self.error_type());
            }
            _ => {}
        }

        let mut body = json!({
            "error": {
                "type": self.error_type(),
                "message": self.to_string(),
                "request_id": request_id,
            }
        });
        if let Error::InsufficientScope { required } = &self {
            body["error"]["required_scope"] = json!(required);
        }

        (
            status,
            [(CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}

impl From<drive::Error> for Error {
    fn from(err: drive::Error) -> Self {
        match err {
            drive::Error::AccessExpired => Error::AuthExpired,
            drive::Error::NotFound(context) => Error::NotFound(format!("file not found: {context}")),
            drive::Error::Http(message) | drive::Error::Decode(message) => Error::Remote(message),
            drive::Error::Upstream { status, body } => {
                Error::Remote(format!("Drive returned {status}: {body}"))
            }
        }
    }
}

/// Convenience for handlers that need the scope-check rejection.
pub fn insufficient_scope() -> Error {
    Error::InsufficientScope {
        required: DRIVE_FILE_SCOPE,
    }
}
