//! Bearer-token introspection via Google's tokeninfo endpoint
//!
//! The session resolver uses this to validate a presented bearer token and
//! check that it carries the drive-file scope. Google's tokeninfo response
//! encodes numbers as JSON strings (`"expires_in": "3519"`), so the parser
//! accepts both forms.

use serde::{Deserialize, Deserializer};
use tracing::debug;

use crate::error::{Error, Result};
use crate::oauth::GoogleOAuth;

/// Introspection result for a live access token.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenInfo {
    /// Space-separated scopes the token carries
    #[serde(default)]
    pub scope: String,
    /// Seconds until the token expires
    #[serde(deserialize_with = "u64_lenient")]
    pub expires_in: u64,
    #[serde(default)]
    pub email: Option<String>,
}

impl TokenInfo {
    /// Whether the token carries the named scope.
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scope.split_whitespace().any(|s| s == scope)
    }
}

impl GoogleOAuth {
    /// Validate an access token and report its scopes and remaining life.
    ///
    /// Any non-success status means the token is expired, revoked, or
    /// malformed; tokeninfo does not distinguish further.
    pub async fn token_info(&self, access_token: &str) -> Result<TokenInfo> {
        let response = self
            .http
            .post(&self.tokeninfo_endpoint)
            .form(&[("access_token", access_token)])
            .send()
            .await
            .map_err(|e| Error::Http(format!("tokeninfo request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            debug!(status = %status, "tokeninfo rejected bearer token");
            return Err(Error::Introspection(format!(
                "tokeninfo returned {status}: {body}"
            )));
        }

        response
            .json::<TokenInfo>()
            .await
            .map_err(|e| Error::Introspection(format!("invalid tokeninfo response: {e}")))
    }
}

/// Accept a u64 encoded either as a JSON number or a decimal string.
fn u64_lenient<'de, D>(deserializer: D) -> std::result::Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Num(u64),
        Str(String),
    }

    match Raw::deserialize(deserializer)? {
        Raw::Num(n) => Ok(n),
        Raw::Str(s) => s.parse().map_err(serde::de::Error::custom),
    }
}
