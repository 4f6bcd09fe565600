//! Userinfo profile fetch after consent
//!
//! The callback handler exchanges the code, then asks the userinfo endpoint
//! who consented. The resulting identity is read-only; it seeds the session
//! and is never written back to the provider.

use serde::Deserialize;
use tracing::debug;

use crate::error::{Error, Result};
use crate::oauth::GoogleOAuth;

/// OpenID Connect profile for the consenting user.
#[derive(Debug, Clone, Deserialize)]
pub struct Profile {
    /// Stable Google account identifier
    #[serde(rename = "sub")]
    pub id: String,
    /// Display name; absent for accounts with no public name
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

impl GoogleOAuth {
    /// Fetch the profile for a freshly issued access token.
    pub async fn fetch_profile(&self, access_token: &str) -> Result<Profile> {
        let response = self
            .http
            .get(&self.userinfo_endpoint)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(|e| Error::Http(format!("userinfo request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            debug!(status = %status, "userinfo rejected access token");
            return Err(Error::Profile(format!(
                "userinfo returned {status}: {body}"
            )));
        }

        response
            .json::<Profile>()
            .await
            .map_err(|e| Error::Profile(format!("invalid userinfo response: {e}")))
    }
}
