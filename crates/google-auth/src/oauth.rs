//! Authorization-code exchange and token refresh against Google's endpoints
//!
//! Both operations POST form-encoded bodies to the token endpoint with
//! different grant types. The endpoints default to Google's public URLs and
//! can be overridden per instance, which is how the service points a test
//! configuration at a local provider.

use common::Secret;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::constants::{
    AUTHORIZE_ENDPOINT, SCOPES, TOKEN_ENDPOINT, TOKENINFO_ENDPOINT, USERINFO_ENDPOINT,
};
use crate::error::{Error, Result};

/// Response from the token endpoint for both exchange and refresh.
///
/// `expires_in` is a delta in seconds from the response time. Google returns
/// `refresh_token` only when one is (re)issued (reliably on forced-consent
/// exchange, never on refresh), so it is optional here.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// Seconds until the access token expires (delta, not absolute)
    pub expires_in: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Identity-provider client: consent-URL building, code exchange, refresh,
/// introspection, and profile fetch, bound to one OAuth client registration.
#[derive(Clone)]
pub struct GoogleOAuth {
    pub(crate) http: reqwest::Client,
    client_id: String,
    client_secret: Secret<String>,
    redirect_uri: String,
    authorize_endpoint: String,
    token_endpoint: String,
    pub(crate) tokeninfo_endpoint: String,
    pub(crate) userinfo_endpoint: String,
}

impl GoogleOAuth {
    /// Build a client for the given OAuth registration with Google's
    /// production endpoints.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: Secret<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            http: reqwest::Client::new(),
            client_id: client_id.into(),
            client_secret,
            redirect_uri: redirect_uri.into(),
            authorize_endpoint: AUTHORIZE_ENDPOINT.into(),
            token_endpoint: TOKEN_ENDPOINT.into(),
            tokeninfo_endpoint: TOKENINFO_ENDPOINT.into(),
            userinfo_endpoint: USERINFO_ENDPOINT.into(),
        }
    }

    /// Override the authorization endpoint (tests, alternate deployments).
    #[must_use]
    pub fn with_authorize_endpoint(mut self, url: impl Into<String>) -> Self {
        self.authorize_endpoint = url.into();
        self
    }

    /// Override the token endpoint.
    #[must_use]
    pub fn with_token_endpoint(mut self, url: impl Into<String>) -> Self {
        self.token_endpoint = url.into();
        self
    }

    /// Override the introspection endpoint.
    #[must_use]
    pub fn with_tokeninfo_endpoint(mut self, url: impl Into<String>) -> Self {
        self.tokeninfo_endpoint = url.into();
        self
    }

    /// Override the userinfo endpoint.
    #[must_use]
    pub fn with_userinfo_endpoint(mut self, url: impl Into<String>) -> Self {
        self.userinfo_endpoint = url.into();
        self
    }

    /// Build the consent-screen URL.
    ///
    /// Requests `access_type=offline` so a refresh token is issued, and
    /// `prompt=consent` so Google re-issues one even for a returning user
    /// (without it, only the first consent ever returns a refresh token).
    pub fn authorization_url(&self, state: &str, challenge: &str) -> String {
        format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&access_type=offline&prompt=consent&state={}&code_challenge={}&code_challenge_method=S256",
            self.authorize_endpoint,
            urlencoded(&self.client_id),
            urlencoded(&self.redirect_uri),
            urlencoded(SCOPES),
            state,
            challenge,
        )
    }

    /// Exchange an authorization code for tokens (consent-flow completion).
    ///
    /// Sends the code together with the PKCE verifier that produced the
    /// challenge embedded in the authorization URL.
    pub async fn exchange_code(&self, code: &str, verifier: &str) -> Result<TokenResponse> {
        let response = self
            .http
            .post(&self.token_endpoint)
            .form(&[
                ("grant_type", "authorization_code"),
                ("code", code),
                ("code_verifier", verifier),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::Http(format!("token exchange request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));
            debug!(status = %status, "authorization code rejected");
            return Err(Error::TokenExchange(format!(
                "token endpoint returned {status}: {body}"
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| Error::TokenExchange(format!("invalid token response: {e}")))
    }

    /// Refresh an access token using a refresh token.
    ///
    /// Google reports a revoked or invalid refresh token as `400
    /// invalid_grant` rather than 401, so all of 400/401/403 classify as
    /// rejected credentials; anything else non-success is a provider fault.
    pub async fn refresh_token(&self, refresh: &str) -> Result<TokenResponse> {
        let response = self
            .http
            .post(&self.token_endpoint)
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", refresh),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::Http(format!("token refresh request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<no body>"));

            if matches!(status.as_u16(), 400 | 401 | 403) {
                debug!(status = %status, "refresh token rejected");
                return Err(Error::InvalidCredentials(format!(
                    "refresh token rejected ({status}): {body}"
                )));
            }

            return Err(Error::TokenExchange(format!(
                "token refresh returned {status}: {body}"
            )));
        }

        response
            .json::<TokenResponse>()
            .await
            .map_err(|e| Error::TokenExchange(format!("invalid refresh response: {e}")))
    }
}

/// Minimal URL encoding for parameter values.
/// Only encodes characters that would break URL parameter parsing.
fn urlencoded(s: &str) -> String {
    s.replace(' ', "%20")
        .replace(':', "%3A")
        .replace('/', "%2F")
}
