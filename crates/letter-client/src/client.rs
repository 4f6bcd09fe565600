//! Letter API client with transparent token refresh
//!
//! The consumer-side half of authentication. Every Drive-backed call goes
//! through `request_with_refresh`: attach the stored access token, and on a
//! 401 exchange the refresh token for a new access token and re-issue the
//! original call exactly once. A second 401 (or any retry failure) is
//! returned as-is; there are no retry storms. A rejected refresh clears the
//! store, so the next call starts from `Unauthenticated` and the caller
//! knows to send the user back through login.

use std::sync::Arc;

use reqwest::{Method, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::store::TokenStore;

/// Response to a successful save or update.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResponse {
    pub file_id: String,
    pub file_name: String,
    #[serde(default)]
    pub web_view_link: Option<String>,
}

/// One entry in the letter list.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LetterEntry {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub mime_type: Option<String>,
    #[serde(default)]
    pub web_view_link: Option<String>,
    #[serde(default)]
    pub created_time: Option<String>,
    #[serde(default)]
    pub modified_time: Option<String>,
}

/// A letter's name and full plain-text content.
#[derive(Debug, Clone, Deserialize)]
pub struct LetterContent {
    pub name: String,
    pub content: String,
}

/// Result of bearer-token verification.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenStatus {
    pub valid: bool,
    pub expires_in: u64,
}

/// Whoami response from the session-backed status endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthStatus {
    pub authenticated: bool,
    #[serde(default)]
    pub user: Option<UserInfo>,
}

/// Identity fields as the API reports them.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserInfo {
    pub id: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
    #[allow(dead_code)]
    expires_in: u64,
}

/// Client for the letter API, bound to one token store.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    store: Arc<TokenStore>,
}

impl ApiClient {
    /// Client against the API at `base_url` (no trailing slash), using
    /// `store` for the durable credential pair.
    pub fn new(base_url: impl Into<String>, store: Arc<TokenStore>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            store,
        }
    }

    /// URL that starts the consent flow; callers open this in a browser.
    pub fn login_url(&self) -> String {
        format!("{}/api/auth/google", self.base_url)
    }

    /// Capture tokens delivered on the post-login redirect URL.
    ///
    /// If the URL carries `accessToken` (and optionally `refreshToken`)
    /// query parameters, both move into the durable store and the returned
    /// URL is the path with the credential parameters stripped; the
    /// visible address must not retain tokens. Returns `None` when the URL
    /// carries no tokens.
    pub async fn capture_redirect(&self, url: &str) -> Result<Option<String>> {
        let Some((path, query)) = url.split_once('?') else {
            return Ok(None);
        };

        let mut access = None;
        let mut refresh = None;
        for pair in query.split('&') {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            // An empty value is no credential.
            match key {
                "accessToken" => access = Some(percent_decode(value)).filter(|v| !v.is_empty()),
                "refreshToken" => refresh = Some(percent_decode(value)).filter(|v| !v.is_empty()),
                _ => {}
            }
        }

        let Some(access) = access else {
            return Ok(None);
        };
        self.store.set_pair(access, refresh).await?;
        debug!("captured tokens from redirect URL");
        Ok(Some(path.to_string()))
    }

    /// Session-backed auth status (no bearer token involved).
    pub async fn auth_status(&self) -> Result<AuthStatus> {
        let response = self
            .http
            .get(format!("{}/api/auth/status", self.base_url))
            .send()
            .await
            .map_err(|e| Error::Http(format!("status request failed: {e}")))?;
        decode(response).await
    }

    /// Verify the stored access token via the API's introspection endpoint.
    pub async fn verify_token(&self) -> Result<TokenStatus> {
        let token = self
            .store
            .access_token()
            .await
            .ok_or(Error::Unauthenticated)?;
        let response = self
            .http
            .get(format!("{}/api/auth/verify-token", self.base_url))
            .bearer_auth(&token)
            .send()
            .await
            .map_err(|e| Error::Http(format!("verify request failed: {e}")))?;
        decode(response).await
    }

    /// Exchange the stored refresh token for a new access token.
    ///
    /// Any failure clears both stored tokens: a refresh that cannot succeed
    /// means the session is over and the user must log in again. With no
    /// stored refresh token the store is cleared and no request is made.
    pub async fn refresh(&self) -> Result<String> {
        let Some(refresh) = self.store.refresh_token().await else {
            self.store.clear().await?;
            return Err(Error::Unauthenticated);
        };

        let sent = self
            .http
            .post(format!("{}/api/auth/refresh-token", self.base_url))
            .json(&serde_json::json!({ "refreshToken": refresh }))
            .send()
            .await;

        let response = match sent {
            Ok(response) => response,
            Err(e) => {
                self.store.clear().await?;
                return Err(Error::Http(format!("refresh request failed: {e}")));
            }
        };

        let status = response.status();
        if !status.is_success() {
            let message = error_message(response).await;
            self.store.clear().await?;
            warn!(status = %status, "token refresh rejected, cleared stored tokens");
            return Err(Error::RefreshRejected(message));
        }

        let body: RefreshResponse = response
            .json()
            .await
            .map_err(|e| Error::Parse(format!("refresh response: {e}")))?;
        self.store.set_access_token(body.access_token.clone()).await?;
        debug!("access token refreshed");
        Ok(body.access_token)
    }

    /// End the session server-side and drop local tokens.
    ///
    /// Local tokens are cleared even if the server round trip fails; logout
    /// must always leave the client logged out.
    pub async fn logout(&self) -> Result<()> {
        self.store.clear().await?;
        if let Err(e) = self
            .http
            .get(format!("{}/api/auth/logout", self.base_url))
            .send()
            .await
        {
            warn!(error = %e, "logout request failed; local tokens already cleared");
        }
        Ok(())
    }

    /// Save a new letter. `name` defaults server-side when omitted.
    pub async fn save_letter(&self, content: &str, name: Option<&str>) -> Result<SaveResponse> {
        let mut body = serde_json::json!({ "content": content });
        if let Some(name) = name {
            body["name"] = serde_json::Value::String(name.to_string());
        }
        self.request_with_refresh(Method::POST, "/api/drive/save", Some(body))
            .await
    }

    /// List stored letters, newest first.
    pub async fn list_letters(&self) -> Result<Vec<LetterEntry>> {
        self.request_with_refresh(Method::GET, "/api/drive/files", None)
            .await
    }

    /// Fetch one letter's name and plain-text content.
    pub async fn letter_content(&self, file_id: &str) -> Result<LetterContent> {
        self.request_with_refresh(
            Method::GET,
            &format!("/api/drive/files/{file_id}/content"),
            None,
        )
        .await
    }

    /// Update a letter's content and optionally rename it.
    pub async fn update_letter(
        &self,
        file_id: &str,
        content: &str,
        name: Option<&str>,
    ) -> Result<SaveResponse> {
        let mut body = serde_json::json!({ "content": content });
        if let Some(name) = name {
            body["name"] = serde_json::Value::String(name.to_string());
        }
        self.request_with_refresh(Method::PUT, &format!("/api/drive/files/{file_id}"), Some(body))
            .await
    }

    /// The refresh coordinator. Sends the call with the stored access
    /// token; on 401, refreshes and re-issues the call exactly once,
    /// returning the retry's result whatever it is. Every other status goes
    /// straight to decoding. If the refresh path fails, the original 401 is
    /// surfaced (the store is already cleared by `refresh`).
    async fn request_with_refresh<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<serde_json::Value>,
    ) -> Result<T> {
        let token = self
            .store
            .access_token()
            .await
            .ok_or(Error::Unauthenticated)?;

        let first = self.send(method.clone(), path, body.as_ref(), &token).await?;
        if first.status() != StatusCode::UNAUTHORIZED {
            return decode(first).await;
        }

        let original = api_error(first).await;
        debug!(path, "access token rejected, attempting refresh");
        match self.refresh().await {
            Ok(new_token) => {
                let second = self.send(method, path, body.as_ref(), &new_token).await?;
                decode(second).await
            }
            Err(refresh_err) => {
                debug!(path, error = %refresh_err, "refresh failed, surfacing original error");
                Err(original)
            }
        }
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
        token: &str,
    ) -> Result<reqwest::Response> {
        let mut request = self
            .http
            .request(method, format!("{}{}", self.base_url, path))
            .bearer_auth(token);
        if let Some(body) = body {
            request = request.json(body);
        }
        request
            .send()
            .await
            .map_err(|e| Error::Http(format!("request failed: {e}")))
    }
}

/// Decode a success body, or turn a failure status into `Error::Api`.
async fn decode<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        return Err(api_error_with_status(status, response).await);
    }
    response
        .json::<T>()
        .await
        .map_err(|e| Error::Parse(format!("response body: {e}")))
}

async fn api_error(response: reqwest::Response) -> Error {
    let status = response.status();
    api_error_with_status(status, response).await
}

async fn api_error_with_status(status: StatusCode, response: reqwest::Response) -> Error {
    Error::Api {
        status: status.as_u16(),
        message: error_message(response).await,
    }
}

/// Pull the human-readable message out of the API's error envelope,
/// falling back to the raw body.
async fn error_message(response: reqwest::Response) -> String {
    let body = response.text().await.unwrap_or_default();
    serde_json::from_str::<serde_json::Value>(&body)
        .ok()
        .and_then(|v| {
            v.get("error")?
                .get("message")?
                .as_str()
                .map(str::to_string)
        })
        .unwrap_or(body)
}

/// Decode %XX escapes; tokens arrive percent-encoded on the redirect URL.
fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%'
            && i + 2 < bytes.len()
            && let (Some(hi), Some(lo)) = (hex_value(bytes[i + 1]), hex_value(bytes[i + 2]))
        {
            out.push(hi * 16 + lo);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn hex_value(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
}
