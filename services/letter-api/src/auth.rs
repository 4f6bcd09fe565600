//! Authentication endpoints
//!
//! Implements the browser-facing OAuth flow plus session and token
//! endpoints:
//! - GET  /api/auth/google            start login, redirect to Google
//! - GET  /api/auth/google/callback   finish login, set session cookie
//! - GET  /api/auth/status            report session state for the UI
//! - GET  /api/auth/verify-token      introspect a bearer token
//! - POST /api/auth/refresh-token     mint a new access token
//! - GET  /api/auth/logout            destroy the session
//!
//! Callback failures never render JSON: the browser is mid-navigation, so
//! every failure redirects back to the frontend login page instead.

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::Deserialize;
use tracing::{info, instrument, warn};

use google_auth::DRIVE_FILE_SCOPE;

use crate::AppState;
use crate::error::{Error, Result};
use crate::metrics;
use crate::session::Identity;

/// Build the auth router. Merged into the main app router in `main`.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/auth/google", get(login))
        .route("/api/auth/google/callback", get(callback))
        .route("/api/auth/status", get(status))
        .route("/api/auth/verify-token", get(verify_token))
        .route("/api/auth/refresh-token", post(refresh_token))
        .route("/api/auth/logout", get(logout))
}

/// 302 redirect. `axum::response::Redirect` only issues 303/307/308, and
/// the browser flow here uses the conventional 302.
fn redirect(location: &str) -> Response {
    (
        StatusCode::FOUND,
        [(axum::http::header::LOCATION, location.to_string())],
    )
        .into_response()
}

/// Percent-encode a query-string value. RFC 3986 unreserved characters pass
/// through, everything else becomes %XX.
fn urlencode(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'.' | b'_' | b'~' => {
                encoded.push(byte as char);
            }
            other => encoded.push_str(&format!("%{other:02X}")),
        }
    }
    encoded
}

/// GET /api/auth/google: generate state + PKCE pair, remember them, and
/// send the browser to Google's consent screen.
#[instrument(skip_all)]
async fn login(State(state): State<AppState>) -> Response {
    let login_state = google_auth::generate_state();
    let verifier = google_auth::generate_verifier();
    let challenge = google_auth::compute_challenge(&verifier);

    state
        .pending_logins
        .insert(login_state.clone(), verifier)
        .await;

    redirect(&state.oauth.authorization_url(&login_state, &challenge))
}

/// Query parameters Google sends to the callback. All optional: a denial
/// carries `error` and no code.
#[derive(Deserialize)]
struct CallbackQuery {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// GET /api/auth/google/callback: complete the login.
///
/// Validates the state against the pending-login map, exchanges the code,
/// fetches the user's profile, creates a session, and redirects to the
/// frontend editor with the tokens in the fragment-free query string.
#[instrument(skip_all)]
async fn callback(
    State(state): State<AppState>,
    jar: CookieJar,
    Query(query): Query<CallbackQuery>,
) -> Response {
    let login_page = format!("{}/login", state.frontend_url);

    if let Some(reason) = query.error {
        warn!(reason, "authorization denied at consent screen");
        return redirect(&login_page);
    }

    let (Some(code), Some(login_state)) = (query.code, query.state) else {
        warn!("callback missing code or state parameter");
        return redirect(&login_page);
    };

    // Unknown or expired state means this callback was not one we issued
    let Some(verifier) = state.pending_logins.take(&login_state).await else {
        warn!("callback state not recognized");
        return redirect(&login_page);
    };

    let tokens = match state.oauth.exchange_code(&code, &verifier).await {
        Ok(tokens) => tokens,
        Err(e) => {
            warn!(error = %e, "authorization code exchange failed");
            return redirect(&login_page);
        }
    };

    let profile = match state.oauth.fetch_profile(&tokens.access_token).await {
        Ok(profile) => profile,
        Err(e) => {
            warn!(error = %e, "profile fetch failed");
            return redirect(&login_page);
        }
    };

    let user = Identity {
        id: profile.id,
        display_name: profile.name,
        email: profile.email,
    };
    info!(user_id = %user.id, "login completed");

    let session_id = state
        .sessions
        .create(
            user,
            tokens.access_token.clone(),
            tokens.refresh_token.clone(),
        )
        .await;
    metrics::set_active_sessions(state.sessions.len().await as f64);

    // Tokens also travel to the frontend so it can call Drive endpoints
    // bearer-style after the cookie expires
    let destination = format!(
        "{}/editor?accessToken={}&refreshToken={}",
        state.frontend_url,
        urlencode(&tokens.access_token),
        urlencode(tokens.refresh_token.as_deref().unwrap_or_default()),
    );

    (jar.add(session_cookie(&state, session_id)), redirect(&destination)).into_response()
}

fn session_cookie(state: &AppState, session_id: String) -> Cookie<'static> {
    let mut cookie = Cookie::new(state.cookie_name.clone(), session_id);
    cookie.set_http_only(true);
    cookie.set_path("/");
    cookie.set_same_site(SameSite::Lax);
    cookie.set_secure(state.cookie_secure);
    cookie.set_max_age(time::Duration::seconds(
        state.sessions.ttl().as_secs() as i64
    ));
    cookie
}

/// GET /api/auth/status: session probe for the frontend router.
#[instrument(skip_all)]
async fn status(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    let session = match jar.get(&state.cookie_name) {
        Some(cookie) => state.sessions.get(cookie.value()).await,
        None => None,
    };

    let body = match session {
        Some(session) => serde_json::json!({
            "authenticated": true,
            "user": {
                "id": session.user.id,
                "displayName": session.user.display_name,
                "email": session.user.email,
            }
        }),
        None => serde_json::json!({ "authenticated": false }),
    };

    (
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
}

/// GET /api/auth/verify-token: introspect the presented bearer token and
/// confirm it carries the drive-file scope.
#[instrument(skip_all)]
async fn verify_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    let token = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .ok_or(Error::Unauthenticated)?;

    let info = state
        .oauth
        .token_info(token)
        .await
        .map_err(|e| Error::InvalidToken(e.to_string()))?;

    if !info.has_scope(DRIVE_FILE_SCOPE) {
        return Err(Error::InsufficientScope {
            required: DRIVE_FILE_SCOPE,
        });
    }

    Ok((
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        serde_json::json!({ "valid": true, "expiresIn": info.expires_in }).to_string(),
    ))
}

#[derive(Deserialize)]
struct RefreshRequest {
    #[serde(default, rename = "refreshToken")]
    refresh_token: Option<String>,
}

/// POST /api/auth/refresh-token: trade a refresh token for a new access
/// token. A rejected refresh token is a credential failure (401), not an
/// upstream fault.
#[instrument(skip_all)]
async fn refresh_token(
    State(state): State<AppState>,
    axum::Json(body): axum::Json<RefreshRequest>,
) -> Result<impl IntoResponse> {
    let refresh = body
        .refresh_token
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .ok_or_else(|| Error::Validation("refreshToken is required".into()))?;

    let tokens = state
        .oauth
        .refresh_token(refresh)
        .await
        .map_err(|e| match e {
            google_auth::Error::InvalidCredentials(message) => Error::InvalidToken(message),
            other => Error::Remote(other.to_string()),
        })?;

    info!("access token refreshed");

    Ok((
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        serde_json::json!({
            "accessToken": tokens.access_token,
            "expiresIn": tokens.expires_in,
        })
        .to_string(),
    ))
}

/// GET /api/auth/logout: drop the session and clear the cookie. Succeeds
/// whether or not a session existed.
#[instrument(skip_all)]
async fn logout(State(state): State<AppState>, jar: CookieJar) -> impl IntoResponse {
    if let Some(cookie) = jar.get(&state.cookie_name) {
        state.sessions.remove(cookie.value()).await;
        metrics::set_active_sessions(state.sessions.len().await as f64);
        info!("session terminated");
    }

    let mut removal = Cookie::new(state.cookie_name.clone(), "");
    removal.set_path("/");

    (
        jar.remove(removal),
        (
            StatusCode::OK,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            serde_json::json!({ "message": "Logged out successfully" }).to_string(),
        ),
    )
}
