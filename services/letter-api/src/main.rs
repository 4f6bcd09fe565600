//! Letter API service.
//!
//! HTTP backend for a letter-writing frontend: Google OAuth login with
//! PKCE, cookie sessions alongside bearer-token auth, and letter storage
//! on the user's own Google Drive. Serves `/health` and Prometheus
//! `/metrics` next to the API routes and drains in-flight requests on
//! shutdown.

mod auth;
mod config;
mod error;
mod letters;
mod metrics;
mod resolver;
mod session;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::Router;
use axum::extract::State;
use axum::http::{HeaderValue, Method, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::get;
use drive::DriveClient;
use google_auth::GoogleOAuth;
use metrics_exporter_prometheus::PrometheusHandle;
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::Config;
use crate::metrics::ServiceMetrics;
use crate::session::{PendingLogins, SessionStore};

/// How long to wait for in-flight requests once a shutdown signal arrives.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

/// Shared state handed to every handler.
#[derive(Clone)]
struct AppState {
    sessions: Arc<SessionStore>,
    pending_logins: Arc<PendingLogins>,
    oauth: GoogleOAuth,
    drive: DriveClient,
    frontend_url: String,
    cookie_name: String,
    cookie_secure: bool,
    metrics: ServiceMetrics,
    prometheus: PrometheusHandle,
}

fn build_router(state: AppState, frontend_origin: HeaderValue, max_connections: usize) -> Router {
    // Credentialed CORS requires a concrete origin, never a wildcard.
    let cors = CorsLayer::new()
        .allow_origin(frontend_origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::PUT])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .route("/health", get(health_handler))
        .route("/metrics", get(metrics_handler))
        .merge(auth::router())
        .merge(letters::router())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            metrics::track_requests,
        ))
        .layer(cors)
        .layer(tower::limit::ConcurrencyLimitLayer::new(max_connections))
        .with_state(state)
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_env("LOG_LEVEL")
                .or_else(|_| EnvFilter::try_from_default_env())
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("starting letter-api");

    // Must be installed before any handler records a metric.
    let prometheus_handle = metrics::install_recorder();

    let args: Vec<String> = std::env::args().collect();
    let config_override = args
        .iter()
        .position(|arg| arg == "--config")
        .and_then(|idx| args.get(idx + 1))
        .map(String::as_str);
    let config_path = Config::resolve_path(config_override);

    let config = Config::load(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;

    let client_secret = config
        .google
        .client_secret
        .clone()
        .context("no Google client secret: set GOOGLE_CLIENT_SECRET or google.client_secret_file")?;

    info!(
        listen_addr = %config.server.listen_addr,
        frontend_url = %config.server.frontend_url,
        redirect_uri = %config.google.redirect_uri,
        session_ttl_secs = config.session.ttl_secs,
        "configuration loaded"
    );

    // Origins never carry a trailing slash; the frontend URL doubles as one.
    let frontend_url = config.server.frontend_url.trim_end_matches('/').to_string();
    let frontend_origin: HeaderValue = frontend_url
        .parse()
        .with_context(|| format!("frontend_url {frontend_url:?} is not a valid CORS origin"))?;

    let mut oauth = GoogleOAuth::new(
        config.google.client_id.clone(),
        client_secret,
        config.google.redirect_uri.clone(),
    );
    if let Some(url) = &config.google.authorize_url {
        oauth = oauth.with_authorize_endpoint(url.clone());
    }
    if let Some(url) = &config.google.token_url {
        oauth = oauth.with_token_endpoint(url.clone());
    }
    if let Some(url) = &config.google.tokeninfo_url {
        oauth = oauth.with_tokeninfo_endpoint(url.clone());
    }
    if let Some(url) = &config.google.userinfo_url {
        oauth = oauth.with_userinfo_endpoint(url.clone());
    }

    let drive = DriveClient::with_base_urls(
        config
            .google
            .drive_api_url
            .clone()
            .unwrap_or_else(|| drive::DRIVE_API_BASE.to_string()),
        config
            .google
            .drive_upload_url
            .clone()
            .unwrap_or_else(|| drive::DRIVE_UPLOAD_BASE.to_string()),
    );

    let state = AppState {
        sessions: Arc::new(SessionStore::new(Duration::from_secs(config.session.ttl_secs))),
        pending_logins: Arc::new(PendingLogins::new()),
        oauth,
        drive,
        frontend_url,
        cookie_name: config.session.cookie_name.clone(),
        cookie_secure: config.session.cookie_secure,
        metrics: ServiceMetrics::new(),
        prometheus: prometheus_handle,
    };
    let in_flight = state.metrics.in_flight.clone();

    let app = build_router(state, frontend_origin, config.server.max_connections);

    let listener = TcpListener::bind(config.server.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.server.listen_addr))?;
    info!(addr = %config.server.listen_addr, "listening");

    let (shutdown_tx, shutdown_rx) = tokio::sync::oneshot::channel::<()>();
    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async {
                let _ = shutdown_rx.await;
            })
            .await
    });

    shutdown_signal().await;
    let _ = shutdown_tx.send(());

    match tokio::time::timeout(DRAIN_TIMEOUT, server_handle).await {
        Ok(Ok(Ok(()))) => info!("all connections drained"),
        Ok(Ok(Err(e))) => error!(error = %e, "server exited with an error"),
        Ok(Err(e)) => error!(error = %e, "server task panicked"),
        Err(_) => warn!(
            in_flight = in_flight.load(Ordering::Relaxed),
            drain_timeout_secs = DRAIN_TIMEOUT.as_secs(),
            "drain timeout expired with requests still in flight"
        ),
    }

    info!("shutdown complete");
    Ok(())
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let active_sessions = state.sessions.len().await;
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        json!({
            "status": "healthy",
            "uptime_seconds": state.metrics.started_at.elapsed().as_secs(),
            "requests_served": state.metrics.requests_total.load(Ordering::Relaxed),
            "errors_total": state.metrics.errors_total.load(Ordering::Relaxed),
            "active_sessions": active_sessions,
        })
        .to_string(),
    )
}

async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(
            header::CONTENT_TYPE,
            "text/plain; version=0.0.4; charset=utf-8",
        )],
        state.prometheus.render(),
    )
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install ctrl-c handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received ctrl-c, shutting down"),
        () = terminate => info!("received SIGTERM, shutting down"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::atomic::AtomicUsize;

    use axum::body::Body;
    use axum::http::Request;
    use common::Secret;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use tower::ServiceExt;

    use crate::session::Identity;

    fn test_prometheus_handle() -> PrometheusHandle {
        PrometheusBuilder::new().build_recorder().handle()
    }

    fn state_with(oauth: GoogleOAuth, drive: DriveClient) -> AppState {
        AppState {
            sessions: Arc::new(SessionStore::new(Duration::from_secs(3600))),
            pending_logins: Arc::new(PendingLogins::new()),
            oauth,
            drive,
            frontend_url: "http://localhost:5173".to_string(),
            cookie_name: "letter_session".to_string(),
            cookie_secure: false,
            metrics: ServiceMetrics::new(),
            prometheus: test_prometheus_handle(),
        }
    }

    fn test_state() -> AppState {
        state_with(
            GoogleOAuth::new(
                "client-123",
                Secret::new(String::from("shh")),
                "http://localhost:5000/api/auth/google/callback",
            ),
            DriveClient::new(),
        )
    }

    fn frontend_origin() -> HeaderValue {
        "http://localhost:5173".parse().unwrap()
    }

    #[tokio::test]
    async fn health_reports_counters_and_sessions() {
        let state = test_state();
        state.metrics.requests_total.fetch_add(7, Ordering::Relaxed);
        state.metrics.errors_total.fetch_add(2, Ordering::Relaxed);
        let user = Identity {
            id: "user-1".to_string(),
            display_name: None,
            email: None,
        };
        state
            .sessions
            .create(user, "ya29.token".to_string(), None)
            .await;

        let app = build_router(state, frontend_origin(), 16);
        let response = app
            .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let health: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(health["status"], "healthy");
        // The /health request itself passes through the counter middleware.
        assert_eq!(health["requests_served"], 8);
        assert_eq!(health["errors_total"], 2);
        assert_eq!(health["active_sessions"], 1);
        assert!(health["uptime_seconds"].is_u64());
    }

    #[tokio::test]
    async fn metrics_endpoint_serves_prometheus_text() {
        let app = build_router(test_state(), frontend_origin(), 16);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/metrics")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            response.headers().get(header::CONTENT_TYPE).unwrap(),
            "text/plain; version=0.0.4; charset=utf-8"
        );
    }

    #[tokio::test]
    async fn unknown_route_returns_not_found() {
        let app = build_router(test_state(), frontend_origin(), 16);
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/unknown")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn cors_preflight_admits_the_frontend_origin() {
        let app = build_router(test_state(), frontend_origin(), 16);
        let response = app
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/api/drive/save")
                    .header("origin", "http://localhost:5173")
                    .header("access-control-request-method", "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(
            response
                .headers()
                .get("access-control-allow-origin")
                .unwrap(),
            "http://localhost:5173"
        );
        assert_eq!(
            response
                .headers()
                .get("access-control-allow-credentials")
                .unwrap(),
            "true"
        );
    }

    /// Google mock for the full-stack test: tokeninfo grants the Drive
    /// scope to every presented token, the token endpoint answers refresh
    /// grants with `ya29.new`.
    async fn start_google(refreshes: Arc<AtomicUsize>) -> std::net::SocketAddr {
        let app = Router::new()
            .route(
                "/tokeninfo",
                axum::routing::post(
                    |axum::Form(fields): axum::Form<Vec<(String, String)>>| async move {
                        assert!(fields.iter().any(|(key, _)| key == "access_token"));
                        axum::Json(json!({
                            "scope": google_auth::DRIVE_FILE_SCOPE,
                            "expires_in": 3599,
                            "email": "writer@example.com"
                        }))
                    },
                ),
            )
            .route(
                "/token",
                axum::routing::post(
                    move |axum::Form(fields): axum::Form<Vec<(String, String)>>| {
                        let refreshes = refreshes.clone();
                        async move {
                            refreshes.fetch_add(1, Ordering::SeqCst);
                            assert!(
                                fields
                                    .iter()
                                    .any(|(key, value)| key == "grant_type"
                                        && value == "refresh_token")
                            );
                            assert!(
                                fields
                                    .iter()
                                    .any(|(key, value)| key == "refresh_token"
                                        && value == "1//refresh")
                            );
                            axum::Json(json!({
                                "access_token": "ya29.new",
                                "expires_in": 3599,
                                "token_type": "Bearer"
                            }))
                        }
                    },
                ),
            );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    /// Drive mock that rejects the stale token and accepts the refreshed one.
    async fn start_drive(saves: Arc<AtomicUsize>) -> std::net::SocketAddr {
        let app = Router::new().route(
            "/upload/files",
            axum::routing::post(move |headers: axum::http::HeaderMap| {
                let saves = saves.clone();
                async move {
                    saves.fetch_add(1, Ordering::SeqCst);
                    let authorization = headers
                        .get(header::AUTHORIZATION)
                        .and_then(|value| value.to_str().ok())
                        .unwrap_or("");
                    if authorization == "Bearer ya29.new" {
                        (
                            StatusCode::OK,
                            axum::Json(json!({
                                "id": "file-9",
                                "name": "Letter.txt",
                                "webViewLink": "https://docs.google.com/document/d/file-9"
                            })),
                        )
                            .into_response()
                    } else {
                        (StatusCode::UNAUTHORIZED, "Invalid Credentials").into_response()
                    }
                }
            }),
        );

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    /// Full stack: letter-client save with a stale access token rides
    /// through the service's 401, refreshes via `/api/auth/refresh-token`,
    /// and lands the retry on Drive with the new token.
    #[tokio::test]
    async fn stale_access_token_refreshes_through_the_full_stack() {
        let refreshes = Arc::new(AtomicUsize::new(0));
        let saves = Arc::new(AtomicUsize::new(0));
        let google_addr = start_google(refreshes.clone()).await;
        let drive_addr = start_drive(saves.clone()).await;

        let oauth = GoogleOAuth::new(
            "client-123",
            Secret::new(String::from("shh")),
            "http://localhost:5000/api/auth/google/callback",
        )
        .with_token_endpoint(format!("http://{google_addr}/token"))
        .with_tokeninfo_endpoint(format!("http://{google_addr}/tokeninfo"));
        let drive = DriveClient::with_base_urls(
            format!("http://{drive_addr}/drive"),
            format!("http://{drive_addr}/upload"),
        );

        let app = build_router(state_with(oauth, drive), frontend_origin(), 16);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let api_addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(
            letter_client::TokenStore::load(dir.path().join("tokens.json"))
                .await
                .unwrap(),
        );
        store
            .set_pair("ya29.stale".to_string(), Some("1//refresh".to_string()))
            .await
            .unwrap();
        let client = letter_client::ApiClient::new(format!("http://{api_addr}"), store.clone());

        let saved = client.save_letter("Dear reader,", None).await.unwrap();
        assert_eq!(saved.file_id, "file-9");
        assert_eq!(saved.file_name, "Letter.txt");

        assert_eq!(saves.load(Ordering::SeqCst), 2, "original attempt plus one retry");
        assert_eq!(refreshes.load(Ordering::SeqCst), 1);
        assert_eq!(store.access_token().await.as_deref(), Some("ya29.new"));
        assert_eq!(store.refresh_token().await.as_deref(), Some("1//refresh"));
    }
}
