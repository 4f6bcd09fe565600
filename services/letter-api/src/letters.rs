//! Letter endpoints backed by Google Drive
//!
//! - POST /api/drive/save                    create a letter (Doc conversion)
//! - GET  /api/drive/files                   list recent letters
//! - GET  /api/drive/files/{file_id}/content fetch a letter's text
//! - PUT  /api/drive/files/{file_id}         rename and/or replace content
//! - GET  /api/drive/test                    Drive connectivity probe
//!
//! All routes resolve their credential through [`DriveAccess`], so a session
//! cookie and a scoped bearer token are interchangeable here.

use axum::Router;
use axum::extract::Path;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post, put};
use serde::Deserialize;
use tracing::{info, instrument};

use crate::error::{Error, Result};
use crate::resolver::DriveAccess;

/// Build the Drive-backed letter router.
pub fn router() -> Router<crate::AppState> {
    Router::new()
        .route("/api/drive/save", post(save))
        .route("/api/drive/files", get(list))
        .route("/api/drive/files/{file_id}/content", get(content))
        .route("/api/drive/files/{file_id}", put(update))
        .route("/api/drive/test", get(probe))
}

/// Body for save and update. Both fields optional so validation can produce
/// a field-level message instead of a deserialization failure.
#[derive(Deserialize)]
struct SaveRequest {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    name: Option<String>,
}

/// Empty string and missing field are both rejected; whitespace passes.
fn require_content(content: Option<String>) -> Result<String> {
    content
        .filter(|c| !c.is_empty())
        .ok_or_else(|| Error::Validation("content is required".into()))
}

/// POST /api/drive/save: create a letter as a Google Doc.
#[instrument(skip_all)]
async fn save(
    access: DriveAccess,
    axum::Json(body): axum::Json<SaveRequest>,
) -> Result<impl IntoResponse> {
    let content = require_content(body.content)?;
    let name = body
        .name
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| drive::DEFAULT_LETTER_NAME.to_string());

    let file = access.drive.create_letter(&name, &content).await?;
    info!(file_id = %file.id, "letter saved");

    Ok((
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        serde_json::json!({
            "fileId": file.id,
            "fileName": file.name,
            "webViewLink": file.web_view_link,
        })
        .to_string(),
    ))
}

/// GET /api/drive/files: the ten most recently modified letters, newest
/// first, served as the Drive metadata array.
#[instrument(skip_all)]
async fn list(access: DriveAccess) -> Result<impl IntoResponse> {
    let files = access.drive.list_letters().await?;
    let body = serde_json::to_string(&files).map_err(|e| Error::Internal(e.to_string()))?;

    Ok((
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        body,
    ))
}

/// GET /api/drive/files/{file_id}/content: fetch a letter's text.
///
/// Google Docs must be exported; anything else downloads raw bytes.
#[instrument(skip_all, fields(file_id = %file_id))]
async fn content(access: DriveAccess, Path(file_id): Path<String>) -> Result<impl IntoResponse> {
    let file = access.drive.metadata(&file_id, "id, name, mimeType").await?;

    let text = if file.is_google_doc() {
        access.drive.export_text(&file_id).await?
    } else {
        access.drive.download_text(&file_id).await?
    };

    Ok((
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        serde_json::json!({ "name": file.name, "content": text }).to_string(),
    ))
}

/// PUT /api/drive/files/{file_id}: replace a letter's content, optionally
/// renaming it first, and return the refreshed metadata.
#[instrument(skip_all, fields(file_id = %file_id))]
async fn update(
    access: DriveAccess,
    Path(file_id): Path<String>,
    axum::Json(body): axum::Json<SaveRequest>,
) -> Result<impl IntoResponse> {
    let content = require_content(body.content)?;

    if let Some(name) = body.name.filter(|n| !n.is_empty()) {
        access.drive.rename(&file_id, &name).await?;
    }
    access.drive.replace_content(&file_id, &content).await?;

    let file = access
        .drive
        .metadata(&file_id, "id, name, webViewLink")
        .await?;
    info!(file_id = %file.id, "letter updated");

    Ok((
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        serde_json::json!({
            "fileId": file.id,
            "fileName": file.name,
            "webViewLink": file.web_view_link,
        })
        .to_string(),
    ))
}

/// GET /api/drive/test: confirm the credential can reach Drive at all.
/// Lists a single file, so the count is 0 (empty Drive) or 1.
#[instrument(skip_all)]
async fn probe(access: DriveAccess) -> Result<impl IntoResponse> {
    let files = access.drive.probe().await?;

    Ok((
        StatusCode::OK,
        [(axum::http::header::CONTENT_TYPE, "application/json")],
        serde_json::json!({
            "success": true,
            "message": "Google Drive API connection successful",
            "fileCount": files.len(),
        })
        .to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::ServiceMetrics;
    use crate::session::{Identity, PendingLogins, SessionStore};
    use axum::body::Body;
    use axum::http::Request;
    use axum::routing::{patch, post as axum_post};
    use axum::{Form, Json};
    use common::Secret;
    use drive::{DOC_MIME_TYPE, DriveClient};
    use google_auth::{DRIVE_FILE_SCOPE, GoogleOAuth};
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tower::ServiceExt;

    async fn serve(app: Router) -> std::net::SocketAddr {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        addr
    }

    /// App state backed by a mock Drive, with one session already logged in.
    /// Returns the state and the session cookie header value.
    async fn state_with_session(drive_addr: std::net::SocketAddr) -> (crate::AppState, String) {
        let state = crate::AppState {
            sessions: Arc::new(SessionStore::new(Duration::from_secs(3600))),
            pending_logins: Arc::new(PendingLogins::new()),
            oauth: GoogleOAuth::new(
                "client-123",
                Secret::new(String::from("shh")),
                "http://localhost:5000/api/auth/google/callback",
            ),
            drive: DriveClient::with_base_urls(
                format!("http://{drive_addr}/drive"),
                format!("http://{drive_addr}/upload"),
            ),
            frontend_url: "http://localhost:5173".to_string(),
            cookie_name: "letter_session".to_string(),
            cookie_secure: false,
            metrics: ServiceMetrics::new(),
            prometheus: PrometheusBuilder::new().build_recorder().handle(),
        };
        let session_id = state
            .sessions
            .create(
                Identity {
                    id: "108234567890".to_string(),
                    display_name: Some("Lena Writes".to_string()),
                    email: Some("lena@example.com".to_string()),
                },
                "ya29.session".to_string(),
                None,
            )
            .await;
        let cookie = format!("letter_session={session_id}");
        (state, cookie)
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_save_defaults_file_name() {
        let drive_app = Router::new().route(
            "/upload/files",
            axum_post(|body: String| async move {
                assert!(body.contains("\"name\":\"Letter.txt\""));
                assert!(body.contains("Dear reader,"));
                Json(serde_json::json!({
                    "id": "f-1",
                    "name": "Letter.txt",
                    "webViewLink": "https://docs.google.com/document/d/f-1"
                }))
            }),
        );
        let addr = serve(drive_app).await;
        let (state, cookie) = state_with_session(addr).await;
        let app = router().with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/drive/save")
                    .header("cookie", cookie)
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::json!({"content": "Dear reader,"}).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["fileId"], "f-1");
        assert_eq!(body["fileName"], "Letter.txt");
        assert_eq!(body["webViewLink"], "https://docs.google.com/document/d/f-1");
    }

    #[tokio::test]
    async fn test_save_empty_content_rejected_before_upload() {
        let uploads = Arc::new(AtomicUsize::new(0));
        let counter = uploads.clone();
        let drive_app = Router::new().route(
            "/upload/files",
            axum_post(move || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Json(serde_json::json!({"id": "f-1", "name": "Letter.txt"}))
                }
            }),
        );
        let addr = serve(drive_app).await;
        let (state, cookie) = state_with_session(addr).await;
        let app = router().with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/drive/save")
                    .header("cookie", cookie)
                    .header("content-type", "application/json")
                    .body(Body::from(serde_json::json!({"content": ""}).to_string()))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["type"], "validation_error");
        assert_eq!(body["error"]["message"], "content is required");
        assert_eq!(uploads.load(Ordering::SeqCst), 0, "no upload may be attempted");
    }

    #[tokio::test]
    async fn test_save_missing_content_rejected() {
        let drive_app = Router::new();
        let addr = serve(drive_app).await;
        let (state, cookie) = state_with_session(addr).await;
        let app = router().with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/drive/save")
                    .header("cookie", cookie)
                    .header("content-type", "application/json")
                    .body(Body::from("{}"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = body_json(response).await;
        assert_eq!(body["error"]["type"], "validation_error");
    }

    #[tokio::test]
    async fn test_list_serves_drive_metadata() {
        let drive_app = Router::new().route(
            "/drive/files",
            get(|| async {
                Json(serde_json::json!({
                    "files": [
                        {
                            "id": "n",
                            "name": "Newest",
                            "mimeType": DOC_MIME_TYPE,
                            "webViewLink": "https://docs.google.com/document/d/n",
                            "modifiedTime": "2025-02-02T00:00:00Z"
                        },
                        {"id": "o", "name": "Older", "modifiedTime": "2025-01-01T00:00:00Z"}
                    ]
                }))
            }),
        );
        let addr = serve(drive_app).await;
        let (state, cookie) = state_with_session(addr).await;
        let app = router().with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/drive/files")
                    .header("cookie", cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        let files = body.as_array().unwrap();
        assert_eq!(files.len(), 2);
        assert_eq!(files[0]["name"], "Newest");
        assert_eq!(files[0]["webViewLink"], "https://docs.google.com/document/d/n");
        assert_eq!(files[1]["modifiedTime"], "2025-01-01T00:00:00Z");
    }

    #[tokio::test]
    async fn test_content_exports_google_doc() {
        let drive_app = Router::new()
            .route(
                "/drive/files/{id}",
                get(|| async {
                    Json(serde_json::json!({
                        "id": "doc-1",
                        "name": "My Letter",
                        "mimeType": DOC_MIME_TYPE
                    }))
                }),
            )
            .route("/drive/files/{id}/export", get(|| async { "Dear reader," }));
        let addr = serve(drive_app).await;
        let (state, cookie) = state_with_session(addr).await;
        let app = router().with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/drive/files/doc-1/content")
                    .header("cookie", cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["name"], "My Letter");
        assert_eq!(body["content"], "Dear reader,");
    }

    #[tokio::test]
    async fn test_content_downloads_plain_file() {
        let exports = Arc::new(AtomicUsize::new(0));
        let counter = exports.clone();
        let drive_app = Router::new()
            .route(
                "/drive/files/{id}",
                get(
                    |axum::extract::Query(q): axum::extract::Query<HashMap<String, String>>| async move {
                        if q.get("alt").map(String::as_str) == Some("media") {
                            "Raw text".into_response()
                        } else {
                            Json(serde_json::json!({
                                "id": "txt-1",
                                "name": "Notes.txt",
                                "mimeType": "text/plain"
                            }))
                            .into_response()
                        }
                    },
                ),
            )
            .route(
                "/drive/files/{id}/export",
                get(move || {
                    let counter = counter.clone();
                    async move {
                        counter.fetch_add(1, Ordering::SeqCst);
                        "should not be exported"
                    }
                }),
            );
        let addr = serve(drive_app).await;
        let (state, cookie) = state_with_session(addr).await;
        let app = router().with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/drive/files/txt-1/content")
                    .header("cookie", cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["content"], "Raw text");
        assert_eq!(exports.load(Ordering::SeqCst), 0, "plain files must not export");
    }

    #[tokio::test]
    async fn test_update_renames_replaces_and_refetches() {
        let drive_app = Router::new()
            .route(
                "/drive/files/{id}",
                get(|| async {
                    Json(serde_json::json!({
                        "id": "u-1",
                        "name": "Renamed Letter",
                        "webViewLink": "https://docs.google.com/document/d/u-1"
                    }))
                })
                .patch(|Json(body): Json<serde_json::Value>| async move {
                    assert_eq!(body["name"], "Renamed Letter");
                    Json(serde_json::json!({"id": "u-1", "name": "Renamed Letter"}))
                }),
            )
            .route(
                "/upload/files/{id}",
                patch(|body: String| async move {
                    assert_eq!(body, "Updated text");
                    Json(serde_json::json!({"id": "u-1"}))
                }),
            );
        let addr = serve(drive_app).await;
        let (state, cookie) = state_with_session(addr).await;
        let app = router().with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/api/drive/files/u-1")
                    .header("cookie", cookie)
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::json!({"name": "Renamed Letter", "content": "Updated text"})
                            .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["fileId"], "u-1");
        assert_eq!(body["fileName"], "Renamed Letter");
        assert_eq!(body["webViewLink"], "https://docs.google.com/document/d/u-1");
    }

    #[tokio::test]
    async fn test_update_without_name_skips_rename() {
        let renames = Arc::new(AtomicUsize::new(0));
        let counter = renames.clone();
        let drive_app = Router::new()
            .route(
                "/drive/files/{id}",
                get(|| async { Json(serde_json::json!({"id": "u-2", "name": "Kept Name"})) })
                    .patch(move || {
                        let counter = counter.clone();
                        async move {
                            counter.fetch_add(1, Ordering::SeqCst);
                            Json(serde_json::json!({"id": "u-2"}))
                        }
                    }),
            )
            .route(
                "/upload/files/{id}",
                patch(|| async { Json(serde_json::json!({"id": "u-2"})) }),
            );
        let addr = serve(drive_app).await;
        let (state, cookie) = state_with_session(addr).await;
        let app = router().with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/api/drive/files/u-2")
                    .header("cookie", cookie)
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::json!({"content": "Only content"}).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["fileName"], "Kept Name");
        assert_eq!(renames.load(Ordering::SeqCst), 0, "no rename without a name");
    }

    #[tokio::test]
    async fn test_update_missing_file_is_not_found() {
        let drive_app = Router::new().route(
            "/upload/files/{id}",
            patch(|| async { (StatusCode::NOT_FOUND, "File not found") }),
        );
        let addr = serve(drive_app).await;
        let (state, cookie) = state_with_session(addr).await;
        let app = router().with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri("/api/drive/files/gone")
                    .header("cookie", cookie)
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::json!({"content": "text"}).to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = body_json(response).await;
        assert_eq!(body["error"]["type"], "not_found");
    }

    #[tokio::test]
    async fn test_expired_drive_access_reports_auth_expired() {
        let drive_app = Router::new().route(
            "/drive/files",
            get(|| async { (StatusCode::UNAUTHORIZED, "Invalid Credentials") }),
        );
        let addr = serve(drive_app).await;
        let (state, cookie) = state_with_session(addr).await;
        let app = router().with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/drive/files")
                    .header("cookie", cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["error"]["type"], "auth_expired");
        assert_eq!(
            body["error"]["message"],
            "Your Google Drive access has expired. Please log in again."
        );
    }

    #[tokio::test]
    async fn test_drive_fault_reports_remote_error() {
        let drive_app = Router::new().route(
            "/drive/files",
            get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "backend error") }),
        );
        let addr = serve(drive_app).await;
        let (state, cookie) = state_with_session(addr).await;
        let app = router().with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/drive/files")
                    .header("cookie", cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(response).await;
        assert_eq!(body["error"]["type"], "remote_error");
    }

    #[tokio::test]
    async fn test_scopeless_bearer_rejected_on_drive_route() {
        // tokeninfo validates the token but reports no drive scope
        let provider_app = Router::new().route(
            "/tokeninfo",
            axum_post(|Form(_): Form<HashMap<String, String>>| async {
                Json(serde_json::json!({"scope": "openid email", "expires_in": "3599"}))
            }),
        );
        let provider = serve(provider_app).await;

        let drive_app = Router::new();
        let addr = serve(drive_app).await;
        let (mut state, _) = state_with_session(addr).await;
        state.oauth = GoogleOAuth::new(
            "client-123",
            Secret::new(String::from("shh")),
            "http://localhost:5000/api/auth/google/callback",
        )
        .with_tokeninfo_endpoint(format!("http://{provider}/tokeninfo"));
        let app = router().with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/drive/files")
                    .header("authorization", "Bearer ya29.scopeless")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::FORBIDDEN);
        let body = body_json(response).await;
        assert_eq!(body["error"]["type"], "insufficient_scope");
        assert_eq!(body["error"]["required_scope"], DRIVE_FILE_SCOPE);
    }

    #[tokio::test]
    async fn test_save_then_fetch_round_trip() {
        // Stateful mock Drive: stores what save uploads, serves it back
        let stored: Arc<Mutex<HashMap<String, (String, String)>>> =
            Arc::new(Mutex::new(HashMap::new()));

        let upload_store = stored.clone();
        let meta_store = stored.clone();
        let export_store = stored.clone();
        let drive_app = Router::new()
            .route(
                "/upload/files",
                axum_post(move |body: String| {
                    let store = upload_store.clone();
                    async move {
                        // multipart/related: metadata part, then content part
                        let parts: Vec<&str> = body.split("\r\n\r\n").collect();
                        let metadata: serde_json::Value =
                            serde_json::from_str(parts[1].split("\r\n--").next().unwrap()).unwrap();
                        let content = parts[2].split("\r\n--").next().unwrap().to_string();
                        let name = metadata["name"].as_str().unwrap().to_string();
                        store
                            .lock()
                            .unwrap()
                            .insert("letter-1".to_string(), (name.clone(), content));
                        Json(serde_json::json!({
                            "id": "letter-1",
                            "name": name,
                            "webViewLink": "https://docs.google.com/document/d/letter-1"
                        }))
                    }
                }),
            )
            .route(
                "/drive/files/{id}",
                get(move |Path(id): Path<String>| {
                    let store = meta_store.clone();
                    async move {
                        let name = store.lock().unwrap().get(&id).unwrap().0.clone();
                        Json(serde_json::json!({
                            "id": id,
                            "name": name,
                            "mimeType": DOC_MIME_TYPE
                        }))
                    }
                }),
            )
            .route(
                "/drive/files/{id}/export",
                get(move |Path(id): Path<String>| {
                    let store = export_store.clone();
                    async move { store.lock().unwrap().get(&id).unwrap().1.clone() }
                }),
            );
        let addr = serve(drive_app).await;
        let (state, cookie) = state_with_session(addr).await;
        let app = router().with_state(state);

        let save_response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/drive/save")
                    .header("cookie", cookie.clone())
                    .header("content-type", "application/json")
                    .body(Body::from(
                        serde_json::json!({
                            "name": "Round Trip",
                            "content": "Dear reader,\n\nUntil soon."
                        })
                        .to_string(),
                    ))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(save_response.status(), StatusCode::OK);
        let saved = body_json(save_response).await;
        assert_eq!(saved["fileId"], "letter-1");

        let content_response = app
            .oneshot(
                Request::builder()
                    .uri("/api/drive/files/letter-1/content")
                    .header("cookie", cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(content_response.status(), StatusCode::OK);
        let fetched = body_json(content_response).await;
        assert_eq!(fetched["name"], "Round Trip");
        assert_eq!(fetched["content"], "Dear reader,\n\nUntil soon.");
    }

    #[tokio::test]
    async fn test_probe_lists_one_file_and_reports_count() {
        let drive_app = Router::new().route(
            "/drive/files",
            get(
                |axum::extract::Query(q): axum::extract::Query<HashMap<String, String>>| async move {
                    assert_eq!(
                        q.get("pageSize").map(String::as_str),
                        Some("1"),
                        "probe must list one file"
                    );
                    Json(serde_json::json!({"files": [{"id": "a", "name": "One"}]}))
                },
            ),
        );
        let addr = serve(drive_app).await;
        let (state, cookie) = state_with_session(addr).await;
        let app = router().with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/drive/test")
                    .header("cookie", cookie)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["success"], true);
        assert_eq!(body["message"], "Google Drive API connection successful");
        assert_eq!(body["fileCount"], 1);
    }

    #[tokio::test]
    async fn test_unauthenticated_drive_route_rejected() {
        let drive_app = Router::new();
        let addr = serve(drive_app).await;
        let (state, _) = state_with_session(addr).await;
        let app = router().with_state(state);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/drive/files")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_json(response).await;
        assert_eq!(body["error"]["type"], "unauthenticated");
    }
}
