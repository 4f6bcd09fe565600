//! Google Drive v3 client for letter files
//!
//! Thin typed wrapper over the Drive REST surface this system uses:
//! `files.create` (multipart upload with Google Doc conversion),
//! `files.list`, `files.get` (metadata and `alt=media` download),
//! `files.export`, and the two-part update (metadata PATCH + media upload).
//!
//! `DriveClient` holds no credentials. Each request binds a caller's access
//! token into a short-lived `DriveHandle`, so tokens never leak across
//! requests.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{Error, Result};

/// Drive REST API base (metadata, list, export, download)
pub const DRIVE_API_BASE: &str = "https://www.googleapis.com/drive/v3";

/// Drive upload base (content create and replace)
pub const DRIVE_UPLOAD_BASE: &str = "https://www.googleapis.com/upload/drive/v3";

/// MIME type for Google Docs; uploads converted to this type get rich
/// editing in Drive and must be exported (not downloaded) to read back.
pub const DOC_MIME_TYPE: &str = "application/vnd.google-apps.document";

/// File name used when a save request does not provide one.
pub const DEFAULT_LETTER_NAME: &str = "Letter.txt";

/// Metadata for one remote letter file. Field names mirror the Drive API's
/// camelCase, which is also the shape this system serves to its own callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DriveFile {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web_view_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub modified_time: Option<String>,
}

impl DriveFile {
    /// Whether this file is a Google Doc (export required to read content).
    pub fn is_google_doc(&self) -> bool {
        self.mime_type.as_deref() == Some(DOC_MIME_TYPE)
    }
}

#[derive(Debug, Deserialize)]
struct FileList {
    #[serde(default)]
    files: Vec<DriveFile>,
}

/// Unauthenticated Drive client: HTTP pool plus base URLs.
///
/// Cheap to clone; base URLs are overridable so tests can stand in a local
/// Drive.
#[derive(Clone)]
pub struct DriveClient {
    http: reqwest::Client,
    api_base: String,
    upload_base: String,
}

impl DriveClient {
    /// Client against Google's production Drive endpoints.
    pub fn new() -> Self {
        Self::with_base_urls(DRIVE_API_BASE, DRIVE_UPLOAD_BASE)
    }

    /// Client against explicit API and upload bases.
    pub fn with_base_urls(api_base: impl Into<String>, upload_base: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_base: api_base.into(),
            upload_base: upload_base.into(),
        }
    }

    /// Bind an access token, producing a handle scoped to one caller.
    pub fn bind(&self, access_token: impl Into<String>) -> DriveHandle {
        DriveHandle {
            http: self.http.clone(),
            api_base: self.api_base.clone(),
            upload_base: self.upload_base.clone(),
            token: access_token.into(),
        }
    }
}

impl Default for DriveClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Drive client bound to a single caller's access token.
pub struct DriveHandle {
    http: reqwest::Client,
    api_base: String,
    upload_base: String,
    token: String,
}

impl DriveHandle {
    /// Create a letter as a Google Doc and return `id, name, webViewLink`.
    ///
    /// Uses a multipart/related upload: a JSON metadata part naming the file
    /// and requesting Doc conversion, then the plain-text content part.
    pub async fn create_letter(&self, name: &str, content: &str) -> Result<DriveFile> {
        let metadata = serde_json::json!({
            "name": name,
            "mimeType": DOC_MIME_TYPE,
        });
        let boundary = format!("letter_{}", uuid::Uuid::new_v4().as_simple());
        let body = multipart_related(&metadata, content, &boundary);

        let response = self
            .http
            .post(format!("{}/files", self.upload_base))
            .query(&[("uploadType", "multipart"), ("fields", "id, name, webViewLink")])
            .bearer_auth(&self.token)
            .header(
                reqwest::header::CONTENT_TYPE,
                format!("multipart/related; boundary={boundary}"),
            )
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Http(format!("create request failed: {e}")))?;

        let response = ensure_success(response, "creating letter").await?;
        let file = response
            .json::<DriveFile>()
            .await
            .map_err(|e| Error::Decode(format!("create response: {e}")))?;
        debug!(file_id = %file.id, name = %file.name, "created letter");
        Ok(file)
    }

    /// List letters: non-trashed, newest-modified first, capped at 10.
    pub async fn list_letters(&self) -> Result<Vec<DriveFile>> {
        let response = self
            .http
            .get(format!("{}/files", self.api_base))
            .query(&[
                ("q", "trashed = false"),
                ("orderBy", "modifiedTime desc"),
                ("pageSize", "10"),
                ("fields", "files(id, name, mimeType, webViewLink, createdTime, modifiedTime)"),
            ])
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| Error::Http(format!("list request failed: {e}")))?;

        let response = ensure_success(response, "listing letters").await?;
        let list = response
            .json::<FileList>()
            .await
            .map_err(|e| Error::Decode(format!("list response: {e}")))?;
        Ok(list.files)
    }

    /// Cheapest authenticated round trip: list a single file, id and name
    /// only. A success proves the token works and Drive answers without
    /// pulling a whole page of metadata.
    pub async fn probe(&self) -> Result<Vec<DriveFile>> {
        let response = self
            .http
            .get(format!("{}/files", self.api_base))
            .query(&[("pageSize", "1"), ("fields", "files(id, name)")])
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| Error::Http(format!("probe request failed: {e}")))?;

        let response = ensure_success(response, "probing Drive").await?;
        let list = response
            .json::<FileList>()
            .await
            .map_err(|e| Error::Decode(format!("probe response: {e}")))?;
        Ok(list.files)
    }

    /// Fetch metadata for one file with an explicit `fields` selection.
    pub async fn metadata(&self, file_id: &str, fields: &str) -> Result<DriveFile> {
        let response = self
            .http
            .get(format!("{}/files/{file_id}", self.api_base))
            .query(&[("fields", fields)])
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| Error::Http(format!("metadata request failed: {e}")))?;

        let response = ensure_success(response, file_id).await?;
        response
            .json::<DriveFile>()
            .await
            .map_err(|e| Error::Decode(format!("metadata response: {e}")))
    }

    /// Export a Google Doc to plain text.
    pub async fn export_text(&self, file_id: &str) -> Result<String> {
        let response = self
            .http
            .get(format!("{}/files/{file_id}/export", self.api_base))
            .query(&[("mimeType", "text/plain")])
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| Error::Http(format!("export request failed: {e}")))?;

        let response = ensure_success(response, file_id).await?;
        response
            .text()
            .await
            .map_err(|e| Error::Decode(format!("export body: {e}")))
    }

    /// Download a non-Doc file's bytes as text (`alt=media`).
    pub async fn download_text(&self, file_id: &str) -> Result<String> {
        let response = self
            .http
            .get(format!("{}/files/{file_id}", self.api_base))
            .query(&[("alt", "media")])
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| Error::Http(format!("download request failed: {e}")))?;

        let response = ensure_success(response, file_id).await?;
        response
            .text()
            .await
            .map_err(|e| Error::Decode(format!("download body: {e}")))
    }

    /// Rename a file (metadata-only PATCH).
    pub async fn rename(&self, file_id: &str, name: &str) -> Result<()> {
        let response = self
            .http
            .patch(format!("{}/files/{file_id}", self.api_base))
            .bearer_auth(&self.token)
            .json(&serde_json::json!({ "name": name }))
            .send()
            .await
            .map_err(|e| Error::Http(format!("rename request failed: {e}")))?;

        ensure_success(response, file_id).await?;
        debug!(file_id, name, "renamed letter");
        Ok(())
    }

    /// Replace a file's content with new plain text (media upload PATCH).
    pub async fn replace_content(&self, file_id: &str, content: &str) -> Result<()> {
        let response = self
            .http
            .patch(format!("{}/files/{file_id}", self.upload_base))
            .query(&[("uploadType", "media")])
            .bearer_auth(&self.token)
            .header(reqwest::header::CONTENT_TYPE, "text/plain; charset=UTF-8")
            .body(content.to_string())
            .send()
            .await
            .map_err(|e| Error::Http(format!("content update request failed: {e}")))?;

        ensure_success(response, file_id).await?;
        debug!(file_id, bytes = content.len(), "replaced letter content");
        Ok(())
    }
}

/// Map upstream failure statuses to the error taxonomy.
///
/// 401 means our access token is no longer good (expired or revoked); 404
/// means the file reference is stale. Both get their own variants because
/// callers react differently to each.
async fn ensure_success(response: reqwest::Response, context: &str) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| String::from("<no body>"));
    debug!(status = %status, context, "Drive call failed");
    match status.as_u16() {
        401 => Err(Error::AccessExpired),
        404 => Err(Error::NotFound(context.to_string())),
        code => Err(Error::Upstream {
            status: code,
            body: format!("{context}: {body}"),
        }),
    }
}

/// Assemble a multipart/related body: JSON metadata part, then text content.
fn multipart_related(metadata: &serde_json::Value, content: &str, boundary: &str) -> String {
    format!(
        "--{boundary}\r\nContent-Type: application/json; charset=UTF-8\r\n\r\n{metadata}\r\n--{boundary}\r\nContent-Type: text/plain; charset=UTF-8\r\n\r\n{content}\r\n--{boundary}--\r\n"
    )
}
