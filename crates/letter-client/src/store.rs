//! Durable client-side token storage
//!
//! Holds the single active credential pair in a JSON file so tokens survive
//! process restarts, the way the browser app keeps them in local storage.
//! All writes are atomic temp-file + rename, and the file is created 0600
//! since it holds live OAuth tokens. A tokio Mutex serializes writers; reads
//! clone the small in-memory state.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::error::{Error, Result};

/// The persisted credential pair. At most one pair exists per store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoredTokens {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    access_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    refresh_token: Option<String>,
}

/// File-backed store for the active access/refresh token pair.
pub struct TokenStore {
    path: PathBuf,
    state: Mutex<StoredTokens>,
}

impl TokenStore {
    /// Load tokens from the given file path.
    ///
    /// A missing file is a logged-out store; it is created empty so later
    /// loads take the warm path.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let state = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading token file: {e}")))?;
            let tokens: StoredTokens = serde_json::from_str(&contents)
                .map_err(|e| Error::Parse(format!("parsing token file: {e}")))?;
            info!(path = %path.display(), authenticated = tokens.access_token.is_some(), "loaded tokens");
            tokens
        } else {
            info!(path = %path.display(), "token file not found, starting logged out");
            let tokens = StoredTokens::default();
            write_atomic(&path, &tokens).await?;
            tokens
        };

        Ok(Self {
            path,
            state: Mutex::new(state),
        })
    }

    /// Current access token, if one is stored.
    pub async fn access_token(&self) -> Option<String> {
        self.state.lock().await.access_token.clone()
    }

    /// Current refresh token, if one is stored.
    pub async fn refresh_token(&self) -> Option<String> {
        self.state.lock().await.refresh_token.clone()
    }

    /// Whether an access token is present.
    pub async fn is_authenticated(&self) -> bool {
        self.state.lock().await.access_token.is_some()
    }

    /// Store a fresh credential pair (login or re-consent) and persist.
    pub async fn set_pair(&self, access: String, refresh: Option<String>) -> Result<()> {
        let mut state = self.state.lock().await;
        state.access_token = Some(access);
        state.refresh_token = refresh;
        debug!("stored credential pair");
        write_atomic(&self.path, &state).await
    }

    /// Replace only the access token after a refresh; the refresh token
    /// stays as issued at consent.
    pub async fn set_access_token(&self, access: String) -> Result<()> {
        let mut state = self.state.lock().await;
        state.access_token = Some(access);
        debug!("stored refreshed access token");
        write_atomic(&self.path, &state).await
    }

    /// Drop both tokens and persist the empty state (logout or rejected
    /// refresh).
    pub async fn clear(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.access_token = None;
        state.refresh_token = None;
        debug!("cleared stored tokens");
        write_atomic(&self.path, &state).await
    }
}

/// Write tokens to a file atomically.
///
/// Writes to a temporary file in the same directory, then renames it over
/// the target, so a crash mid-write never corrupts the store. Permissions
/// are 0600 (owner read/write only) because the file holds live tokens.
async fn write_atomic(path: &Path, data: &StoredTokens) -> Result<()> {
    let json = serde_json::to_string_pretty(data)
        .map_err(|e| Error::Parse(format!("serializing tokens: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("token path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".tokens.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp token file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting token file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp token file: {e}")))?;

    debug!(path = %path.display(), "persisted tokens");
    Ok(())
}
