//! Configuration types and loading
//!
//! Config precedence: CLI args > env vars > config file > defaults.
//! The Google client secret is loaded from the GOOGLE_CLIENT_SECRET env var
//! or client_secret_file, never stored in the TOML directly to avoid leaking
//! secrets.

use common::Secret;
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};

/// Root configuration
#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub google: GoogleConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

/// HTTP server settings
#[derive(Debug, Deserialize)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// Origin the browser app is served from. Used for post-login redirects
    /// and as the allowed CORS origin.
    pub frontend_url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: usize,
}

/// Google OAuth client registration, plus endpoint overrides so a test or
/// staging deployment can point at a local provider.
#[derive(Debug, Deserialize)]
pub struct GoogleConfig {
    pub client_id: String,
    pub redirect_uri: String,
    #[serde(skip)]
    pub client_secret: Option<Secret<String>>,
    /// Path to a file containing the client secret (alternative to the
    /// GOOGLE_CLIENT_SECRET env var)
    #[serde(default)]
    pub client_secret_file: Option<PathBuf>,
    #[serde(default)]
    pub authorize_url: Option<String>,
    #[serde(default)]
    pub token_url: Option<String>,
    #[serde(default)]
    pub tokeninfo_url: Option<String>,
    #[serde(default)]
    pub userinfo_url: Option<String>,
    #[serde(default)]
    pub drive_api_url: Option<String>,
    #[serde(default)]
    pub drive_upload_url: Option<String>,
}

/// Session store and cookie settings
#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_session_ttl")]
    pub ttl_secs: u64,
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    /// Set the cookie's Secure attribute (off for plain-HTTP dev setups)
    #[serde(default)]
    pub cookie_secure: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_session_ttl(),
            cookie_name: default_cookie_name(),
            cookie_secure: false,
        }
    }
}

fn default_max_connections() -> usize {
    1000
}

fn default_session_ttl() -> u64 {
    86_400 // 24 hours
}

fn default_cookie_name() -> String {
    "letter_session".to_string()
}

impl Config {
    /// Load configuration from a TOML file, then overlay environment variables.
    ///
    /// Client secret resolution order:
    /// 1. GOOGLE_CLIENT_SECRET env var
    /// 2. client_secret_file path from config
    pub fn load(path: &Path) -> common::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if config.google.client_id.trim().is_empty() {
            return Err(common::Error::Config(
                "google.client_id must not be empty".into(),
            ));
        }

        // Validate URLs carry an http(s) scheme
        if !has_http_scheme(&config.google.redirect_uri) {
            return Err(common::Error::Config(format!(
                "redirect_uri must start with http:// or https://, got: {}",
                config.google.redirect_uri
            )));
        }
        if !has_http_scheme(&config.server.frontend_url) {
            return Err(common::Error::Config(format!(
                "frontend_url must start with http:// or https://, got: {}",
                config.server.frontend_url
            )));
        }

        if config.session.ttl_secs == 0 {
            return Err(common::Error::Config(
                "session.ttl_secs must be greater than 0".into(),
            ));
        }

        if config.server.max_connections == 0 {
            return Err(common::Error::Config(
                "max_connections must be greater than 0".into(),
            ));
        }

        // Resolve client secret: env var takes precedence over file
        if let Ok(secret) = std::env::var("GOOGLE_CLIENT_SECRET") {
            config.google.client_secret = Some(Secret::new(secret));
        } else if let Some(ref secret_file) = config.google.client_secret_file {
            let secret = std::fs::read_to_string(secret_file).map_err(|e| {
                common::Error::Config(format!(
                    "failed to read client_secret_file {}: {e}",
                    secret_file.display()
                ))
            })?;
            let secret = secret.trim().to_owned();
            if !secret.is_empty() {
                config.google.client_secret = Some(Secret::new(secret));
            }
        }

        Ok(config)
    }

    /// Resolve config file path from CLI arg or CONFIG_PATH env var.
    pub fn resolve_path(cli_path: Option<&str>) -> PathBuf {
        if let Some(p) = cli_path {
            return PathBuf::from(p);
        }
        if let Ok(p) = std::env::var("CONFIG_PATH") {
            return PathBuf::from(p);
        }
        PathBuf::from("letter-api.toml")
    }
}

fn has_http_scheme(url: &str) -> bool {
    url.starts_with("http://") || url.starts_with("https://")
}
