//! Google OAuth 2.0 endpoint and scope constants
//!
//! Public endpoint URLs for Google's OAuth infrastructure. None of these are
//! secrets: the client ID and redirect URI come from service configuration,
//! and the client secret is loaded from the environment at startup.

/// Authorization endpoint (consent screen)
pub const AUTHORIZE_ENDPOINT: &str = "https://accounts.google.com/o/oauth2/v2/auth";

/// Token endpoint for code exchange and token refresh
pub const TOKEN_ENDPOINT: &str = "https://oauth2.googleapis.com/token";

/// Token introspection endpoint (reports scopes and remaining lifetime)
pub const TOKENINFO_ENDPOINT: &str = "https://oauth2.googleapis.com/tokeninfo";

/// OpenID Connect userinfo endpoint (profile after consent)
pub const USERINFO_ENDPOINT: &str = "https://www.googleapis.com/oauth2/v3/userinfo";

/// The capability scope required to create and edit letters in Drive.
/// `drive.file` grants access only to files this application created,
/// never the user's whole Drive.
pub const DRIVE_FILE_SCOPE: &str = "https://www.googleapis.com/auth/drive.file";

/// Scopes requested at consent: identity (profile, email) plus file storage.
pub const SCOPES: &str = "profile email https://www.googleapis.com/auth/drive.file";
