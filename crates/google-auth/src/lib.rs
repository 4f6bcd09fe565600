//! Google OAuth 2.0 identity-provider client
//!
//! Covers the provider-facing half of authentication: PKCE + state
//! generation, consent-URL building, authorization-code exchange, refresh
//! grants, bearer-token introspection, and the userinfo profile fetch. This
//! crate is a standalone library with no dependency on the API service; it
//! can be tested and used independently.
//!
//! Login flow:
//! 1. Service calls `pkce::generate_state()` + `pkce::generate_verifier()` +
//!    `pkce::compute_challenge()` and parks the pair in its pending-login map
//! 2. Browser is redirected to `GoogleOAuth::authorization_url()`
//! 3. Callback hands the code to `GoogleOAuth::exchange_code()`
//! 4. `GoogleOAuth::fetch_profile()` identifies the consenting user
//! 5. Later, `GoogleOAuth::refresh_token()` mints replacement access tokens
//!    and `GoogleOAuth::token_info()` validates presented bearer tokens

pub mod constants;
pub mod error;
pub mod introspect;
pub mod oauth;
pub mod pkce;
pub mod profile;

pub use constants::*;
pub use error::{Error, Result};
pub use introspect::TokenInfo;
pub use oauth::{GoogleOAuth, TokenResponse};
pub use pkce::{compute_challenge, generate_state, generate_verifier};
pub use profile::Profile;
