//! Client library for the letter API
//!
//! The consumer-side counterpart of the service: a durable token store plus
//! an API client whose every Drive call rides through the refresh
//! coordinator (401 → refresh → retry exactly once). This is what the
//! browser app's auth context does, packaged for any Rust caller.
//!
//! Typical flow:
//! 1. Open `ApiClient::login_url()` in a browser and complete consent
//! 2. Hand the redirect URL to `ApiClient::capture_redirect()`: tokens
//!    move into the store, the URL comes back stripped
//! 3. Call `save_letter` / `list_letters` / `letter_content` /
//!    `update_letter`; expiry is handled transparently
//! 4. `logout()` drops the session and the stored pair

pub mod client;
pub mod error;
pub mod store;

pub use client::{
    ApiClient, AuthStatus, LetterContent, LetterEntry, SaveResponse, TokenStatus, UserInfo,
};
pub use error::{Error, Result};
pub use store::TokenStore;
