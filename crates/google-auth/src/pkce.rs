//! PKCE (Proof Key for Code Exchange) per RFC 7636, plus CSRF state
//!
//! Generates the code verifier and S256 challenge used during the consent
//! flow. The verifier is held server-side in the pending-login map and sent
//! during token exchange; the challenge travels in the authorization URL so
//! Google can verify the exchange request came from the party that started
//! the flow. The `state` value rides the same round trip and ties the
//! callback to a login this service actually initiated.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngExt;
use sha2::{Digest, Sha256};

/// Generate a cryptographically random PKCE code verifier.
///
/// 64 random bytes encoded as URL-safe base64 (no padding) give 86
/// characters. RFC 7636 requires 43-128 characters and Google enforces the
/// upper bound, so the verifier sits in the middle of the allowed range.
pub fn generate_verifier() -> String {
    let mut bytes = [0u8; 64];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Generate a random `state` value for the authorization round trip.
///
/// 32 random bytes, URL-safe base64. Unguessable, single-use; the callback
/// handler rejects any state it did not hand out.
pub fn generate_state() -> String {
    let mut bytes = [0u8; 32];
    rand::rng().fill(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Compute the S256 code challenge from a verifier.
///
/// `challenge = BASE64URL(SHA256(verifier))`
pub fn compute_challenge(verifier: &str) -> String {
    let hash = Sha256::digest(verifier.as_bytes());
    URL_SAFE_NO_PAD.encode(hash)
}
