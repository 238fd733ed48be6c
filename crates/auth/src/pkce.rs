//! PKCE (Proof Key for Code Exchange) implementation for OAuth 2.0
//!
//! Implements RFC 7636 for secure OAuth authorization without client secrets.
//! The verifier is generated fresh for every initiation attempt, kept secret
//! until token exchange, and never reused.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rand::Rng;
use sha2::{Digest, Sha256};

/// Generate a cryptographically secure code verifier
///
/// Returns a URL-safe base64-encoded random string of 32 bytes (43 characters).
/// Per RFC 7636, verifiers must be 43-128 characters long.
#[must_use]
pub fn generate_code_verifier() -> String {
    let mut rng = rand::thread_rng();
    let random_bytes: [u8; 32] = rng.gen();
    URL_SAFE_NO_PAD.encode(random_bytes)
}

/// Generate code challenge from verifier using SHA256
///
/// Per RFC 7636, the challenge is BASE64URL(SHA256(ASCII(code_verifier))).
/// Pure and deterministic: the same verifier always yields the same challenge.
#[must_use]
pub fn generate_code_challenge(verifier: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(verifier.as_bytes());
    let hash = hasher.finalize();
    URL_SAFE_NO_PAD.encode(hash)
}

/// Generate a random state token
///
/// Returns a URL-safe base64-encoded random string of 32 bytes (43 characters).
/// The state doubles as CSRF protection and as the correlation key that links
/// a callback to the verifier persisted at initiation.
#[must_use]
pub fn generate_state() -> String {
    let mut rng = rand::thread_rng();
    let random_bytes: [u8; 32] = rng.gen();
    URL_SAFE_NO_PAD.encode(random_bytes)
}

/// PKCE challenge pair for OAuth 2.0 authorization
///
/// Contains the code verifier (sent during token exchange) and the
/// code challenge (sent during the authorization request).
#[derive(Debug, Clone)]
pub struct PkceChallenge {
    /// Random string (43-128 chars, base64url encoded)
    /// Kept secret until token exchange
    pub code_verifier: String,

    /// SHA256 hash of `code_verifier` (base64url encoded)
    /// Sent in the authorization request for server validation
    pub code_challenge: String,
}

impl PkceChallenge {
    /// Generate a new PKCE challenge pair with cryptographically secure
    /// random values
    ///
    /// # Examples
    /// ```
    /// use cadenza_auth::pkce::PkceChallenge;
    ///
    /// let challenge = PkceChallenge::generate();
    /// assert!(challenge.code_verifier.len() >= 43);
    /// assert!(challenge.code_verifier.len() <= 128);
    /// ```
    #[must_use]
    pub fn generate() -> Self {
        let code_verifier = generate_code_verifier();
        let code_challenge = generate_code_challenge(&code_verifier);

        Self { code_verifier, code_challenge }
    }

    /// Get the challenge method (always "S256" for SHA256)
    #[must_use]
    pub fn challenge_method(&self) -> &str {
        "S256"
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for pkce.
    use super::*;

    /// Validates `PkceChallenge::generate` output against the RFC 7636
    /// length and charset requirements.
    #[test]
    fn test_generate_pkce_challenge() {
        let challenge = PkceChallenge::generate();

        // RFC 7636: 43-128 chars
        assert!(
            challenge.code_verifier.len() >= 43,
            "code_verifier too short: {} chars",
            challenge.code_verifier.len()
        );
        assert!(
            challenge.code_verifier.len() <= 128,
            "code_verifier too long: {} chars",
            challenge.code_verifier.len()
        );

        assert!(!challenge.code_challenge.is_empty());
        assert_eq!(challenge.challenge_method(), "S256");
    }

    /// Each generation must produce unique values.
    #[test]
    fn test_unique_challenges() {
        let challenge1 = PkceChallenge::generate();
        let challenge2 = PkceChallenge::generate();

        assert_ne!(challenge1.code_verifier, challenge2.code_verifier);
        assert_ne!(challenge1.code_challenge, challenge2.code_challenge);
    }

    /// Verifier, challenge, and state must use the URL-safe base64 alphabet
    /// with no padding characters.
    #[test]
    fn test_base64url_encoding() {
        let challenge = PkceChallenge::generate();
        let state = generate_state();

        let url_safe =
            |s: &str| s.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');

        assert!(url_safe(&challenge.code_verifier));
        assert!(url_safe(&challenge.code_challenge));
        assert!(url_safe(&state));

        assert!(!challenge.code_verifier.contains('='));
        assert!(!challenge.code_challenge.contains('='));
        assert!(!state.contains('='));
    }

    /// Same verifier must always produce the same challenge.
    #[test]
    fn test_code_challenge_deterministic() {
        let challenge = PkceChallenge::generate();

        let recomputed = generate_code_challenge(&challenge.code_verifier);

        assert_eq!(challenge.code_challenge, recomputed);
    }

    /// Known SHA256 vector from RFC 7636 appendix B.
    #[test]
    fn test_code_challenge_known_vector() {
        let challenge = generate_code_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk");
        assert_eq!(challenge, "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM");
    }

    #[test]
    fn test_state_uniqueness() {
        let state1 = generate_state();
        let state2 = generate_state();

        assert_ne!(state1, state2);
        assert!(state1.len() >= 32);
    }
}
