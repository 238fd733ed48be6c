//! OAuth 2.0 types and structures
//!
//! Defines the persisted token record, token endpoint response shapes, and
//! provider configuration used across the session core.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Safety margin subtracted from the provider's `expires_in` when computing
/// the absolute expiry. A token is treated as expired this many seconds
/// before the provider would actually reject it, absorbing clock skew and
/// request latency.
pub const EXPIRY_BUFFER_SECS: i64 = 60;

/// OAuth access/refresh token bundle with its computed expiry
///
/// Owned exclusively by the session manager. Persisted in a single
/// well-known storage slot and overwritten wholesale on every issue or
/// refresh, never partially updated.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Bearer access token for API authentication
    pub access_token: String,

    /// Refresh token for obtaining new access tokens
    /// Optional because some providers stop issuing one on refresh
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Absolute expiration timestamp, already including the safety buffer.
    /// Serialized as epoch milliseconds.
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub expires_at: DateTime<Utc>,

    /// Granted scopes (space-separated)
    pub scope: String,
}

impl TokenRecord {
    /// Build a record from a token endpoint response
    ///
    /// `expires_at` is `issued_at + expires_in - EXPIRY_BUFFER_SECS`, so
    /// validity checks compare raw `now` against it without re-applying the
    /// buffer.
    #[must_use]
    pub fn from_response(response: TokenResponse, issued_at: DateTime<Utc>) -> Self {
        let expires_at =
            issued_at + Duration::seconds(response.expires_in - EXPIRY_BUFFER_SECS);

        Self {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            expires_at,
            scope: response.scope.unwrap_or_default(),
        }
    }

    /// Check whether the access token is past its (buffered) expiry
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Get seconds until expiry (negative once expired)
    #[must_use]
    pub fn seconds_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        (self.expires_at - now).num_seconds()
    }
}

/// Token response from the authorization server
///
/// Standard OAuth 2.0 token response format (RFC 6749).
/// Deserializes responses from the token endpoint for both the
/// `authorization_code` and `refresh_token` grants.
#[derive(Debug, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: i64,
    pub refresh_token: Option<String>,
    pub scope: Option<String>,
}

/// OAuth error response from the authorization server
///
/// Standard OAuth 2.0 error response format (RFC 6749 §5.2).
#[derive(Debug, Deserialize)]
pub struct ProviderErrorBody {
    pub error: String,
    pub error_description: Option<String>,
}

impl fmt::Display for ProviderErrorBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_description {
            Some(desc) => write!(f, "{}: {}", self.error, desc),
            None => write!(f, "{}", self.error),
        }
    }
}

impl std::error::Error for ProviderErrorBody {}

/// Error type for provider configuration loading
#[derive(Debug)]
pub enum ConfigError {
    /// Client id is not configured
    MissingClientId,

    /// Redirect URI is not configured
    MissingRedirectUri,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingClientId => write!(f, "client id is not configured"),
            Self::MissingRedirectUri => write!(f, "redirect URI is not configured"),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Provider configuration for the authorization server
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// OAuth client ID
    pub client_id: String,

    /// Redirect URI (the application's callback route)
    pub redirect_uri: String,

    /// Authorization endpoint (GET redirect target)
    pub authorize_url: String,

    /// Token endpoint (POST, form-encoded)
    pub token_url: String,

    /// OAuth scopes to request
    pub scopes: Vec<String>,

    /// Always show the provider's consent dialog, even for returning users
    pub show_dialog: bool,
}

impl AuthConfig {
    /// Create a new provider configuration
    #[must_use]
    pub fn new(
        client_id: String,
        redirect_uri: String,
        authorize_url: String,
        token_url: String,
        scopes: Vec<String>,
    ) -> Self {
        Self { client_id, redirect_uri, authorize_url, token_url, scopes, show_dialog: true }
    }

    /// Load configuration from the environment
    ///
    /// Reads `CADENZA_CLIENT_ID` and `CADENZA_REDIRECT_URI` (a `.env` file is
    /// honored if present). Endpoint URLs default to the streaming provider's
    /// account service and can be overridden with `CADENZA_AUTHORIZE_URL` /
    /// `CADENZA_TOKEN_URL`.
    ///
    /// # Errors
    /// Returns `ConfigError` if the client id or redirect URI is absent, so
    /// misconfiguration fails fast before any network call.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();

        let client_id =
            std::env::var("CADENZA_CLIENT_ID").map_err(|_| ConfigError::MissingClientId)?;
        let redirect_uri =
            std::env::var("CADENZA_REDIRECT_URI").map_err(|_| ConfigError::MissingRedirectUri)?;

        let authorize_url = std::env::var("CADENZA_AUTHORIZE_URL")
            .unwrap_or_else(|_| "https://accounts.spotify.com/authorize".to_string());
        let token_url = std::env::var("CADENZA_TOKEN_URL")
            .unwrap_or_else(|_| "https://accounts.spotify.com/api/token".to_string());

        Ok(Self::new(
            client_id,
            redirect_uri,
            authorize_url,
            token_url,
            vec![
                "user-read-private".to_string(),
                "user-read-email".to_string(),
                "streaming".to_string(),
            ],
        ))
    }

    /// Get scopes as a space-separated string
    #[must_use]
    pub fn scope_string(&self) -> String {
        self.scopes.join(" ")
    }
}
