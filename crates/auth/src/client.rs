//! Token endpoint client
//!
//! Single-purpose HTTP client for the provider's token endpoint:
//! authorization-code exchange and refresh-token grants, both as
//! form-encoded POSTs per RFC 6749. The PKCE verifier is passed in by the
//! caller; this client holds no per-flow state.

use reqwest::Client;

use super::types::{AuthConfig, ProviderErrorBody, TokenResponse};

/// Error type for token endpoint operations
#[derive(Debug)]
pub enum TokenClientError {
    /// HTTP request failed before a response was received
    RequestFailed(reqwest::Error),

    /// The provider rejected the grant
    Provider(ProviderErrorBody),

    /// Response body could not be parsed
    Parse(String),
}

impl std::fmt::Display for TokenClientError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RequestFailed(e) => write!(f, "HTTP request failed: {e}"),
            Self::Provider(e) => write!(f, "provider error: {e}"),
            Self::Parse(msg) => write!(f, "parse error: {msg}"),
        }
    }
}

impl std::error::Error for TokenClientError {}

impl From<reqwest::Error> for TokenClientError {
    fn from(err: reqwest::Error) -> Self {
        Self::RequestFailed(err)
    }
}

/// HTTP client for the provider token endpoint
#[derive(Debug, Clone)]
pub struct TokenClient {
    config: AuthConfig,
    http: Client,
}

impl TokenClient {
    /// Create a new token client for the given provider configuration
    #[must_use]
    pub fn new(config: AuthConfig) -> Self {
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self { config, http }
    }

    /// Exchange an authorization code for tokens
    ///
    /// # Arguments
    /// * `code` - Authorization code from the redirect callback
    /// * `verifier` - PKCE code verifier persisted at initiation
    ///
    /// # Errors
    /// Returns an error if the request fails, the provider rejects the
    /// grant, or the response cannot be parsed.
    pub async fn exchange_code(
        &self,
        code: &str,
        verifier: &str,
    ) -> Result<TokenResponse, TokenClientError> {
        let body = [
            ("client_id", self.config.client_id.as_str()),
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("code_verifier", verifier),
        ];

        self.post_form(&body).await
    }

    /// Obtain a new access token with a refresh token
    ///
    /// # Errors
    /// Returns an error if the request fails, the refresh token is rejected
    /// (revoked or stale), or the response cannot be parsed.
    pub async fn refresh(&self, refresh_token: &str) -> Result<TokenResponse, TokenClientError> {
        let body = [
            ("client_id", self.config.client_id.as_str()),
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token),
        ];

        self.post_form(&body).await
    }

    /// Get the provider configuration
    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    async fn post_form(
        &self,
        body: &[(&str, &str)],
    ) -> Result<TokenResponse, TokenClientError> {
        let response = self.http.post(&self.config.token_url).form(body).send().await?;

        if !response.status().is_success() {
            let error: ProviderErrorBody = response
                .json()
                .await
                .map_err(|e| TokenClientError::Parse(e.to_string()))?;
            return Err(TokenClientError::Provider(error));
        }

        response.json().await.map_err(|e| TokenClientError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    //! Unit tests for client.
    use super::*;

    fn create_test_config() -> AuthConfig {
        AuthConfig::new(
            "test_client_id".to_string(),
            "http://localhost:3000/callback".to_string(),
            "https://accounts.example.com/authorize".to_string(),
            "https://accounts.example.com/api/token".to_string(),
            vec!["user-read-private".to_string()],
        )
    }

    #[test]
    fn test_token_client_creation() {
        let client = TokenClient::new(create_test_config());
        assert_eq!(client.config().client_id, "test_client_id");
        assert_eq!(client.config().token_url, "https://accounts.example.com/api/token");
    }

    /// Provider errors must render both the code and the detail.
    #[test]
    fn test_error_display() {
        let err = TokenClientError::Provider(ProviderErrorBody {
            error: "invalid_grant".to_string(),
            error_description: Some("Authorization code expired".to_string()),
        });

        let rendered = err.to_string();
        assert!(rendered.contains("invalid_grant"));
        assert!(rendered.contains("Authorization code expired"));

        let parse = TokenClientError::Parse("unexpected body".to_string());
        assert!(parse.to_string().contains("unexpected body"));
    }
}
