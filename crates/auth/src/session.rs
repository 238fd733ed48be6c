//! Auth session manager
//!
//! Owns the OAuth state machine: initiation (redirect-out), callback
//! handling (code exchange), token persistence, validity checks, refresh,
//! and logout.
//!
//! The hosting shell performs a full navigation to the identity provider
//! and back, so nothing in memory survives between [`AuthSession::initiate_auth`]
//! and [`AuthSession::handle_callback`]. The pending verifier is persisted
//! under a key derived from the `state` parameter and read back through the
//! same store with the same key scheme; the store handle is the only bridge
//! across the redirect boundary.

use std::fmt;
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::client::{TokenClient, TokenClientError};
use super::clock::{Clock, SystemClock};
use super::pkce::{generate_state, PkceChallenge};
use super::storage::{KeyValueStore, StorageError};
use super::types::{AuthConfig, ConfigError, TokenRecord};

/// Storage slot holding the serialized [`TokenRecord`]
pub const TOKEN_KEY: &str = "cadenza.auth.token";

/// Key prefix for pending-verifier correlation markers; the `state`
/// parameter is appended to form the full key
pub const VERIFIER_KEY_PREFIX: &str = "cadenza.auth.verifier.";

/// Error type for session operations
///
/// These never cross the public boolean/option boundary; they are reduced
/// to `false`/`None` plus a diagnostic there.
#[derive(Debug)]
pub enum AuthError {
    /// Callback arrived with no matching stored verifier (storage cleared,
    /// wrong correlation value, or replay)
    MissingVerifier,

    /// Token endpoint rejected the authorization code exchange
    TokenExchangeFailed(TokenClientError),

    /// Token endpoint rejected the refresh grant; always escalates to a
    /// full logout
    TokenRefreshFailed(TokenClientError),

    /// The provider redirected back with an `error` parameter instead of a
    /// code
    ProviderError { error: String },

    /// Client configuration absent; fails before any network call
    CredentialsMissing(ConfigError),

    /// Persistence capability failed
    Storage(StorageError),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingVerifier => {
                write!(f, "no pending verifier matches the callback correlation")
            }
            Self::TokenExchangeFailed(e) => write!(f, "token exchange failed: {e}"),
            Self::TokenRefreshFailed(e) => write!(f, "token refresh failed: {e}"),
            Self::ProviderError { error } => {
                write!(f, "provider returned an authorization error: {error}")
            }
            Self::CredentialsMissing(e) => write!(f, "credentials missing: {e}"),
            Self::Storage(e) => write!(f, "session storage failed: {e}"),
        }
    }
}

impl std::error::Error for AuthError {}

impl From<StorageError> for AuthError {
    fn from(err: StorageError) -> Self {
        Self::Storage(err)
    }
}

impl From<serde_json::Error> for AuthError {
    fn from(err: serde_json::Error) -> Self {
        Self::Storage(StorageError::Serialization(err))
    }
}

impl From<ConfigError> for AuthError {
    fn from(err: ConfigError) -> Self {
        Self::CredentialsMissing(err)
    }
}

/// Query parameters delivered to the application's callback route
#[derive(Debug, Default, Clone)]
pub struct CallbackParams {
    /// Authorization code, present on success
    pub code: Option<String>,

    /// Correlation state echoed back by the provider
    pub state: Option<String>,

    /// Provider error code, present when authorization was denied
    pub error: Option<String>,
}

impl CallbackParams {
    /// Parse the callback parameters out of a full redirect URL
    ///
    /// # Errors
    /// Returns the underlying parse error when the input is not a valid URL.
    pub fn from_redirect_url(redirect_url: &str) -> Result<Self, url::ParseError> {
        let parsed = url::Url::parse(redirect_url)?;

        let mut params = Self::default();
        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "code" => params.code = Some(value.into_owned()),
                "state" => params.state = Some(value.into_owned()),
                "error" => params.error = Some(value.into_owned()),
                _ => {}
            }
        }

        Ok(params)
    }
}

/// OAuth session manager for the gallery shell
///
/// Constructed once at application start and handed to consumers; all state
/// lives in the injected store, so two instances over the same store observe
/// the same session.
pub struct AuthSession<S: KeyValueStore> {
    client: TokenClient,
    storage: Arc<S>,
    clock: Arc<dyn Clock>,
    refresh_gate: Mutex<()>,
}

impl<S: KeyValueStore> AuthSession<S> {
    /// Create a session manager using the system clock
    #[must_use]
    pub fn new(config: AuthConfig, storage: Arc<S>) -> Self {
        Self::with_clock(config, storage, Arc::new(SystemClock))
    }

    /// Create a session manager with an explicit clock (fake clocks in tests)
    #[must_use]
    pub fn with_clock(config: AuthConfig, storage: Arc<S>, clock: Arc<dyn Clock>) -> Self {
        Self { client: TokenClient::new(config), storage, clock, refresh_gate: Mutex::new(()) }
    }

    /// Start the authorization flow
    ///
    /// Generates a fresh PKCE pair, persists the verifier under a
    /// state-derived key, and returns the provider authorization URL for
    /// the shell to navigate to. Control does not come back to this call;
    /// the flow resumes in a new execution context on the callback route.
    ///
    /// # Errors
    /// Returns an error if the verifier cannot be persisted; initiation
    /// must abort rather than redirect without a stored verifier.
    pub async fn initiate_auth(&self) -> Result<String, AuthError> {
        let challenge = PkceChallenge::generate();
        let state = generate_state();

        // One live marker at a time: drop leftovers from abandoned attempts
        // before storing the new one.
        self.prune_pending_markers().await?;
        self.storage
            .set(&format!("{VERIFIER_KEY_PREFIX}{state}"), &challenge.code_verifier)
            .await?;

        let config = self.client.config();
        let scope_string = config.scope_string();
        let show_dialog = if config.show_dialog { "true" } else { "false" };

        let params = [
            ("client_id", config.client_id.as_str()),
            ("response_type", "code"),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("code_challenge_method", challenge.challenge_method()),
            ("code_challenge", challenge.code_challenge.as_str()),
            ("scope", scope_string.as_str()),
            ("show_dialog", show_dialog),
            ("state", state.as_str()),
        ];

        let query = params
            .iter()
            .map(|(k, v)| format!("{k}={}", urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");

        info!("authorization flow initiated");

        Ok(format!("{}?{}", config.authorize_url, query))
    }

    /// Complete the flow from the raw callback route parameters
    ///
    /// Handles the provider-denied case (`error` parameter) and missing
    /// parameters before delegating to [`Self::handle_callback`].
    pub async fn handle_redirect(&self, params: &CallbackParams) -> bool {
        if let Some(error) = &params.error {
            warn!("{}", AuthError::ProviderError { error: error.clone() });
            self.drop_pending_markers().await;
            return false;
        }

        match (&params.code, &params.state) {
            (Some(code), Some(state)) => self.handle_callback(code, state).await,
            _ => {
                warn!("callback route reached without code and state parameters");
                false
            }
        }
    }

    /// Exchange the authorization code delivered to the callback route
    ///
    /// Looks up the pending verifier by the echoed `state`, removes the
    /// marker whether or not the exchange succeeds, and persists the token
    /// record wholesale on success.
    ///
    /// Never panics or propagates an error: failures reduce to `false` with
    /// a logged diagnostic, leaving the session unauthenticated.
    pub async fn handle_callback(&self, code: &str, state: &str) -> bool {
        match self.complete_callback(code, state).await {
            Ok(()) => true,
            Err(e) => {
                warn!("authorization callback failed: {e}");
                false
            }
        }
    }

    /// Check whether a valid, unexpired token record exists
    pub async fn is_authenticated(&self) -> bool {
        match self.load_record().await {
            Some(record) => !record.is_expired(self.clock.now()),
            None => false,
        }
    }

    /// Get a currently valid access token
    ///
    /// Returns the stored token while it is unexpired. Past expiry, a
    /// present refresh token triggers an awaited refresh and its result is
    /// returned. Past expiry with no refresh token, the dead-end record is
    /// cleared and `None` is returned; the caller must re-authenticate.
    pub async fn get_access_token(&self) -> Option<String> {
        let record = self.load_record().await?;

        if !record.is_expired(self.clock.now()) {
            return Some(record.access_token);
        }

        if record.refresh_token.is_none() {
            debug!("access token expired with no refresh token; clearing session");
            self.remove_record().await;
            return None;
        }

        self.refresh_access_token().await
    }

    /// Refresh the access token using the stored refresh token
    ///
    /// Concurrent callers are coalesced: one performs the network refresh
    /// while the rest wait on the gate and then observe the fresh record.
    /// Any refresh failure clears the whole session; a stale or revoked
    /// refresh token will not succeed on immediate retry.
    pub async fn refresh_access_token(&self) -> Option<String> {
        let _gate = self.refresh_gate.lock().await;

        // A concurrent caller may have refreshed while this one waited on
        // the gate; the re-read token is current in that case.
        let record = self.load_record().await?;
        if !record.is_expired(self.clock.now()) {
            return Some(record.access_token);
        }

        let refresh_token = record.refresh_token.clone()?;

        match self.client.refresh(&refresh_token).await {
            Ok(response) => {
                let mut refreshed = TokenRecord::from_response(response, self.clock.now());
                // Providers may omit the refresh token on refresh; keep the
                // one that is still valid.
                if refreshed.refresh_token.is_none() {
                    refreshed.refresh_token = record.refresh_token;
                }

                let access_token = refreshed.access_token.clone();
                if let Err(e) = self.store_record(&refreshed).await {
                    warn!("refreshed token could not be persisted: {e}");
                    return None;
                }

                info!("access token refreshed");
                Some(access_token)
            }
            Err(e) => {
                warn!("{}", AuthError::TokenRefreshFailed(e));
                self.logout().await;
                None
            }
        }
    }

    /// Clear the token record and any pending correlation markers
    pub async fn logout(&self) {
        self.remove_record().await;
        self.drop_pending_markers().await;
        info!("session cleared");
    }

    async fn complete_callback(&self, code: &str, state: &str) -> Result<(), AuthError> {
        let marker_key = format!("{VERIFIER_KEY_PREFIX}{state}");

        let verifier =
            self.storage.get(&marker_key).await?.ok_or(AuthError::MissingVerifier)?;

        // The verifier is single-use: gone after this attempt, successful
        // or not, along with any stale markers.
        self.storage.remove(&marker_key).await?;
        self.prune_pending_markers().await?;

        let response = self
            .client
            .exchange_code(code, &verifier)
            .await
            .map_err(AuthError::TokenExchangeFailed)?;

        let record = TokenRecord::from_response(response, self.clock.now());
        self.store_record(&record).await?;

        info!("authorization code exchanged; session established");

        Ok(())
    }

    async fn load_record(&self) -> Option<TokenRecord> {
        let raw = match self.storage.get(TOKEN_KEY).await {
            Ok(raw) => raw?,
            Err(e) => {
                warn!("token record could not be read: {e}");
                return None;
            }
        };

        match serde_json::from_str(&raw) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!("stored token record is corrupt, discarding: {e}");
                self.remove_record().await;
                None
            }
        }
    }

    async fn store_record(&self, record: &TokenRecord) -> Result<(), AuthError> {
        let raw = serde_json::to_string(record)?;
        self.storage.set(TOKEN_KEY, &raw).await?;
        Ok(())
    }

    async fn remove_record(&self) {
        if let Err(e) = self.storage.remove(TOKEN_KEY).await {
            warn!("token record could not be removed: {e}");
        }
    }

    async fn prune_pending_markers(&self) -> Result<(), StorageError> {
        for key in self.storage.keys_with_prefix(VERIFIER_KEY_PREFIX).await? {
            self.storage.remove(&key).await?;
        }
        Ok(())
    }

    async fn drop_pending_markers(&self) {
        if let Err(e) = self.prune_pending_markers().await {
            warn!("pending markers could not be pruned: {e}");
        }
    }
}

impl<S: KeyValueStore> fmt::Debug for AuthSession<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthSession").field("client", &self.client.config().client_id).finish()
    }
}
