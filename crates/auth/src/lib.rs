//! OAuth 2.0 + PKCE session core for the Cadenza music gallery
//!
//! This crate owns authentication against the streaming provider:
//! PKCE parameter generation, verifier correlation across the redirect
//! boundary, authorization-code exchange, token persistence, expiry-aware
//! access-token retrieval, and refresh. The gallery shell (rendering, track
//! grid, playback) consumes only the [`session::AuthSession`] surface.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   AuthSession   │  OAuth state machine (initiate/callback/refresh/logout)
//! └────────┬────────┘
//!          │
//!          ├──► TokenClient      (token endpoint HTTP grants)
//!          ├──► KeyValueStore    (durable slots: token record, verifier markers)
//!          ├──► Clock            (expiry checks, fakeable in tests)
//!          └──► pkce utilities   (verifier/challenge/state generation)
//! ```
//!
//! The shell navigates away to the identity provider between
//! `initiate_auth()` and the callback route, so the session keeps no
//! in-flight state in memory: the PKCE verifier is persisted under a
//! state-derived key and read back through the same store after the
//! navigation.
//!
//! # Usage
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use cadenza_auth::session::{AuthSession, CallbackParams};
//! use cadenza_auth::storage::FileStore;
//! use cadenza_auth::types::AuthConfig;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AuthConfig::from_env()?;
//! let storage = Arc::new(FileStore::new("session.json"));
//! let session = AuthSession::new(config, storage);
//!
//! // Redirect-out: navigate the shell to this URL.
//! let authorize_url = session.initiate_auth().await?;
//!
//! // ...the provider redirects back to the callback route...
//! let params = CallbackParams::from_redirect_url(
//!     "http://localhost:3000/callback?code=ABC&state=xyz",
//! )?;
//! if session.handle_redirect(&params).await {
//!     let token = session.get_access_token().await;
//!     println!("authenticated: {}", token.is_some());
//! }
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![warn(clippy::all, clippy::perf, clippy::complexity, clippy::suspicious)]

pub mod client;
pub mod clock;
pub mod pkce;
pub mod session;
pub mod storage;
pub mod types;

// Re-export commonly used types and functions
pub use client::{TokenClient, TokenClientError};
pub use clock::{Clock, MockClock, SystemClock};
pub use pkce::{generate_code_challenge, generate_code_verifier, generate_state, PkceChallenge};
pub use session::{AuthError, AuthSession, CallbackParams, TOKEN_KEY, VERIFIER_KEY_PREFIX};
pub use storage::{FileStore, KeyValueStore, MemoryStore, StorageError};
pub use types::{
    AuthConfig, ConfigError, ProviderErrorBody, TokenRecord, TokenResponse, EXPIRY_BUFFER_SECS,
};
