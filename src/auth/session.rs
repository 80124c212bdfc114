//! Session management
//!
//! Sessions are opaque random tokens held in the session store.
//! The store is keyed by a SHA-256 digest of the token, so the store never
//! holds a usable credential.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use rand::RngCore;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::data::{SessionStore, UserId, bounded};
use crate::error::AppError;
use crate::metrics::{SESSION_LOOKUPS_TOTAL, SESSIONS_ISSUED_TOTAL};

/// Random bytes per session token (256 bits)
const SESSION_TOKEN_BYTES: usize = 32;

/// Opaque session token handed to the client
#[derive(Clone, PartialEq, Eq)]
pub struct SessionToken(String);

impl SessionToken {
    fn generate() -> Self {
        let mut bytes = [0u8; SESSION_TOKEN_BYTES];
        OsRng.fill_bytes(&mut bytes);
        Self(URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

/// Session store key for a presented token
pub(crate) fn session_store_key(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    format!("session:{}", URL_SAFE_NO_PAD.encode(digest))
}

// =============================================================================
// Issuer
// =============================================================================

/// Mints sessions after a successful login
pub struct SessionIssuer {
    store: Arc<dyn SessionStore>,
    ttl: Duration,
    store_timeout: Duration,
}

impl SessionIssuer {
    pub fn new(store: Arc<dyn SessionStore>, ttl: Duration, store_timeout: Duration) -> Self {
        Self {
            store,
            ttl,
            store_timeout,
        }
    }

    /// Create a fresh session for `user_id`.
    ///
    /// Performs exactly one store write. Tokens are never reused.
    pub async fn issue(&self, user_id: UserId) -> Result<SessionToken, AppError> {
        let token = SessionToken::generate();
        let key = session_store_key(token.as_str());

        bounded(
            self.store_timeout,
            "session_store",
            self.store.set(&key, user_id, self.ttl),
        )
        .await?;

        SESSIONS_ISSUED_TOTAL.inc();
        tracing::info!(user_id = %user_id, ttl_secs = self.ttl.as_secs(), "Session issued");
        Ok(token)
    }

    /// Drop the session behind `token`. Unknown tokens are ignored.
    pub async fn revoke(&self, token: &str) -> Result<(), AppError> {
        let key = session_store_key(token);
        bounded(self.store_timeout, "session_store", self.store.remove(&key)).await?;
        tracing::info!("Session revoked");
        Ok(())
    }
}

// =============================================================================
// Authenticator
// =============================================================================

/// Resolves presented session tokens to user ids
///
/// Keeps no state between calls; every call is one store read.
pub struct SessionAuthenticator {
    store: Arc<dyn SessionStore>,
    store_timeout: Duration,
}

impl SessionAuthenticator {
    pub fn new(store: Arc<dyn SessionStore>, store_timeout: Duration) -> Self {
        Self {
            store,
            store_timeout,
        }
    }

    /// Establish the caller's identity.
    ///
    /// # Errors
    /// - `NoSession` when no (or an empty) token is presented
    /// - `InvalidOrExpiredSession` when the store has no live entry
    /// - `StoreUnavailable` when the store fails or times out
    pub async fn authenticate(&self, token: Option<&str>) -> Result<UserId, AppError> {
        let Some(token) = token.filter(|token| !token.is_empty()) else {
            SESSION_LOOKUPS_TOTAL.with_label_values(&["no_session"]).inc();
            return Err(AppError::NoSession);
        };

        let key = session_store_key(token);
        let lookup = bounded(self.store_timeout, "session_store", self.store.get(&key)).await;

        match lookup {
            Ok(Some(user_id)) => {
                SESSION_LOOKUPS_TOTAL.with_label_values(&["accepted"]).inc();
                Ok(user_id)
            }
            Ok(None) => {
                SESSION_LOOKUPS_TOTAL.with_label_values(&["rejected"]).inc();
                tracing::debug!("Session token not found or expired");
                Err(AppError::InvalidOrExpiredSession)
            }
            Err(error) => {
                SESSION_LOOKUPS_TOTAL.with_label_values(&["error"]).inc();
                Err(error)
            }
        }
    }
}
