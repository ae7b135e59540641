//! Process-wide holder of the current session.
//!
//! Reads are served from memory. Every mutation is written through to the
//! [`SessionVault`] when one is attached; a failed write is logged and the
//! in-memory value stays authoritative for the rest of the process.

use medipulse_storage::{SessionRecord, SessionVault};
use parking_lot::RwLock;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::AuthResult;

/// Shared handle to the session tokens. Cloning is cheap and every clone
/// observes the same state.
#[derive(Clone)]
pub struct TokenStore {
    inner: Arc<TokenStoreInner>,
}

struct TokenStoreInner {
    session: RwLock<SessionRecord>,
    vault: Option<SessionVault>,
}

impl TokenStore {
    /// Store that keeps the session in memory only.
    pub fn in_memory() -> Self {
        Self::from_parts(SessionRecord::default(), None)
    }

    /// Store seeded from and persisted to `vault`.
    ///
    /// Malformed persisted data is discarded and the store starts empty.
    pub fn with_vault(vault: SessionVault) -> AuthResult<Self> {
        let session = vault.load_or_default()?;
        Ok(Self::from_parts(session, Some(vault)))
    }

    fn from_parts(session: SessionRecord, vault: Option<SessionVault>) -> Self {
        Self {
            inner: Arc::new(TokenStoreInner {
                session: RwLock::new(session),
                vault,
            }),
        }
    }

    pub fn get_access_token(&self) -> Option<String> {
        self.inner.session.read().access_token.clone()
    }

    pub fn get_refresh_token(&self) -> Option<String> {
        self.inner.session.read().refresh_token.clone()
    }

    pub fn user(&self) -> Option<Value> {
        self.inner.session.read().user.clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.inner.session.read().is_authenticated
    }

    /// Copy of the whole session.
    pub fn snapshot(&self) -> SessionRecord {
        self.inner.session.read().clone()
    }

    /// Replace the access token, leaving the refresh token and user alone.
    pub fn set_access_token(&self, token: &str) {
        self.update(|session| {
            session.access_token = Some(token.to_string());
        });
        debug!("Access token replaced");
    }

    /// Install a full session after login.
    pub fn set_session(&self, user: Option<Value>, access_token: &str, refresh_token: &str) {
        self.update(|session| {
            *session = SessionRecord::authenticated(user, access_token, refresh_token);
        });
        info!("Session established");
    }

    pub fn set_user(&self, user: Value) {
        self.update(|session| {
            session.user = Some(user);
        });
    }

    /// Drop every field. Idempotent.
    pub fn clear(&self) {
        self.update(|session| {
            *session = SessionRecord::default();
        });
        info!("Session cleared");
    }

    fn update(&self, mutate: impl FnOnce(&mut SessionRecord)) {
        let mut session = self.inner.session.write();
        mutate(&mut session);

        // Written under the lock so the persisted order matches memory.
        if let Some(vault) = &self.inner.vault {
            if let Err(e) = vault.save(&session) {
                warn!(error = %e, "Failed to persist session");
            }
        }
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let session = self.inner.session.read();
        f.debug_struct("TokenStore")
            .field("is_authenticated", &session.is_authenticated)
            .field("has_access_token", &session.access_token.is_some())
            .field("has_refresh_token", &session.refresh_token.is_some())
            .field("persistent", &self.inner.vault.is_some())
            .finish()
    }
}
