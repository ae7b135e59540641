//! Typed persistence for the auth session.

use crate::{KeyValueStorage, StorageError, StorageKeys, StorageResult};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

/// Persisted authentication session.
///
/// Serialized as one JSON document with camelCase fields under
/// [`StorageKeys::AUTH_SESSION`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    /// User profile as returned by the API (shape owned by the server).
    #[serde(default)]
    pub user: Option<Value>,
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub is_authenticated: bool,
}

impl SessionRecord {
    /// A fully populated, authenticated session.
    pub fn authenticated(user: Option<Value>, access_token: &str, refresh_token: &str) -> Self {
        Self {
            user,
            access_token: Some(access_token.to_string()),
            refresh_token: Some(refresh_token.to_string()),
            is_authenticated: true,
        }
    }

    /// True when no field carries data.
    pub fn is_empty(&self) -> bool {
        self.user.is_none()
            && self.access_token.is_none()
            && self.refresh_token.is_none()
            && !self.is_authenticated
    }

    /// Structural checks applied to anything read back from storage.
    pub fn validate(&self) -> Result<(), String> {
        if matches!(&self.access_token, Some(t) if t.trim().is_empty()) {
            return Err("access token is blank".to_string());
        }
        if matches!(&self.refresh_token, Some(t) if t.trim().is_empty()) {
            return Err("refresh token is blank".to_string());
        }
        if self.is_authenticated && self.access_token.is_none() {
            return Err("authenticated session has no access token".to_string());
        }
        Ok(())
    }
}

/// Owns the single serialization boundary for [`SessionRecord`].
pub struct SessionVault {
    storage: Box<dyn KeyValueStorage>,
}

impl SessionVault {
    /// Create a new vault with the given storage backend
    pub fn new(storage: Box<dyn KeyValueStorage>) -> Self {
        Self { storage }
    }

    /// Strict read: `Ok(None)` when nothing is stored, an error when the
    /// stored value cannot be decoded or fails validation.
    pub fn read(&self) -> StorageResult<Option<SessionRecord>> {
        let Some(json) = self.storage.get(StorageKeys::AUTH_SESSION)? else {
            return Ok(None);
        };

        let record: SessionRecord =
            serde_json::from_str(&json).map_err(|e| StorageError::Encoding(e.to_string()))?;
        record.validate().map_err(StorageError::InvalidRecord)?;

        Ok(Some(record))
    }

    /// Lenient read used at startup. Malformed data is discarded and an empty
    /// session returned; only backend I/O failures are errors.
    pub fn load_or_default(&self) -> StorageResult<SessionRecord> {
        match self.read() {
            Ok(Some(record)) => {
                debug!(authenticated = record.is_authenticated, "Loaded stored session");
                Ok(record)
            }
            Ok(None) => Ok(SessionRecord::default()),
            Err(StorageError::Encoding(reason)) | Err(StorageError::InvalidRecord(reason)) => {
                warn!(reason = %reason, "Discarding malformed stored session");
                self.storage.delete(StorageKeys::AUTH_SESSION)?;
                Ok(SessionRecord::default())
            }
            Err(e) => Err(e),
        }
    }

    /// Write the record. An empty record removes the key instead.
    pub fn save(&self, record: &SessionRecord) -> StorageResult<()> {
        if record.is_empty() {
            return self.clear();
        }
        let json =
            serde_json::to_string(record).map_err(|e| StorageError::Encoding(e.to_string()))?;
        self.storage.set(StorageKeys::AUTH_SESSION, &json)
    }

    /// Remove the stored session.
    pub fn clear(&self) -> StorageResult<()> {
        self.storage.delete(StorageKeys::AUTH_SESSION)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryStorage;
    use std::sync::Arc;

    fn vault_with_backend() -> (SessionVault, Arc<MemoryStorage>) {
        let backend = Arc::new(MemoryStorage::new());
        let vault = SessionVault::new(Box::new(backend.clone()));
        (vault, backend)
    }

    #[test]
    fn test_save_and_read_session() {
        let (vault, backend) = vault_with_backend();
        let user = serde_json::json!({ "id": "u-1", "name": "Ada" });

        vault
            .save(&SessionRecord::authenticated(Some(user.clone()), "A1", "R1"))
            .unwrap();

        let stored = backend.get(StorageKeys::AUTH_SESSION).unwrap().unwrap();
        assert!(stored.contains("\"accessToken\":\"A1\""));
        assert!(stored.contains("\"isAuthenticated\":true"));

        let record = vault.read().unwrap().unwrap();
        assert_eq!(record.user, Some(user));
        assert_eq!(record.access_token.as_deref(), Some("A1"));
        assert_eq!(record.refresh_token.as_deref(), Some("R1"));
        assert!(record.is_authenticated);
    }

    #[test]
    fn test_read_nothing_stored() {
        let (vault, _) = vault_with_backend();
        assert!(vault.read().unwrap().is_none());
        assert!(vault.load_or_default().unwrap().is_empty());
    }

    #[test]
    fn test_undecodable_session_is_rejected_then_discarded() {
        let (vault, backend) = vault_with_backend();
        backend.set(StorageKeys::AUTH_SESSION, "{ not json").unwrap();

        assert!(matches!(vault.read(), Err(StorageError::Encoding(_))));

        let record = vault.load_or_default().unwrap();
        assert!(record.is_empty());
        assert!(!backend.has(StorageKeys::AUTH_SESSION).unwrap());
    }

    #[test]
    fn test_authenticated_without_access_token_is_invalid() {
        let (vault, backend) = vault_with_backend();
        backend
            .set(
                StorageKeys::AUTH_SESSION,
                r#"{"refreshToken":"R1","isAuthenticated":true}"#,
            )
            .unwrap();

        assert!(matches!(vault.read(), Err(StorageError::InvalidRecord(_))));
        assert!(vault.load_or_default().unwrap().is_empty());
    }

    #[test]
    fn test_blank_tokens_are_invalid() {
        let record = SessionRecord {
            access_token: Some("  ".to_string()),
            ..SessionRecord::default()
        };
        assert!(record.validate().is_err());

        let record = SessionRecord {
            refresh_token: Some(String::new()),
            ..SessionRecord::default()
        };
        assert!(record.validate().is_err());
    }

    #[test]
    fn test_missing_fields_default() {
        let (vault, backend) = vault_with_backend();
        backend
            .set(StorageKeys::AUTH_SESSION, r#"{"accessToken":"A1"}"#)
            .unwrap();

        let record = vault.read().unwrap().unwrap();
        assert_eq!(record.access_token.as_deref(), Some("A1"));
        assert!(record.refresh_token.is_none());
        assert!(!record.is_authenticated);
    }

    #[test]
    fn test_saving_empty_record_clears_key() {
        let (vault, backend) = vault_with_backend();
        vault
            .save(&SessionRecord::authenticated(None, "A1", "R1"))
            .unwrap();

        vault.save(&SessionRecord::default()).unwrap();
        assert!(!backend.has(StorageKeys::AUTH_SESSION).unwrap());
    }
}
