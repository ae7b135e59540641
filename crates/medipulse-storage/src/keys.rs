//! Storage key constants.

/// Storage keys used by the client
pub struct StorageKeys;

impl StorageKeys {
    /// Persisted auth session (JSON: user, tokens, authenticated flag)
    pub const AUTH_SESSION: &'static str = "auth-storage";
}
