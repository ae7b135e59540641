//! Persistent key-value storage for the MediPulse client.
//!
//! Backends:
//! - **File**: a single JSON object on disk, rewritten atomically on every change
//! - **Memory**: process-local map, used by tests and ephemeral clients
//!
//! On top of the raw backends, [`SessionVault`] owns the typed, validated
//! auth session record.

mod file;
mod keys;
mod memory;
mod session;
mod traits;

pub use file::FileStorage;
pub use keys::StorageKeys;
pub use memory::MemoryStorage;
pub use session::{SessionRecord, SessionVault};
pub use traits::KeyValueStorage;

use medipulse_config_and_utils::Paths;
use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Encoding/decoding error
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Stored record decoded but failed validation
    #[error("Invalid stored record: {0}")]
    InvalidRecord(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Open the file-backed storage under the client's base directory.
pub fn create_storage(paths: &Paths) -> StorageResult<Box<dyn KeyValueStorage>> {
    let storage = FileStorage::open(paths.storage_file())?;
    Ok(Box::new(storage))
}

/// Create a SessionVault over the default file storage.
pub fn create_session_vault(paths: &Paths) -> StorageResult<SessionVault> {
    let storage = create_storage(paths)?;
    Ok(SessionVault::new(storage))
}
