//! Session persistence for the driver SDK.
//!
//! This crate holds the credential data model and the [`TokenStore`]
//! capability with two implementations:
//! - [`FileTokenStore`]: one JSON snapshot file, replaced atomically
//! - [`MemoryTokenStore`]: process-local, for tests and throwaway sessions

mod file;
mod memory;
mod model;
mod traits;

pub use file::FileTokenStore;
pub use memory::MemoryTokenStore;
pub use model::{now_millis, Credential, Identity, StoredSnapshot, PLACEHOLDER_ID};
pub use traits::TokenStore;

use std::path::PathBuf;
use thiserror::Error;

/// Error type for storage operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Stored data could not be decoded
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for storage operations.
pub type StorageResult<T> = Result<T, StorageError>;

/// Resolved token store selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenStoreKind {
    /// JSON snapshot at the given path.
    File(PathBuf),
    Memory,
}

/// Build the store selected by configuration.
pub fn open_store(kind: &TokenStoreKind) -> Box<dyn TokenStore> {
    match kind {
        TokenStoreKind::File(path) => Box::new(FileTokenStore::new(path.clone())),
        TokenStoreKind::Memory => Box::new(MemoryTokenStore::new()),
    }
}
