//! Token store trait definition.

use crate::model::{now_millis, StoredSnapshot};
use crate::StorageResult;
use tracing::info;

/// Durable home for exactly one session snapshot.
///
/// Every implementation guarantees:
/// - `save` replaces the record as a whole; a concurrent `load` sees either
///   the old or the new record, never a partial one.
/// - `load` returns `None` when nothing is stored or when the stored record
///   has expired, and in the expired case clears it.
/// - `clear` succeeds when nothing is stored.
pub trait TokenStore: Send + Sync {
    /// Replace the stored snapshot.
    fn save(&self, snapshot: &StoredSnapshot) -> StorageResult<()>;

    /// Load the snapshot if present and unexpired.
    fn load(&self) -> StorageResult<Option<StoredSnapshot>>;

    /// Remove the stored snapshot.
    fn clear(&self) -> StorageResult<()>;

    /// True when `load` would return a snapshot.
    fn has_valid(&self) -> StorageResult<bool> {
        Ok(self.load()?.is_some())
    }
}

/// Shared expiry handling for `load` implementations.
///
/// Returns the snapshot unchanged when still valid; otherwise runs `clear`
/// and returns `None`.
pub(crate) fn discard_if_expired<F>(
    snapshot: Option<StoredSnapshot>,
    clear: F,
) -> StorageResult<Option<StoredSnapshot>>
where
    F: FnOnce() -> StorageResult<()>,
{
    match snapshot {
        Some(s) if s.is_expired_at(now_millis()) => {
            info!(expires_at = s.expires_at, "Stored session expired, clearing");
            clear()?;
            Ok(None)
        }
        other => Ok(other),
    }
}
