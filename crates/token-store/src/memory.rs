//! In-memory token store.

use crate::traits::discard_if_expired;
use crate::{StorageResult, StoredSnapshot, TokenStore};
use parking_lot::Mutex;

/// Token store that lives only as long as the process.
#[derive(Default)]
pub struct MemoryTokenStore {
    slot: Mutex<Option<StoredSnapshot>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl TokenStore for MemoryTokenStore {
    fn save(&self, snapshot: &StoredSnapshot) -> StorageResult<()> {
        *self.slot.lock() = Some(snapshot.clone());
        Ok(())
    }

    fn load(&self) -> StorageResult<Option<StoredSnapshot>> {
        let mut slot = self.slot.lock();
        let snapshot = slot.clone();
        discard_if_expired(snapshot, || {
            *slot = None;
            Ok(())
        })
    }

    fn clear(&self) -> StorageResult<()> {
        *self.slot.lock() = None;
        Ok(())
    }
}
