//! File-backed token store.
//!
//! The snapshot is one JSON document written whole on every save. Writes go
//! to a sibling temp file which is then renamed over the target, so readers
//! never observe a half-written record.

use crate::traits::discard_if_expired;
use crate::{StorageError, StorageResult, StoredSnapshot, TokenStore};
use parking_lot::Mutex;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use tracing::{debug, warn};

/// Token store persisting the snapshot as a JSON file.
pub struct FileTokenStore {
    path: PathBuf,
    // Serializes save/load/clear within this process.
    lock: Mutex<()>,
}

impl FileTokenStore {
    /// Create a store writing to `path`. Nothing is touched until first use.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_snapshot(&self) -> StorageResult<Option<StoredSnapshot>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(c) => c,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&content).map(Some).map_err(|e| {
            StorageError::Encoding(format!(
                "corrupt session file {}: {}",
                self.path.display(),
                e
            ))
        })
    }

    fn remove_file(&self) -> StorageResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {
                debug!(path = %self.path.display(), "Session file removed");
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

impl TokenStore for FileTokenStore {
    fn save(&self, snapshot: &StoredSnapshot) -> StorageResult<()> {
        let content = serde_json::to_string_pretty(snapshot)?;
        let _guard = self.lock.lock();
        write_atomically(&self.path, &content)?;
        debug!(path = %self.path.display(), "Session snapshot saved");
        Ok(())
    }

    fn load(&self) -> StorageResult<Option<StoredSnapshot>> {
        let _guard = self.lock.lock();
        let snapshot = self.read_snapshot()?;
        discard_if_expired(snapshot, || self.remove_file())
    }

    fn clear(&self) -> StorageResult<()> {
        let _guard = self.lock.lock();
        self.remove_file()
    }
}

/// Write `content` to a temp file next to `path` and rename it into place.
fn write_atomically(path: &Path, content: &str) -> io::Result<()> {
    let dir = match path.parent() {
        Some(d) if !d.as_os_str().is_empty() => d.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir)?;

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "invalid session file path"))?;

    let tmp_name = format!(
        ".{}.tmp.{}",
        file_name,
        std::time::SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
    );
    let tmp_path = dir.join(tmp_name);

    let write_result = (|| -> io::Result<()> {
        let mut options = fs::OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }

        let mut file = options.open(&tmp_path)?;
        file.write_all(content.as_bytes())?;
        file.sync_all()?;
        fs::rename(&tmp_path, path)?;

        if let Ok(parent_dir) = fs::File::open(&dir) {
            let _ = parent_dir.sync_all();
        }
        Ok(())
    })();

    if let Err(err) = write_result {
        warn!(path = %path.display(), error = %err, "Atomic session write failed");
        let _ = fs::remove_file(&tmp_path);
        return Err(err);
    }

    Ok(())
}
