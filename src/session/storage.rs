use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Key/value pairs kept by a [`SessionStorage`].
pub type StoredEntries = BTreeMap<String, String>;

/// Durable client-side storage, the analogue of browser local storage.
/// `store` replaces the whole document so related keys change together.
pub trait SessionStorage: Send + Sync {
    fn load(&self) -> io::Result<StoredEntries>;
    fn store(&self, entries: &StoredEntries) -> io::Result<()>;
}

/// JSON document on disk.
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStorage for FileStorage {
    fn load(&self) -> io::Result<StoredEntries> {
        if !self.path.exists() {
            return Ok(StoredEntries::new());
        }
        let json = fs::read_to_string(&self.path)?;
        serde_json::from_str(&json).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
    }

    fn store(&self, entries: &StoredEntries) -> io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(entries)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        // Write then rename.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<StoredEntries>,
}

impl SessionStorage for MemoryStorage {
    fn load(&self) -> io::Result<StoredEntries> {
        self.entries
            .lock()
            .map(|entries| entries.clone())
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "session storage poisoned"))
    }

    fn store(&self, entries: &StoredEntries) -> io::Result<()> {
        let mut guard = self
            .entries
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "session storage poisoned"))?;
        *guard = entries.clone();
        Ok(())
    }
}
