//! Durable file-backed driver.
//!
//! Mirrors a per-origin local storage area: a flat map of storage key to
//! serialized record text, persisted as one JSON document. Every driver
//! opened on the same file in this process shares one in-memory area.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Weak};

use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info, warn};

use super::StorageDriver;
use crate::error::{CacheError, Result};
use crate::store::CacheRecord;

/// Open storage areas keyed by canonical file path.
static AREAS: Lazy<Mutex<HashMap<PathBuf, Weak<StorageArea>>>> =
    Lazy::new(|| Mutex::new(HashMap::new()));

#[derive(Debug)]
struct StorageArea {
    path: PathBuf,
    entries: RwLock<HashMap<String, String>>,
}

impl StorageArea {
    // == Persist ==
    /// Rewrites the backing file through a temp file and rename.
    fn persist(&self, entries: &HashMap<String, String>) -> Result<()> {
        let text = serde_json::to_string(entries)?;
        let tmp = self.path.with_extension("tmp");

        fs::write(&tmp, text).map_err(|e| CacheError::io(&tmp, e))?;
        fs::rename(&tmp, &self.path).map_err(|e| CacheError::io(&self.path, e))?;

        debug!("Persisted {} entries to {}", entries.len(), self.path.display());
        Ok(())
    }
}

/// Default durable driver.
///
/// Records are kept as text, exactly as they would sit in a browser's local
/// storage, and parsed on every read.
#[derive(Debug, Clone)]
pub struct LocalStorageDriver {
    area: Arc<StorageArea>,
}

impl LocalStorageDriver {
    // == Constructor ==
    /// Opens (or creates) the store at `path`.
    ///
    /// Joins the area already open on the same file, if any. Otherwise an
    /// unreadable or malformed file is logged and replaced by an empty store
    /// on the next write. Only failing to create the parent directory is an error.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = canonical_path(path.into())?;

        let mut areas = AREAS.lock();
        if let Some(area) = areas.get(&path).and_then(Weak::upgrade) {
            debug!("Local storage at {} already open, sharing it", path.display());
            return Ok(Self { area });
        }

        let entries = load_entries(&path);
        info!(
            "Local storage opened at {} with {} entries",
            path.display(),
            entries.len()
        );

        let area = Arc::new(StorageArea {
            path: path.clone(),
            entries: RwLock::new(entries),
        });
        areas.retain(|_, open| open.strong_count() > 0);
        areas.insert(path, Arc::downgrade(&area));
        Ok(Self { area })
    }

    pub fn path(&self) -> &Path {
        &self.area.path
    }

    /// Stores raw text under `key`, bypassing record serialization.
    ///
    /// The entry is only kept if the file write succeeds.
    pub fn set_raw(&self, key: &str, text: impl Into<String>) -> Result<()> {
        let mut entries = self.area.entries.write();
        let previous = entries.insert(key.to_string(), text.into());

        if let Err(e) = self.area.persist(&entries) {
            match previous {
                Some(old) => entries.insert(key.to_string(), old),
                None => entries.remove(key),
            };
            return Err(e);
        }
        Ok(())
    }

    /// Returns the raw text stored under `key`.
    pub fn raw(&self, key: &str) -> Option<String> {
        self.area.entries.read().get(key).cloned()
    }
}

impl StorageDriver for LocalStorageDriver {
    fn set_item(&self, key: &str, record: &CacheRecord) -> Result<()> {
        let text = serde_json::to_string(record)?;
        self.set_raw(key, text)
    }

    fn get_item(&self, key: &str) -> Result<Option<CacheRecord>> {
        let entries = self.area.entries.read();
        let Some(text) = entries.get(key) else {
            return Ok(None);
        };

        serde_json::from_str(text)
            .map(Some)
            .map_err(|source| CacheError::Corrupt {
                key: key.to_string(),
                source,
            })
    }

    fn name(&self) -> &str {
        "local"
    }
}

/// Creates the parent directory and resolves it, so that different
/// spellings of one file map to the same area.
fn canonical_path(path: PathBuf) -> Result<PathBuf> {
    let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
        return Ok(path);
    };
    if parent.as_os_str().is_empty() {
        return Ok(path);
    }

    fs::create_dir_all(parent).map_err(|e| CacheError::io(parent, e))?;
    let parent = fs::canonicalize(parent).map_err(|e| CacheError::io(parent, e))?;
    Ok(parent.join(name))
}

/// Reads the backing file, treating anything unusable as empty.
fn load_entries(path: &Path) -> HashMap<String, String> {
    let text = match fs::read_to_string(path) {
        Ok(text) => text,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
        Err(e) => {
            warn!("Cannot read local storage at {}: {}", path.display(), e);
            return HashMap::new();
        }
    };

    match serde_json::from_str(&text) {
        Ok(entries) => entries,
        Err(e) => {
            warn!(
                "Local storage at {} is malformed, starting empty: {}",
                path.display(),
                e
            );
            HashMap::new()
        }
    }
}
