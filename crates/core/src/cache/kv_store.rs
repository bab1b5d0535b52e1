use log::{debug, warn};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use super::cache_traits::KeyValueStore;
use crate::errors::{CacheError, Result};

/// In-process key/value store used when the durable backend is unavailable.
///
/// Usage is measured as the UTF-8 length of keys plus values. A write that
/// would push usage past the capacity fails and leaves the store untouched.
#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    items: RwLock<HashMap<String, String>>,
    capacity_bytes: Option<usize>,
}

impl MemoryKeyValueStore {
    /// Creates an unbounded store.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity_bytes(capacity_bytes: usize) -> Self {
        Self {
            items: RwLock::new(HashMap::new()),
            capacity_bytes: Some(capacity_bytes),
        }
    }

    fn with_items(items: HashMap<String, String>, capacity_bytes: Option<usize>) -> Self {
        Self {
            items: RwLock::new(items),
            capacity_bytes,
        }
    }

    fn snapshot(&self) -> Result<HashMap<String, String>> {
        Ok(self.items.read()?.clone())
    }

    /// Bytes currently used by keys and values.
    pub fn used_bytes(&self) -> Result<usize> {
        let items = self.items.read()?;
        Ok(items.iter().map(|(k, v)| k.len() + v.len()).sum())
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        let items = self.items.read()?;
        Ok(items.get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        let mut items = self.items.write()?;

        if let Some(capacity) = self.capacity_bytes {
            let used: usize = items.iter().map(|(k, v)| k.len() + v.len()).sum();
            let replaced = items.get(key).map(|v| key.len() + v.len()).unwrap_or(0);
            if used - replaced + key.len() + value.len() > capacity {
                return Err(CacheError::WriteCapacityExceeded {
                    key: key.to_string(),
                }
                .into());
            }
        }

        items.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.items.write()?.remove(key);
        Ok(())
    }

    fn keys(&self) -> Result<Vec<String>> {
        Ok(self.items.read()?.keys().cloned().collect())
    }
}

/// Key/value store persisted as a single JSON object on disk.
///
/// Reads are served from memory. Every successful mutation rewrites the file
/// through a temporary sibling and a rename, so a crash leaves either the old
/// or the new contents. An unreadable file is treated as empty.
#[derive(Debug)]
pub struct FileKeyValueStore {
    inner: MemoryKeyValueStore,
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileKeyValueStore {
    pub fn open(path: impl Into<PathBuf>, capacity_bytes: Option<usize>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let items = match fs::read_to_string(&path) {
            Ok(raw) => serde_json::from_str::<HashMap<String, String>>(&raw).unwrap_or_else(|e| {
                warn!("Ignoring unreadable fallback cache file {}: {}", path.display(), e);
                HashMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => HashMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(
            "Opened fallback cache file {} ({} keys)",
            path.display(),
            items.len()
        );

        Ok(Self {
            inner: MemoryKeyValueStore::with_items(items, capacity_bytes),
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn persist(&self) -> Result<()> {
        let _guard = self.write_lock.lock()?;
        let serialized = serde_json::to_string(&self.inner.snapshot()?)?;
        let tmp_path = self.path.with_extension("tmp");
        fs::write(&tmp_path, serialized)?;
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get_item(&self, key: &str) -> Result<Option<String>> {
        self.inner.get_item(key)
    }

    fn set_item(&self, key: &str, value: &str) -> Result<()> {
        self.inner.set_item(key, value)?;
        self.persist()
    }

    fn remove_item(&self, key: &str) -> Result<()> {
        self.inner.remove_item(key)?;
        self.persist()
    }

    fn keys(&self) -> Result<Vec<String>> {
        self.inner.keys()
    }
}
