//! String key-value slots backing the character collection and the draft.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Store file is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Storage quota of {quota} bytes exceeded (needed {needed})")]
    QuotaExceeded { quota: usize, needed: usize },
    #[error("Store lock was poisoned")]
    Poisoned,
}

/// Synchronous string store. Implementations may fail on any call.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

fn footprint(entries: &HashMap<String, String>) -> usize {
    entries.iter().map(|(k, v)| k.len() + v.len()).sum()
}

/// In-process store, optionally capped the way a browser caps local storage.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
    quota: Option<usize>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limits the summed byte length of all keys and values.
    pub fn with_quota(quota: usize) -> Self {
        Self {
            entries: Mutex::default(),
            quota: Some(quota),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, String>>, StorageError> {
        self.entries.lock().map_err(|_| StorageError::Poisoned)
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.lock()?;
        if let Some(quota) = self.quota {
            let replaced = entries.get(key).map(|old| key.len() + old.len()).unwrap_or(0);
            let needed = footprint(&entries) - replaced + key.len() + value.len();
            if needed > quota {
                return Err(StorageError::QuotaExceeded { quota, needed });
            }
        }
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

#[derive(Serialize, Deserialize, Debug, PartialEq, Eq, Clone, Default)]
#[serde(rename_all = "snake_case")]
#[serde(deny_unknown_fields)]
struct StoreFile {
    entries: HashMap<String, String>,
}

/// Every slot lives in one JSON document, rewritten on each change.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    entries: Mutex<HashMap<String, String>>,
}

impl FileStore {
    /// Opens the store at `path`; a missing file is an empty store.
    ///
    /// A file that does not parse is moved to [`FileStore::corrupt_path`] and
    /// the store starts empty.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let path = path.as_ref().to_path_buf();
        let entries = match std::fs::read_to_string(&path) {
            Ok(content) => match serde_json::from_str::<StoreFile>(&content) {
                Ok(file) => file.entries,
                Err(e) => {
                    let aside = Self::corrupt_path(&path);
                    log::error!(
                        "Store {:?} is unreadable, moving it to {:?} and starting empty: {}",
                        path,
                        aside,
                        e
                    );
                    std::fs::rename(&path, &aside)
                        .map_err(|source| StorageError::Io { path: aside, source })?;
                    HashMap::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No store at {:?}, starting empty", path);
                HashMap::new()
            }
            Err(source) => return Err(StorageError::Io { path, source }),
        };
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    /// Where an unreadable store file is kept: `<path>.corrupt`.
    pub fn corrupt_path(path: &Path) -> PathBuf {
        let mut aside = path.as_os_str().to_owned();
        aside.push(".corrupt");
        PathBuf::from(aside)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, entries: &HashMap<String, String>) -> Result<(), StorageError> {
        let file = StoreFile {
            entries: entries.clone(),
        };
        let content = serde_json::to_string_pretty(&file)?;
        let staging = self.path.with_extension("tmp");
        std::fs::write(&staging, content).map_err(|source| StorageError::Io {
            path: staging.clone(),
            source,
        })?;
        std::fs::rename(&staging, &self.path).map_err(|source| StorageError::Io {
            path: self.path.clone(),
            source,
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, String>>, StorageError> {
        self.entries.lock().map_err(|_| StorageError::Poisoned)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut entries = self.lock()?;
        let mut next = entries.clone();
        next.insert(key.to_string(), value.to_string());
        self.write(&next)?;
        *entries = next;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        let mut entries = self.lock()?;
        if !entries.contains_key(key) {
            return Ok(());
        }
        let mut next = entries.clone();
        next.remove(key);
        self.write(&next)?;
        *entries = next;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_round_trips() {
        let store = MemoryStore::new();
        assert_eq!(store.get("a").unwrap(), None);
        store.set("a", "1").unwrap();
        store.set("a", "2").unwrap();
        assert_eq!(store.get("a").unwrap().as_deref(), Some("2"));
        store.remove("a").unwrap();
        assert_eq!(store.get("a").unwrap(), None);
    }

    #[test]
    fn memory_store_enforces_quota() {
        let store = MemoryStore::with_quota(10);
        store.set("key", "1234567").unwrap();
        // replacing an entry only counts the new value
        store.set("key", "abcdefg").unwrap();

        let err = store.set("other", "x").unwrap_err();
        assert!(matches!(
            err,
            StorageError::QuotaExceeded {
                quota: 10,
                needed: 16
            }
        ));
        assert_eq!(store.get("key").unwrap().as_deref(), Some("abcdefg"));
        assert_eq!(store.get("other").unwrap(), None);
    }

    #[test]
    fn file_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        let store = FileStore::open(&path).unwrap();
        store.set("characters", "[]").unwrap();
        store.set("draft", "{}").unwrap();
        store.remove("draft").unwrap();
        drop(store);

        let reopened = FileStore::open(&path).unwrap();
        assert_eq!(reopened.get("characters").unwrap().as_deref(), Some("[]"));
        assert_eq!(reopened.get("draft").unwrap(), None);
    }

    #[test]
    fn unreadable_store_file_is_set_aside() {
        let cases = [
            "not json",
            r#"{"entries":{"character_vault.characters":5}}"#,
            r#"{"slots":{}}"#,
        ];

        for content in cases {
            let dir = tempfile::tempdir().unwrap();
            let path = dir.path().join("store.json");
            std::fs::write(&path, content).unwrap();

            let store = FileStore::open(&path).unwrap();
            assert_eq!(store.get("character_vault.characters").unwrap(), None);
            let aside = dir.path().join("store.json.corrupt");
            assert_eq!(FileStore::corrupt_path(&path), aside);
            assert_eq!(std::fs::read_to_string(&aside).unwrap(), content);

            // the next write starts a fresh file and leaves the bad one alone
            store.set("characters", "[]").unwrap();
            assert_eq!(std::fs::read_to_string(&aside).unwrap(), content);
            let reopened = FileStore::open(&path).unwrap();
            assert_eq!(reopened.get("characters").unwrap().as_deref(), Some("[]"));
        }
    }

    #[test]
    fn file_store_write_failure_leaves_memory_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("store.json");

        let store = FileStore::open(&path).unwrap();
        assert!(matches!(
            store.set("a", "1").unwrap_err(),
            StorageError::Io { .. }
        ));
        assert_eq!(store.get("a").unwrap(), None);
    }
}
