//! Cache entry storage.
//!
//! The freshness cache owns no state of its own; entries live in a
//! [`CacheStore`] it is handed at construction. This keeps the cache itself
//! independently testable and lets deployments choose between a per-process
//! map and a persisted file.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, RwLock};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::policy::CacheKey;

/// One memoized upstream response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Leading path segment; determines the freshness policy.
    pub resource_class: String,

    /// Full resource path including query parameters.
    pub path: String,

    /// Requesting principal, set only for owner-scoped entries.
    pub owner_id: Option<String>,

    /// When the entry was written (ms since epoch).
    pub cached_at_ms: i64,

    /// Freshness window (ms).
    pub stale_time_ms: i64,

    /// The upstream response payload.
    pub payload: Value,
}

impl CacheEntry {
    /// The effective key this entry lives under.
    pub fn key(&self) -> CacheKey {
        match &self.owner_id {
            Some(owner) => CacheKey::Owner {
                resource_class: self.resource_class.clone(),
                owner_id: owner.clone(),
            },
            None => CacheKey::Path(self.path.clone()),
        }
    }
}

/// Errors from a cache store backend.
///
/// These are never surfaced to request handlers; the freshness cache treats
/// them as a miss on read and a no-op on write.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {message}")]
    Serde { message: String },

    #[error("store lock poisoned")]
    Poisoned,
}

/// Key-value storage for cache entries.
///
/// Backends must support upsert, find, and delete by effective key; a write
/// for an existing key replaces the previous entry.
pub trait CacheStore: Send + Sync {
    /// Find the entry stored under `key`, if any.
    fn find(&self, key: &CacheKey) -> Result<Option<CacheEntry>, StoreError>;

    /// Insert or replace the entry for its effective key.
    fn upsert(&self, entry: CacheEntry) -> Result<(), StoreError>;

    /// Delete the entry stored under `key`, if any.
    fn remove(&self, key: &CacheKey) -> Result<(), StoreError>;

    /// Number of stored entries, fresh or stale.
    fn len(&self) -> Result<usize, StoreError>;

    /// Whether the store holds no entries.
    fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

/// In-process store backed by a map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CacheStore for MemoryStore {
    fn find(&self, key: &CacheKey) -> Result<Option<CacheEntry>, StoreError> {
        let guard = self.entries.read().map_err(|_| StoreError::Poisoned)?;
        Ok(guard.get(key).cloned())
    }

    fn upsert(&self, entry: CacheEntry) -> Result<(), StoreError> {
        let mut guard = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        guard.insert(entry.key(), entry);
        Ok(())
    }

    fn remove(&self, key: &CacheKey) -> Result<(), StoreError> {
        let mut guard = self.entries.write().map_err(|_| StoreError::Poisoned)?;
        guard.remove(key);
        Ok(())
    }

    fn len(&self) -> Result<usize, StoreError> {
        let guard = self.entries.read().map_err(|_| StoreError::Poisoned)?;
        Ok(guard.len())
    }
}

/// Persisted store backed by a JSON file.
///
/// Entries are kept as a flat list and matched by recomputed key, since
/// owner-scoped keys are not representable as JSON object keys. Suited to
/// single-instance deployments that want the cache to survive restarts.
///
/// Every operation is a read-modify-rewrite of the whole file, so an internal
/// mutex serializes them; without it, concurrent upserts would overwrite each
/// other's entries. The rewrite goes through a temp file in the same directory
/// and an atomic rename, so a crash mid-write never leaves a truncated file.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    /// The backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> Result<Vec<CacheEntry>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(contents) => serde_json::from_str(&contents).map_err(|e| StoreError::Serde {
                message: e.to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }

    fn save(&self, entries: &[CacheEntry]) -> Result<(), StoreError> {
        let parent = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        if !parent.exists() {
            std::fs::create_dir_all(&parent)?;
        }

        let json = serde_json::to_string_pretty(entries).map_err(|e| StoreError::Serde {
            message: e.to_string(),
        })?;

        // Temp file must live in the same directory as the target so the
        // rename stays on one filesystem and is atomic.
        let tmp = tempfile::NamedTempFile::new_in(&parent)?;
        std::fs::write(tmp.path(), json)?;
        tmp.persist(&self.path).map_err(|e| StoreError::Io(e.error))?;
        Ok(())
    }
}

impl CacheStore for FileStore {
    fn find(&self, key: &CacheKey) -> Result<Option<CacheEntry>, StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let entries = self.load()?;
        Ok(entries.into_iter().find(|e| &e.key() == key))
    }

    fn upsert(&self, entry: CacheEntry) -> Result<(), StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let key = entry.key();
        let mut entries = self.load()?;
        entries.retain(|e| e.key() != key);
        entries.push(entry);
        self.save(&entries)
    }

    fn remove(&self, key: &CacheKey) -> Result<(), StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        let mut entries = self.load()?;
        entries.retain(|e| &e.key() != key);
        self.save(&entries)
    }

    fn len(&self) -> Result<usize, StoreError> {
        let _guard = self.lock.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(self.load()?.len())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use tempfile::tempdir;

    use super::*;

    fn entry(path: &str, owner: Option<&str>, payload: Value) -> CacheEntry {
        CacheEntry {
            resource_class: "stops".to_string(),
            path: path.to_string(),
            owner_id: owner.map(String::from),
            cached_at_ms: 0,
            stale_time_ms: 30_000,
            payload,
        }
    }

    #[test]
    fn memory_store_upsert_replaces() {
        let store = MemoryStore::new();
        let key = CacheKey::Path("/stops/place-north".to_string());

        store
            .upsert(entry("/stops/place-north", None, json!({"v": 1})))
            .unwrap();
        store
            .upsert(entry("/stops/place-north", None, json!({"v": 2})))
            .unwrap();

        assert_eq!(store.len().unwrap(), 1);
        let found = store.find(&key).unwrap().unwrap();
        assert_eq!(found.payload, json!({"v": 2}));
    }

    #[test]
    fn memory_store_remove() {
        let store = MemoryStore::new();
        let key = CacheKey::Path("/routes".to_string());

        store.upsert(entry("/routes", None, json!([]))).unwrap();
        store.remove(&key).unwrap();

        assert!(store.find(&key).unwrap().is_none());
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn owner_entries_key_by_class_and_owner() {
        let a = entry("/stops?filter[latitude]=1&filter[longitude]=2", Some("u1"), json!(1));
        let b = entry("/stops?filter[latitude]=3&filter[longitude]=4", Some("u1"), json!(2));
        assert_eq!(a.key(), b.key());

        let c = entry("/stops?filter[latitude]=1&filter[longitude]=2", Some("u2"), json!(3));
        assert_ne!(a.key(), c.key());
    }

    #[test]
    fn file_store_round_trip() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().join("cache.json"));

        store
            .upsert(entry("/routes?filter[type]=2", None, json!([{"id": "CR-Fitchburg"}])))
            .unwrap();

        let key = CacheKey::Path("/routes?filter[type]=2".to_string());
        let found = store.find(&key).unwrap().unwrap();
        assert_eq!(found.payload, json!([{"id": "CR-Fitchburg"}]));
    }

    #[test]
    fn file_store_missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().join("missing.json"));

        let key = CacheKey::Path("/routes".to_string());
        assert!(store.find(&key).unwrap().is_none());
        assert_eq!(store.len().unwrap(), 0);
    }

    #[test]
    fn file_store_creates_parent_directories() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("dir").join("cache.json");
        let store = FileStore::new(&path);

        store.upsert(entry("/routes", None, json!([]))).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn file_store_concurrent_upserts_all_survive() {
        let dir = tempdir().unwrap();
        let store = std::sync::Arc::new(FileStore::new(dir.path().join("cache.json")));

        let handles: Vec<_> = (0..4)
            .map(|worker| {
                let store = std::sync::Arc::clone(&store);
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let path = format!("/schedules?filter[stop]=w{worker}-{i}");
                        store.upsert(entry(&path, None, json!(i))).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len().unwrap(), 200);
        let key = CacheKey::Path("/schedules?filter[stop]=w3-49".to_string());
        assert_eq!(store.find(&key).unwrap().unwrap().payload, json!(49));
    }

    #[test]
    fn file_store_upsert_replaces_owner_slot() {
        let dir = tempdir().unwrap();
        let store = FileStore::new(dir.path().join("cache.json"));

        store
            .upsert(entry("/stops?filter[latitude]=1&filter[longitude]=2", Some("u1"), json!(1)))
            .unwrap();
        store
            .upsert(entry("/stops?filter[latitude]=3&filter[longitude]=4", Some("u1"), json!(2)))
            .unwrap();

        assert_eq!(store.len().unwrap(), 1);
    }
}
