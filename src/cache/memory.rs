//! In-process backing store.

use dashmap::DashMap;
use std::collections::HashMap;
use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use crate::cache::backend::CacheBackend;
use crate::cache::error::BackendError;
use crate::config::CacheConfig;
use crate::observability::metrics;

struct StoredEntry {
    bytes: Vec<u8>,
    /// Logical clock value of the last read or write.
    last_access: AtomicU64,
}

/// A thread-safe, capacity-bounded key/value store.
///
/// Entries are sharded across a `DashMap`. When an insert of a new key would
/// exceed `max_entries`, the least recently used entry is evicted first.
/// The bound is approximate under concurrent inserts.
pub struct MemoryBackend {
    entries: DashMap<String, StoredEntry>,
    clock: AtomicU64,
    max_entries: usize,
    persistence_path: Option<PathBuf>,
}

impl MemoryBackend {
    /// Create an empty store. A `max_entries` of zero is treated as one.
    pub fn new(max_entries: usize) -> Self {
        Self {
            entries: DashMap::new(),
            clock: AtomicU64::new(0),
            max_entries: max_entries.max(1),
            persistence_path: None,
        }
    }

    /// Create a store that snapshots to `path` on [`MemoryBackend::save_to_file`].
    pub fn with_persistence(max_entries: usize, path: impl Into<PathBuf>) -> Self {
        Self {
            persistence_path: Some(path.into()),
            ..Self::new(max_entries)
        }
    }

    /// Build the store described by `config`, loading its snapshot if any.
    pub fn from_config(config: &CacheConfig) -> Result<Self, BackendError> {
        match &config.persistence_path {
            Some(path) => Self::load_from_file(config.max_entries, path),
            None => Ok(Self::new(config.max_entries)),
        }
    }

    /// Load a snapshot if the file exists, otherwise start empty.
    ///
    /// A snapshot that cannot be parsed is moved aside to `<path>.corrupt`
    /// and the store starts empty.
    pub fn load_from_file(max_entries: usize, path: impl Into<PathBuf>) -> Result<Self, BackendError> {
        let path = path.into();
        let store = Self::with_persistence(max_entries, path.clone());

        if !path.exists() {
            return Ok(store);
        }

        let file = File::open(&path)?;
        let reader = BufReader::new(file);
        let map: HashMap<String, String> = match serde_json::from_reader(reader) {
            Ok(map) => map,
            Err(e) => {
                tracing::warn!(path = ?path, error = %e, "Discarding unreadable route cache snapshot");
                let aside = sibling(&path, "corrupt");
                if let Err(e) = fs::rename(&path, &aside) {
                    tracing::warn!(path = ?path, error = %e, "Failed to move unreadable snapshot aside");
                }
                return Ok(store);
            }
        };

        let mut skipped = 0usize;
        for (key, encoded) in map {
            match hex::decode(&encoded) {
                Ok(bytes) => store.insert(key, bytes),
                Err(_) => skipped += 1,
            }
        }
        if skipped > 0 {
            tracing::warn!(skipped, path = ?path, "Skipped undecodable snapshot entries");
        }
        metrics::record_cache_size(store.entries.len());
        tracing::info!("Loaded {} route cache entries from snapshot", store.entries.len());

        Ok(store)
    }

    /// Write every entry to the snapshot file, if one is configured.
    ///
    /// The snapshot is written to a temporary sibling and renamed into place.
    pub fn save_to_file(&self) -> Result<(), BackendError> {
        if let Some(path) = &self.persistence_path {
            let map: HashMap<String, String> = self
                .entries
                .iter()
                .map(|r| (r.key().clone(), hex::encode(&r.value().bytes)))
                .collect();

            let tmp = sibling(path, "tmp");
            let file = File::create(&tmp)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer(&mut writer, &map).map_err(|e| BackendError::Io(e.into()))?;
            writer.flush()?;
            fs::rename(&tmp, path)?;
            tracing::info!("Saved {} route cache entries to snapshot", map.len());
        }
        Ok(())
    }

    pub fn count(&self) -> usize {
        self.entries.len()
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    fn insert(&self, key: String, bytes: Vec<u8>) {
        if !self.entries.contains_key(&key) {
            while self.entries.len() >= self.max_entries {
                if !self.evict_one() {
                    break;
                }
            }
        }

        let entry = StoredEntry {
            bytes,
            last_access: AtomicU64::new(self.tick()),
        };
        self.entries.insert(key, entry);
        metrics::record_cache_size(self.entries.len());
    }

    /// Evict the least recently used entry. O(n), only runs at capacity.
    fn evict_one(&self) -> bool {
        // The iterator's shard guards must be released before `remove`.
        let victim = self
            .entries
            .iter()
            .min_by_key(|r| r.value().last_access.load(Ordering::Relaxed))
            .map(|r| r.key().clone());

        match victim {
            Some(key) => {
                tracing::trace!(key = %key, "Evicting least recently used entry");
                self.entries.remove(&key).is_some()
            }
            None => false,
        }
    }
}

/// `snapshot.json` → `snapshot.json.<suffix>`
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(suffix);
    PathBuf::from(name)
}

impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        Ok(self.entries.get(key).map(|r| {
            r.value().last_access.store(self.tick(), Ordering::Relaxed);
            r.value().bytes.clone()
        }))
    }

    async fn set(&self, key: &str, value: Vec<u8>) -> Result<(), BackendError> {
        self.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), BackendError> {
        self.entries.remove(key);
        metrics::record_cache_size(self.entries.len());
        Ok(())
    }

    async fn clear(&self) -> Result<(), BackendError> {
        self.entries.clear();
        metrics::record_cache_size(0);
        Ok(())
    }

    fn len(&self) -> Option<usize> {
        Some(self.entries.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_store_operations() {
        let store = MemoryBackend::new(16);

        assert!(store.get("a").await.unwrap().is_none());

        store.set("a", b"one".to_vec()).await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some(&b"one"[..]));

        // Overwrite
        store.set("a", b"two".to_vec()).await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some(&b"two"[..]));
        assert_eq!(store.count(), 1);

        store.remove("a").await.unwrap();
        assert!(store.get("a").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_clear() {
        let store = MemoryBackend::new(16);
        store.set("a", vec![1]).await.unwrap();
        store.set("b", vec![2]).await.unwrap();

        store.clear().await.unwrap();
        assert_eq!(store.count(), 0);
        assert!(store.get("a").await.unwrap().is_none());
        assert!(store.get("b").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_evicts_least_recently_used() {
        let store = MemoryBackend::new(2);
        store.set("a", vec![1]).await.unwrap();
        store.set("b", vec![2]).await.unwrap();

        // Touch "a" so "b" becomes the oldest
        assert!(store.get("a").await.unwrap().is_some());

        store.set("c", vec![3]).await.unwrap();
        assert_eq!(store.count(), 2);
        assert!(store.get("a").await.unwrap().is_some());
        assert!(store.get("b").await.unwrap().is_none());
        assert!(store.get("c").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_overwrite_at_capacity_does_not_evict() {
        let store = MemoryBackend::new(2);
        store.set("a", vec![1]).await.unwrap();
        store.set("b", vec![2]).await.unwrap();
        store.set("a", vec![9]).await.unwrap();

        assert_eq!(store.count(), 2);
        assert!(store.get("b").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_persistence() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");

        let store = MemoryBackend::with_persistence(16, &path);
        store.set("route-cache:match:abc", b"{\"v\":1}".to_vec()).await.unwrap();
        store.save_to_file().unwrap();

        let loaded = MemoryBackend::load_from_file(16, &path).unwrap();
        assert_eq!(
            loaded.get("route-cache:match:abc").await.unwrap().as_deref(),
            Some(&b"{\"v\":1}"[..])
        );
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("snapshot.json");
        std::fs::write(&path, r#"{"route-cache:match:ab":"7b"#).unwrap();

        let config = CacheConfig {
            persistence_path: Some(path.to_string_lossy().into_owned()),
            ..CacheConfig::default()
        };
        let store = MemoryBackend::from_config(&config).unwrap();
        assert_eq!(store.count(), 0);
        assert!(dir.path().join("snapshot.json.corrupt").exists());

        // The next save replaces the bad file with a readable one
        store.set("route-cache:match:cd", vec![1]).await.unwrap();
        store.save_to_file().unwrap();
        assert!(!dir.path().join("snapshot.json.tmp").exists());
        let reloaded = MemoryBackend::from_config(&config).unwrap();
        assert_eq!(reloaded.count(), 1);
    }

    #[test]
    fn test_missing_snapshot_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = MemoryBackend::load_from_file(4, dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded.count(), 0);
    }
}
