//! Persistent rate snapshot storage.
//!
//! A store holds one snapshot per [`RateKey`]. Saving replaces the previous
//! snapshot for that key as a whole: readers see either the old complete value or
//! the new complete value, never a mix.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use fxquery_common::{RateKey, RateSnapshot};
use tempfile::NamedTempFile;
use tracing::debug;

use crate::config::CacheBackend;
use crate::error::{FxError, FxResult};
use crate::redis_store::{RedisClient, RedisRateStore};

/// Single-slot-per-key snapshot storage.
#[async_trait]
pub trait RateStore: Send + Sync {
    /// Persist a snapshot, replacing any prior snapshot under the same key.
    async fn save(&self, key: &RateKey, snapshot: &RateSnapshot) -> FxResult<()>;

    /// Load the snapshot for a key. Absence is [`FxError::CacheNotFound`].
    async fn load(&self, key: &RateKey) -> FxResult<RateSnapshot>;

    /// Whether a snapshot exists for a key.
    async fn exists(&self, key: &RateKey) -> bool;
}

/// Shared rate store handle.
pub type SharedRateStore = Arc<dyn RateStore>;

/// Build the store selected by configuration.
pub fn open_store(backend: &CacheBackend) -> FxResult<SharedRateStore> {
    match backend {
        CacheBackend::File(dir) => Ok(Arc::new(FileRateStore::open(dir)?)),
        CacheBackend::Memory => Ok(Arc::new(MemoryRateStore::new())),
        CacheBackend::Redis(url) => {
            let client = Arc::new(RedisClient::open(url)?);
            Ok(Arc::new(RedisRateStore::new(client)))
        }
    }
}

/// Stores each snapshot as a JSON file in a directory.
///
/// Writes go to a temporary file in the same directory which is then renamed
/// over the target, so the replacement is atomic on POSIX filesystems. File I/O
/// runs on the blocking thread pool.
#[derive(Debug, Clone)]
pub struct FileRateStore {
    dir: PathBuf,
}

impl FileRateStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open(dir: impl AsRef<Path>) -> FxResult<Self> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    /// Path of the file for a key.
    pub fn path_for(&self, key: &RateKey) -> PathBuf {
        let name = match key {
            RateKey::Latest => "latest.json".to_string(),
            RateKey::Historical(date) => format!("historical-{}.json", date),
        };
        self.dir.join(name)
    }
}

fn write_atomically(dir: &Path, path: &Path, body: &[u8]) -> FxResult<()> {
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(body)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .map_err(|e| FxError::Storage(e.error.to_string()))?;
    Ok(())
}

#[async_trait]
impl RateStore for FileRateStore {
    async fn save(&self, key: &RateKey, snapshot: &RateSnapshot) -> FxResult<()> {
        let body = serde_json::to_vec(snapshot)
            .map_err(|e| FxError::MalformedSnapshot(e.to_string()))?;

        let dir = self.dir.clone();
        let path = self.path_for(key);
        let target = path.clone();
        tokio::task::spawn_blocking(move || write_atomically(&dir, &target, &body)).await??;

        debug!(key = %key, path = %path.display(), rates = snapshot.len(), "Snapshot saved");
        Ok(())
    }

    async fn load(&self, key: &RateKey) -> FxResult<RateSnapshot> {
        let path = self.path_for(key);
        let body = match tokio::fs::read(&path).await {
            Ok(body) => body,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(FxError::CacheNotFound(*key));
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_slice(&body).map_err(|e| {
            FxError::MalformedSnapshot(format!("{}: {}", path.display(), e))
        })
    }

    async fn exists(&self, key: &RateKey) -> bool {
        tokio::fs::metadata(self.path_for(key))
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false)
    }
}

/// Thread-safe in-memory store.
#[derive(Debug, Default)]
pub struct MemoryRateStore {
    entries: DashMap<RateKey, RateSnapshot>,
}

impl MemoryRateStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored snapshots.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl RateStore for MemoryRateStore {
    async fn save(&self, key: &RateKey, snapshot: &RateSnapshot) -> FxResult<()> {
        self.entries.insert(*key, snapshot.clone());
        debug!(key = %key, rates = snapshot.len(), "Snapshot saved");
        Ok(())
    }

    async fn load(&self, key: &RateKey) -> FxResult<RateSnapshot> {
        self.entries
            .get(key)
            .map(|entry| entry.value().clone())
            .ok_or(FxError::CacheNotFound(*key))
    }

    async fn exists(&self, key: &RateKey) -> bool {
        self.entries.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fxquery_common::{from_unix_seconds, Currency, RateDate};
    use rust_decimal_macros::dec;
    use tempfile::TempDir;

    fn make_snapshot(ts: i64, eur: rust_decimal::Decimal) -> RateSnapshot {
        RateSnapshot::new(
            from_unix_seconds(ts).unwrap(),
            [(Currency::usd(), dec!(1)), (Currency::eur(), eur)],
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_file_store_missing_is_not_found() {
        let dir = TempDir::new().unwrap();
        let store = FileRateStore::open(dir.path()).unwrap();

        assert!(!store.exists(&RateKey::Latest).await);
        assert!(matches!(
            store.load(&RateKey::Latest).await,
            Err(FxError::CacheNotFound(RateKey::Latest))
        ));
    }

    #[tokio::test]
    async fn test_file_store_save_and_load() {
        let dir = TempDir::new().unwrap();
        let store = FileRateStore::open(dir.path()).unwrap();
        let snapshot = make_snapshot(1_640_995_200, dec!(0.88));

        store.save(&RateKey::Latest, &snapshot).await.unwrap();

        assert!(store.exists(&RateKey::Latest).await);
        assert_eq!(store.load(&RateKey::Latest).await.unwrap(), snapshot);
    }

    #[tokio::test]
    async fn test_file_store_keeps_full_precision() {
        let dir = TempDir::new().unwrap();
        let store = FileRateStore::open(dir.path()).unwrap();
        let snapshot = make_snapshot(1_000, dec!(1.2345678901234567891));

        store.save(&RateKey::Latest, &snapshot).await.unwrap();

        let loaded = store.load(&RateKey::Latest).await.unwrap();
        assert_eq!(loaded.rate(&Currency::eur()), Some(dec!(1.2345678901234567891)));
    }

    #[tokio::test]
    async fn test_file_store_replaces_previous_snapshot() {
        let dir = TempDir::new().unwrap();
        let store = FileRateStore::open(dir.path()).unwrap();

        store
            .save(&RateKey::Latest, &make_snapshot(1_000, dec!(0.88)))
            .await
            .unwrap();
        let newer = make_snapshot(2_000, dec!(0.91));
        store.save(&RateKey::Latest, &newer).await.unwrap();

        assert_eq!(store.load(&RateKey::Latest).await.unwrap(), newer);

        // No temporary files are left behind.
        let files: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(files.len(), 1);
    }

    #[tokio::test]
    async fn test_file_store_keys_are_independent() {
        let dir = TempDir::new().unwrap();
        let store = FileRateStore::open(dir.path()).unwrap();
        let key = RateKey::Historical(RateDate::parse("2022-01-01").unwrap());

        store.save(&key, &make_snapshot(1_000, dec!(0.88))).await.unwrap();

        assert!(store.exists(&key).await);
        assert!(!store.exists(&RateKey::Latest).await);
        assert!(store
            .path_for(&key)
            .ends_with("historical-2022-01-01.json"));
    }

    #[tokio::test]
    async fn test_file_store_corrupt_file() {
        let dir = TempDir::new().unwrap();
        let store = FileRateStore::open(dir.path()).unwrap();
        fs::write(store.path_for(&RateKey::Latest), b"{not json").unwrap();

        assert!(matches!(
            store.load(&RateKey::Latest).await,
            Err(FxError::MalformedSnapshot(_))
        ));
    }

    #[tokio::test]
    async fn test_memory_store() {
        let store = MemoryRateStore::new();
        let snapshot = make_snapshot(1_000, dec!(0.9));

        assert!(store.load(&RateKey::Latest).await.is_err());

        store.save(&RateKey::Latest, &snapshot).await.unwrap();

        assert_eq!(store.len(), 1);
        assert!(store.exists(&RateKey::Latest).await);
        assert_eq!(store.load(&RateKey::Latest).await.unwrap(), snapshot);
    }

    #[test]
    fn test_open_store_backends() {
        let dir = TempDir::new().unwrap();

        assert!(open_store(&CacheBackend::File(dir.path().join("cache"))).is_ok());
        assert!(dir.path().join("cache").is_dir());
        assert!(open_store(&CacheBackend::Memory).is_ok());
        // Opening a Redis store parses the URL but does not connect.
        assert!(open_store(&CacheBackend::Redis("redis://127.0.0.1:1".to_string())).is_ok());
        assert!(open_store(&CacheBackend::Redis("http://nowhere".to_string())).is_err());
    }
}
