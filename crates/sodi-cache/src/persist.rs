//! # Snapshot Persistence
//!
//! Throttled, best-effort mirroring of the cache into a durable key-value
//! store, and rehydration on startup.
//!
//! ## Persistence Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Snapshot Flusher Flow                                │
//! │                                                                         │
//! │  set_query_data / remove / invalidate / clear                          │
//! │        │                                                                │
//! │        └── marks the cache dirty (atomic flag, no I/O)                 │
//! │                                                                         │
//! │  SnapshotFlusher (background task)                                     │
//! │  1. Tick: every flush interval (default 1 s)                           │
//! │  2. Drain: swap the dirty flag; skip the tick if clean                 │
//! │  3. Serialize: every (namespace, key, value) + token + written_at      │
//! │  4. Write: SnapshotStore::set_item under one versioned key             │
//! │  5. On error: warn! and carry on — persistence NEVER fails a mutation  │
//! │                                                                         │
//! │  Rehydration (startup)               Discarded when:                   │
//! │  • read snapshot key                 • token != deployment token       │
//! │  • check token + age                 • written_at older than TTL       │
//! │  • import entries                    • payload does not deserialize    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The in-memory cache stays authoritative for the running process; the
//! snapshot only seeds the next session.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cache::QueryCache;
use crate::entry::CachedValue;
use crate::error::{CacheError, CacheResult};

// =============================================================================
// Constants
// =============================================================================

/// The single versioned key all snapshots are written under.
pub const SNAPSHOT_KEY: &str = "sodi.query-cache.v1";

/// Default minimum spacing between snapshot writes.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(1);

// =============================================================================
// Snapshot Store Contract
// =============================================================================

/// A durable key-value byte store scoped to the running client.
///
/// Mirrors the browser-storage shape: `get_item`, `set_item`,
/// `remove_item`. Implementations must be safe to call from the flusher
/// task.
#[async_trait]
pub trait SnapshotStore: Send + Sync {
    async fn get_item(&self, key: &str) -> CacheResult<Option<Vec<u8>>>;
    async fn set_item(&self, key: &str, value: Vec<u8>) -> CacheResult<()>;
    async fn remove_item(&self, key: &str) -> CacheResult<()>;
}

// =============================================================================
// Memory Store
// =============================================================================

/// In-memory snapshot store, used for tests and as a no-op default.
#[derive(Debug, Default)]
pub struct MemorySnapshotStore {
    items: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SnapshotStore for MemorySnapshotStore {
    async fn get_item(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        let items = self
            .items
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(items.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: Vec<u8>) -> CacheResult<()> {
        let mut items = self
            .items
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        items.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> CacheResult<()> {
        let mut items = self
            .items
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        items.remove(key);
        Ok(())
    }
}

// =============================================================================
// File Store
// =============================================================================

/// File-backed snapshot store: one file per key under a base directory.
///
/// Writes go to a temp file first, then rename, so a crash mid-write never
/// leaves a truncated snapshot.
#[derive(Debug)]
pub struct FileSnapshotStore {
    dir: PathBuf,
}

impl FileSnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileSnapshotStore { dir: dir.into() }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        // Keys contain dots, not path separators; keep the mapping flat.
        self.dir.join(format!("{key}.bin"))
    }
}

#[async_trait]
impl SnapshotStore for FileSnapshotStore {
    async fn get_item(&self, key: &str) -> CacheResult<Option<Vec<u8>>> {
        match std::fs::read(self.path_for(key)) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn set_item(&self, key: &str, value: Vec<u8>) -> CacheResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        let tmp = path.with_extension("tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> CacheResult<()> {
        match std::fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

// =============================================================================
// Snapshot Payload
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
struct PersistedSnapshot {
    /// Deployment token; a mismatch discards the snapshot wholesale.
    token: String,
    /// When the snapshot was written.
    written_at: DateTime<Utc>,
    entries: Vec<PersistedEntry>,
}

#[derive(Debug, Serialize, Deserialize)]
struct PersistedEntry {
    namespace: String,
    key: String,
    value: CachedValue,
}

// =============================================================================
// Flush / Hydrate
// =============================================================================

/// Serializes the cache and writes it under [`SNAPSHOT_KEY`].
///
/// Errors are returned so the flusher can log them; callers other than the
/// flusher (e.g. a shutdown hook) decide their own policy.
pub async fn persist_snapshot(cache: &QueryCache, store: &dyn SnapshotStore) -> CacheResult<()> {
    let snapshot = PersistedSnapshot {
        token: cache.version_token().to_string(),
        written_at: Utc::now(),
        entries: cache
            .export_entries()
            .into_iter()
            .map(|(namespace, key, value)| PersistedEntry {
                namespace,
                key,
                value,
            })
            .collect(),
    };

    let bytes = serde_json::to_vec(&snapshot)?;
    store.set_item(SNAPSHOT_KEY, bytes).await?;
    debug!(entries = snapshot.entries.len(), "Snapshot persisted");
    Ok(())
}

/// Rehydrates the cache from a persisted snapshot, if one is present,
/// carries the current deployment token, and is younger than the TTL.
///
/// Returns true if entries were imported. A stale or mismatched snapshot is
/// removed from the store so it is not re-examined next start.
pub async fn hydrate(cache: &QueryCache, store: &dyn SnapshotStore) -> CacheResult<bool> {
    let Some(bytes) = store.get_item(SNAPSHOT_KEY).await? else {
        debug!("No persisted snapshot found");
        return Ok(false);
    };

    let snapshot: PersistedSnapshot = match serde_json::from_slice(&bytes) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!(?e, "Discarding undecodable snapshot");
            store.remove_item(SNAPSHOT_KEY).await?;
            return Ok(false);
        }
    };

    if snapshot.token != cache.version_token() {
        info!(
            persisted = %snapshot.token,
            current = %cache.version_token(),
            "Discarding snapshot from another deployment"
        );
        store.remove_item(SNAPSHOT_KEY).await?;
        return Ok(false);
    }

    let age = Utc::now().signed_duration_since(snapshot.written_at);
    let ttl = chrono::Duration::from_std(cache.ttl()).unwrap_or(chrono::Duration::zero());
    if age > ttl {
        info!(age_secs = age.num_seconds(), "Discarding expired snapshot");
        store.remove_item(SNAPSHOT_KEY).await?;
        return Ok(false);
    }

    let count = snapshot.entries.len();
    cache.import_entries(
        snapshot
            .entries
            .into_iter()
            .map(|e| (e.namespace, e.key, e.value))
            .collect(),
    );
    info!(entries = count, "Cache rehydrated from snapshot");
    Ok(true)
}

// =============================================================================
// Snapshot Flusher
// =============================================================================

/// Background task batching snapshot writes to at most one per interval.
pub struct SnapshotFlusher {
    cache: QueryCache,
    store: Arc<dyn SnapshotStore>,
    interval: Duration,
    shutdown_rx: mpsc::Receiver<()>,
}

/// Handle for controlling the snapshot flusher.
#[derive(Clone)]
pub struct SnapshotFlusherHandle {
    shutdown_tx: mpsc::Sender<()>,
}

impl SnapshotFlusherHandle {
    /// Triggers graceful shutdown; the flusher performs a final flush.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

impl SnapshotFlusher {
    /// Creates a flusher and its handle. Spawn [`run`] on the runtime.
    ///
    /// [`run`]: SnapshotFlusher::run
    pub fn new(
        cache: QueryCache,
        store: Arc<dyn SnapshotStore>,
        interval: Duration,
    ) -> (Self, SnapshotFlusherHandle) {
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
        (
            SnapshotFlusher {
                cache,
                store,
                interval,
                shutdown_rx,
            },
            SnapshotFlusherHandle { shutdown_tx },
        )
    }

    /// Runs the flush loop. This should be spawned as a background task.
    pub async fn run(mut self) {
        info!(interval_ms = self.interval.as_millis() as u64, "Snapshot flusher starting");

        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.flush_if_dirty().await;
                }

                _ = self.shutdown_rx.recv() => {
                    info!("Snapshot flusher shutting down");
                    self.flush_if_dirty().await;
                    break;
                }
            }
        }

        info!("Snapshot flusher stopped");
    }

    async fn flush_if_dirty(&self) {
        if !self.cache.take_dirty() {
            return;
        }
        // Swallowed by policy: the in-memory cache keeps working without
        // its durable mirror.
        if let Err(e) = persist_snapshot(&self.cache, self.store.as_ref()).await {
            warn!(?e, "Snapshot flush failed");
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::CacheConfig;
    use sodi_core::RecordPage;

    fn test_cache(token: &str) -> QueryCache {
        QueryCache::new(CacheConfig {
            ttl: Duration::from_secs(60),
            version_token: token.to_string(),
        })
    }

    fn page(total: u64) -> CachedValue {
        CachedValue::Page(RecordPage {
            items: Vec::new(),
            total,
        })
    }

    #[tokio::test]
    async fn test_persist_then_hydrate_round_trip() {
        let store = MemorySnapshotStore::new();
        let cache = test_cache("v1");
        cache.set_query_data("sales", "list", page(3));
        cache.set_query_data("products", "list", page(9));

        persist_snapshot(&cache, &store).await.unwrap();

        let restored = test_cache("v1");
        assert!(hydrate(&restored, &store).await.unwrap());
        assert_eq!(restored.get_query_data("sales", "list"), Some(page(3)));
        assert_eq!(restored.get_query_data("products", "list"), Some(page(9)));
    }

    #[tokio::test]
    async fn test_hydrate_rejects_foreign_token() {
        let store = MemorySnapshotStore::new();
        let cache = test_cache("v1");
        cache.set_query_data("sales", "list", page(3));
        persist_snapshot(&cache, &store).await.unwrap();

        let next_deploy = test_cache("v2");
        assert!(!hydrate(&next_deploy, &store).await.unwrap());
        assert_eq!(next_deploy.get_query_data("sales", "list"), None);

        // The stale snapshot was dropped from the store.
        assert_eq!(store.get_item(SNAPSHOT_KEY).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_hydrate_rejects_expired_snapshot() {
        let store = MemorySnapshotStore::new();
        let cache = QueryCache::new(CacheConfig {
            ttl: Duration::ZERO,
            version_token: "v1".to_string(),
        });
        cache.set_query_data("sales", "list", page(3));
        persist_snapshot(&cache, &store).await.unwrap();

        tokio::time::sleep(Duration::from_millis(10)).await;
        let restored = QueryCache::new(CacheConfig {
            ttl: Duration::ZERO,
            version_token: "v1".to_string(),
        });
        assert!(!hydrate(&restored, &store).await.unwrap());
    }

    #[tokio::test]
    async fn test_hydrate_handles_missing_and_garbage() {
        let store = MemorySnapshotStore::new();
        let cache = test_cache("v1");
        assert!(!hydrate(&cache, &store).await.unwrap());

        store
            .set_item(SNAPSHOT_KEY, b"not json".to_vec())
            .await
            .unwrap();
        assert!(!hydrate(&cache, &store).await.unwrap());
    }

    #[tokio::test]
    async fn test_flusher_writes_once_per_interval() {
        let store = Arc::new(MemorySnapshotStore::new());
        let cache = test_cache("v1");
        let (flusher, handle) =
            SnapshotFlusher::new(cache.clone(), store.clone(), Duration::from_millis(20));
        let task = tokio::spawn(flusher.run());

        cache.set_query_data("sales", "list", page(1));
        tokio::time::sleep(Duration::from_millis(60)).await;
        assert!(store.get_item(SNAPSHOT_KEY).await.unwrap().is_some());

        handle.shutdown().await;
        task.await.unwrap();
    }

    #[tokio::test]
    async fn test_flusher_final_flush_on_shutdown() {
        let store = Arc::new(MemorySnapshotStore::new());
        let cache = test_cache("v1");
        let (flusher, handle) =
            SnapshotFlusher::new(cache.clone(), store.clone(), Duration::from_secs(3600));
        let task = tokio::spawn(flusher.run());

        cache.set_query_data("sales", "list", page(1));
        handle.shutdown().await;
        task.await.unwrap();

        assert!(store.get_item(SNAPSHOT_KEY).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_file_store_round_trip() {
        let dir = std::env::temp_dir().join(format!("sodi-cache-test-{}", std::process::id()));
        let store = FileSnapshotStore::new(&dir);

        assert_eq!(store.get_item(SNAPSHOT_KEY).await.unwrap(), None);
        store.set_item(SNAPSHOT_KEY, vec![1, 2, 3]).await.unwrap();
        assert_eq!(
            store.get_item(SNAPSHOT_KEY).await.unwrap(),
            Some(vec![1, 2, 3])
        );
        store.remove_item(SNAPSHOT_KEY).await.unwrap();
        assert_eq!(store.get_item(SNAPSHOT_KEY).await.unwrap(), None);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
