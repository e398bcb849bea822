//! # Query Cache
//!
//! In-memory, namespaced cache of prior query results with TTL staleness,
//! namespace invalidation, coalesced prefetch and version-stamped writes.
//!
//! ## Operations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      QueryCache Operations                              │
//! │                                                                         │
//! │  set_query_data(ns, key, v)   overwrite, stamp now, bump version       │
//! │  get_query_data(ns, key)      value or None; IGNORES staleness         │
//! │  is_query_fresh(ns, key)      false if absent/invalidated/expired      │
//! │  invalidate_namespace(ns)     flag every entry for refetch             │
//! │  remove_query(ns, key)        drop one entry                           │
//! │  prefetch_query(ns, key, f)   fetch-if-stale, coalesced per key        │
//! │  clear()                      drop everything                          │
//! │  stats()                      { total, stale, active }                 │
//! │  restore_if_version(...)      CAS rollback hook for mutations          │
//! │                                                                         │
//! │  SHARED-STATE POLICY: all mutation is whole-value replacement under    │
//! │  a short-lived lock; locks are never held across an await point.       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## No Singleton
//! `QueryCache` is an explicit, cheaply-cloneable handle around shared
//! state. Construct one per process (or per test) and pass it to consumers.

use std::collections::HashMap;
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, trace};

use crate::entry::{CacheEntry, CacheStats, CachedValue, EntryVersion};

// =============================================================================
// Configuration
// =============================================================================

/// Default time-to-live for cache entries.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Cache tuning knobs.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum age before an entry stops being authoritative.
    pub ttl: Duration,

    /// Deployment token stamped into persisted snapshots. A snapshot
    /// written under a different token is discarded on rehydration.
    pub version_token: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            ttl: DEFAULT_TTL,
            version_token: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// Query Cache
// =============================================================================

/// Cloneable handle to one cache instance.
#[derive(Debug, Clone)]
pub struct QueryCache {
    shared: Arc<CacheShared>,
}

#[derive(Debug)]
pub(crate) struct CacheShared {
    config: CacheConfig,

    /// namespace -> key -> entry. Guarded by a plain mutex: every critical
    /// section is a handful of map operations, never an await.
    entries: Mutex<HashMap<String, HashMap<String, CacheEntry>>>,

    /// In-flight prefetches, one slot per (namespace, key). The sender is
    /// dropped when the leader finishes; waiters wake on channel closure.
    in_flight: Mutex<HashMap<(String, String), watch::Sender<()>>>,

    /// Monotonic write counter feeding entry version stamps.
    next_version: AtomicU64,

    /// Set on every mutation; drained by the snapshot flusher.
    dirty: AtomicBool,
}

impl QueryCache {
    /// Creates a cache with the given configuration.
    pub fn new(config: CacheConfig) -> Self {
        QueryCache {
            shared: Arc::new(CacheShared {
                config,
                entries: Mutex::new(HashMap::new()),
                in_flight: Mutex::new(HashMap::new()),
                next_version: AtomicU64::new(1),
                dirty: AtomicBool::new(false),
            }),
        }
    }

    /// Creates a cache with default configuration.
    pub fn with_defaults() -> Self {
        QueryCache::new(CacheConfig::default())
    }

    /// The configured TTL.
    pub fn ttl(&self) -> Duration {
        self.shared.config.ttl
    }

    /// The configured deployment token.
    pub fn version_token(&self) -> &str {
        &self.shared.config.version_token
    }

    // =========================================================================
    // Core Operations
    // =========================================================================

    /// Unconditionally overwrites the entry and stamps it with the current
    /// time and a fresh version. Returns the version for CAS rollback.
    pub fn set_query_data(
        &self,
        namespace: &str,
        key: &str,
        value: CachedValue,
    ) -> EntryVersion {
        let version = EntryVersion(self.shared.next_version.fetch_add(1, Ordering::Relaxed));

        let mut entries = self.lock_entries();
        let bucket = entries.entry(namespace.to_string()).or_default();
        let observers = bucket.get(key).map(|e| e.observers).unwrap_or(0);
        let mut entry = CacheEntry::new(value, version);
        entry.observers = observers;
        bucket.insert(key.to_string(), entry);
        drop(entries);

        self.mark_dirty();
        trace!(namespace, key, version = version.0, "Cache write");
        version
    }

    /// Returns the cached value, absent-aware but staleness-blind.
    /// Callers that care about staleness pair this with [`is_query_fresh`].
    ///
    /// [`is_query_fresh`]: QueryCache::is_query_fresh
    pub fn get_query_data(&self, namespace: &str, key: &str) -> Option<CachedValue> {
        let entries = self.lock_entries();
        entries
            .get(namespace)
            .and_then(|bucket| bucket.get(key))
            .map(|entry| entry.value.clone())
    }

    /// False if the entry is absent, invalidated, or older than TTL.
    pub fn is_query_fresh(&self, namespace: &str, key: &str) -> bool {
        let entries = self.lock_entries();
        entries
            .get(namespace)
            .and_then(|bucket| bucket.get(key))
            .map(|entry| entry.is_fresh(self.shared.config.ttl))
            .unwrap_or(false)
    }

    /// Flags every entry under the namespace for refetch on next access.
    ///
    /// Values are retained (a stale list is still better to display than a
    /// blank screen) but `is_query_fresh` reports false until overwritten.
    pub fn invalidate_namespace(&self, namespace: &str) {
        let mut entries = self.lock_entries();
        let flagged = match entries.get_mut(namespace) {
            Some(bucket) => {
                for entry in bucket.values_mut() {
                    entry.invalidated = true;
                }
                bucket.len()
            }
            None => 0,
        };
        drop(entries);

        if flagged > 0 {
            self.mark_dirty();
        }
        debug!(namespace, flagged, "Namespace invalidated");
    }

    /// Deletes a single entry.
    pub fn remove_query(&self, namespace: &str, key: &str) {
        let mut entries = self.lock_entries();
        if let Some(bucket) = entries.get_mut(namespace) {
            if bucket.remove(key).is_some() {
                drop(entries);
                self.mark_dirty();
                trace!(namespace, key, "Cache entry removed");
            }
        }
    }

    /// Drops all entries, all namespaces.
    pub fn clear(&self) {
        let mut entries = self.lock_entries();
        entries.clear();
        drop(entries);
        self.mark_dirty();
        debug!("Cache cleared");
    }

    /// Diagnostic counters: total entries, stale entries, observed entries.
    pub fn stats(&self) -> CacheStats {
        let entries = self.lock_entries();
        let mut stats = CacheStats::default();
        for bucket in entries.values() {
            for entry in bucket.values() {
                stats.total += 1;
                if !entry.is_fresh(self.shared.config.ttl) {
                    stats.stale += 1;
                }
                if entry.observers > 0 {
                    stats.active += 1;
                }
            }
        }
        stats
    }

    // =========================================================================
    // Observers
    // =========================================================================

    /// Registers an observer on an entry; the guard deregisters on drop.
    ///
    /// Observation is pure bookkeeping for [`stats`]: it does not pin the
    /// entry or extend its freshness.
    ///
    /// [`stats`]: QueryCache::stats
    pub fn observe(&self, namespace: &str, key: &str) -> ObserverGuard {
        let mut entries = self.lock_entries();
        if let Some(entry) = entries
            .get_mut(namespace)
            .and_then(|bucket| bucket.get_mut(key))
        {
            entry.observers += 1;
        }
        ObserverGuard {
            shared: Arc::clone(&self.shared),
            namespace: namespace.to_string(),
            key: key.to_string(),
        }
    }

    // =========================================================================
    // Prefetch
    // =========================================================================

    /// Returns the cached value if fresh, otherwise runs `fetcher` and
    /// stores its result.
    ///
    /// Concurrent calls for the same `(namespace, key)` coalesce: one caller
    /// becomes the leader and fetches, the rest wait and re-read. If the
    /// leader's fetch fails, its error goes to the leader alone; one waiter
    /// takes over the claim and retries with its own fetcher.
    pub async fn prefetch_query<F, Fut, E>(
        &self,
        namespace: &str,
        key: &str,
        fetcher: F,
    ) -> Result<CachedValue, E>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = Result<CachedValue, E>>,
    {
        loop {
            if self.is_query_fresh(namespace, key) {
                if let Some(value) = self.get_query_data(namespace, key) {
                    return Ok(value);
                }
            }

            match self.claim_fetch(namespace, key) {
                Claim::Leader(guard) => {
                    debug!(namespace, key, "Prefetch leader fetching");
                    let value = fetcher().await?;
                    self.set_query_data(namespace, key, value.clone());
                    drop(guard); // releases the claim, wakes waiters
                    return Ok(value);
                }
                Claim::Follower(mut done) => {
                    trace!(namespace, key, "Prefetch coalesced, waiting");
                    // Wakes when the leader drops its claim (ok or error).
                    let _ = done.changed().await;
                }
            }
        }
    }

    fn claim_fetch(&self, namespace: &str, key: &str) -> Claim {
        let slot = (namespace.to_string(), key.to_string());
        let mut in_flight = self
            .shared
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(sender) = in_flight.get(&slot) {
            return Claim::Follower(sender.subscribe());
        }

        let (sender, _receiver) = watch::channel(());
        in_flight.insert(slot.clone(), sender);
        Claim::Leader(FetchClaim {
            shared: Arc::clone(&self.shared),
            slot,
        })
    }

    // =========================================================================
    // CAS Rollback Hook
    // =========================================================================

    /// Restores `snapshot` only if the entry's version is still `expected`.
    ///
    /// This is the optimistic-lock half of the snapshot/restore protocol:
    /// a mutation that wrote version N may roll back only while N is still
    /// current. If a younger mutation has written since, the rollback is
    /// skipped (returns false) and reconciliation is left to the younger
    /// mutation's invalidation or to TTL expiry.
    ///
    /// `snapshot == None` means the entry did not exist before the
    /// optimistic write, so rollback removes it.
    pub fn restore_if_version(
        &self,
        namespace: &str,
        key: &str,
        snapshot: Option<CachedValue>,
        expected: EntryVersion,
    ) -> bool {
        let mut entries = self.lock_entries();
        let current = entries
            .get(namespace)
            .and_then(|bucket| bucket.get(key))
            .map(|entry| entry.version);

        if current != Some(expected) {
            drop(entries);
            debug!(
                namespace,
                key,
                expected = expected.0,
                "Rollback skipped: entry was overwritten by a younger write"
            );
            return false;
        }

        match snapshot {
            Some(value) => {
                let version =
                    EntryVersion(self.shared.next_version.fetch_add(1, Ordering::Relaxed));
                let bucket = entries.entry(namespace.to_string()).or_default();
                let observers = bucket.get(key).map(|e| e.observers).unwrap_or(0);
                let mut entry = CacheEntry::new(value, version);
                entry.observers = observers;
                bucket.insert(key.to_string(), entry);
            }
            None => {
                if let Some(bucket) = entries.get_mut(namespace) {
                    bucket.remove(key);
                }
            }
        }
        drop(entries);

        self.mark_dirty();
        debug!(namespace, key, "Rollback restored pre-mutation snapshot");
        true
    }

    // =========================================================================
    // Persistence Support (used by persist module)
    // =========================================================================

    /// Swaps the dirty flag, returning whether a flush is due.
    pub(crate) fn take_dirty(&self) -> bool {
        self.shared.dirty.swap(false, Ordering::AcqRel)
    }

    /// Clones out every entry for snapshotting.
    pub(crate) fn export_entries(&self) -> Vec<(String, String, CachedValue)> {
        let entries = self.lock_entries();
        let mut out = Vec::new();
        for (namespace, bucket) in entries.iter() {
            for (key, entry) in bucket.iter() {
                out.push((namespace.clone(), key.clone(), entry.value.clone()));
            }
        }
        out
    }

    /// Installs entries from a rehydrated snapshot. Only used at startup,
    /// before any live writes.
    pub(crate) fn import_entries(&self, imported: Vec<(String, String, CachedValue)>) {
        let mut entries = self.lock_entries();
        for (namespace, key, value) in imported {
            let version = EntryVersion(self.shared.next_version.fetch_add(1, Ordering::Relaxed));
            entries
                .entry(namespace)
                .or_default()
                .insert(key, CacheEntry::new(value, version));
        }
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn lock_entries(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<String, HashMap<String, CacheEntry>>> {
        // A poisoned lock means a panic mid-replacement; the map itself is
        // still structurally sound because writes are single insert calls.
        self.shared
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn mark_dirty(&self) {
        self.shared.dirty.store(true, Ordering::Release);
    }
}

// =============================================================================
// Claim Types
// =============================================================================

enum Claim {
    /// This caller owns the fetch for the slot.
    Leader(FetchClaim),
    /// Another caller is fetching; wait for the channel to close.
    Follower(watch::Receiver<()>),
}

/// RAII claim on an in-flight prefetch slot. Dropping the claim removes the
/// slot and wakes every follower, including on panic or early return.
struct FetchClaim {
    shared: Arc<CacheShared>,
    slot: (String, String),
}

impl Drop for FetchClaim {
    fn drop(&mut self) {
        let mut in_flight = self
            .shared
            .in_flight
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        // Dropping the sender closes the channel; followers observe Err.
        in_flight.remove(&self.slot);
    }
}

/// RAII observer registration; decrements the entry's count on drop.
pub struct ObserverGuard {
    shared: Arc<CacheShared>,
    namespace: String,
    key: String,
}

impl Drop for ObserverGuard {
    fn drop(&mut self) {
        let mut entries = self
            .shared
            .entries
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(entry) = entries
            .get_mut(&self.namespace)
            .and_then(|bucket| bucket.get_mut(&self.key))
        {
            entry.observers = entry.observers.saturating_sub(1);
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
