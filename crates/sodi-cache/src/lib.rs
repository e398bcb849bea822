//! # sodi-cache: Query Cache for the Sodiluxe Offline Core
//!
//! The single source of truth for "last known" query results, with explicit
//! staleness semantics, namespace-scoped invalidation and a throttled
//! durable mirror.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      sodi-cache (THIS CRATE)                            │
//! │                                                                         │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────────────────┐ │
//! │  │ QueryCache  │  │ CacheEntry  │  │ SnapshotFlusher                │ │
//! │  │ (cache.rs)  │  │ (entry.rs)  │  │ (persist.rs)                   │ │
//! │  │             │  │             │  │                                │ │
//! │  │ set/get/    │  │ value + TTL │  │ Batches snapshot writes to    │ │
//! │  │ invalidate/ │◄─│ + version   │  │ at most one per interval;     │ │
//! │  │ prefetch    │  │ stamp       │  │ rehydrates on startup         │ │
//! │  └─────────────┘  └─────────────┘  └─────────────────────────────────┘ │
//! │                                                                         │
//! │  CONSUMED BY: sodi-client (optimistic mutation controller)             │
//! │  DEPENDS ON:  sodi-core (Record, RecordPage)                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Notes
//! - No module-level singleton: construct a [`QueryCache`] and inject it.
//! - Whole-value replacement only; cached values are never mutated in place.
//! - Every write produces an [`EntryVersion`]; rollbacks are CAS-guarded.
//! - Persistence is best-effort: a failing [`SnapshotStore`] degrades the
//!   cache to memory-only, it never fails a caller.

pub mod cache;
pub mod entry;
pub mod error;
pub mod persist;

pub use cache::{CacheConfig, ObserverGuard, QueryCache, DEFAULT_TTL};
pub use entry::{CacheStats, CachedValue, EntryVersion};
pub use error::{CacheError, CacheResult};
pub use persist::{
    hydrate, persist_snapshot, FileSnapshotStore, MemorySnapshotStore, SnapshotFlusher,
    SnapshotFlusherHandle, SnapshotStore, DEFAULT_FLUSH_INTERVAL, SNAPSHOT_KEY,
};
