//! # Cache Entries
//!
//! The value and bookkeeping types stored under each `(namespace, key)`.
//!
//! ## Entry Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Cache Entry Lifecycle                               │
//! │                                                                         │
//! │  set_query_data ──► fresh (age <= ttl, version = n)                    │
//! │        │                                                                │
//! │        ├── time passes ──────────► stale (age > ttl)                   │
//! │        │                                                                │
//! │        ├── invalidate_namespace ─► flagged (value kept, never fresh)   │
//! │        │                                                                │
//! │        └── set_query_data ───────► fresh again (version = n+1)         │
//! │                                                                         │
//! │  The version stamp only ever increases. A mutation remembers the       │
//! │  version its optimistic write produced; rollback restores the          │
//! │  snapshot only while that version is still current.                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};

use sodi_core::{Record, RecordPage};

// =============================================================================
// Cached Value
// =============================================================================

/// A cached query result: a single record or one page of a list query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CachedValue {
    /// Result of a get-by-id query.
    Single(Record),
    /// Result of a list query: page of records plus total count.
    Page(RecordPage),
}

impl CachedValue {
    /// Returns the page, if this is a list result.
    pub fn as_page(&self) -> Option<&RecordPage> {
        match self {
            CachedValue::Page(page) => Some(page),
            CachedValue::Single(_) => None,
        }
    }

    /// Returns the record, if this is a single result.
    pub fn as_single(&self) -> Option<&Record> {
        match self {
            CachedValue::Single(record) => Some(record),
            CachedValue::Page(_) => None,
        }
    }
}

impl From<Record> for CachedValue {
    fn from(record: Record) -> Self {
        CachedValue::Single(record)
    }
}

impl From<RecordPage> for CachedValue {
    fn from(page: RecordPage) -> Self {
        CachedValue::Page(page)
    }
}

// =============================================================================
// Entry Version
// =============================================================================

/// Monotonic stamp identifying one write to one entry.
///
/// Returned by `set_query_data` and consumed by `restore_if_version`: the
/// optimistic-lock compare-and-swap that keeps a rollback from clobbering a
/// younger mutation's write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntryVersion(pub(crate) u64);

// =============================================================================
// Cache Entry
// =============================================================================

/// One cached query result with its staleness bookkeeping.
#[derive(Debug, Clone)]
pub(crate) struct CacheEntry {
    /// The cached value. Replaced wholesale, never mutated in place.
    pub value: CachedValue,

    /// When the value was last written.
    pub updated_at: Instant,

    /// Write stamp for CAS rollback.
    pub version: EntryVersion,

    /// Set by `invalidate_namespace`: value is kept for display but is
    /// never reported fresh until overwritten.
    pub invalidated: bool,

    /// Number of currently registered observers.
    pub observers: u32,
}

impl CacheEntry {
    pub fn new(value: CachedValue, version: EntryVersion) -> Self {
        CacheEntry {
            value,
            updated_at: Instant::now(),
            version,
            invalidated: false,
            observers: 0,
        }
    }

    /// True while the entry may be treated as authoritative.
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        !self.invalidated && self.updated_at.elapsed() <= ttl
    }
}

// =============================================================================
// Cache Stats
// =============================================================================

/// Diagnostic counters over the whole cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CacheStats {
    /// Total entries across all namespaces.
    pub total: usize,
    /// Entries older than TTL or flagged by invalidation.
    pub stale: usize,
    /// Entries with at least one registered observer.
    pub active: usize,
}

// =============================================================================
// Unit Tests
// =============================================================================
