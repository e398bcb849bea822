//! # Optimistic Mutation Controller
//!
//! Runs every write through the same cycle: project the change into the
//! cache synchronously (the UI sees it immediately), then call the store,
//! then reconcile.
//!
//! ## Mutation Cycle
//! ```text
//! ┌──────┐ snapshot + project ┌────────────────────┐  await store  ┌───────────┐
//! │ Idle │───────────────────►│ Optimistic-Applied │──────────────►│ In-Flight │
//! └──────┘   (synchronous)    └────────────────────┘               └─────┬─────┘
//!                                                                        │
//!                              ┌─────────────────────────────────────────┤
//!                              ▼ Ok                                      ▼ Err
//!                   ┌─────────────────────┐                  ┌──────────────────────┐
//!                   │      Committed      │                  │      Rolled-Back     │
//!                   │ invalidate namespace│                  │ CAS-restore snapshot │
//!                   │ emit success event  │                  │ emit failure event   │
//!                   └─────────────────────┘                  │ propagate the error  │
//!                                                            └──────────────────────┘
//! ```
//!
//! ## Rollback Safety
//! Each mutation remembers the version stamp its optimistic write received.
//! Rollback restores the snapshot only while that stamp is still current;
//! if a younger mutation has written since, the rollback is skipped and the
//! younger mutation's invalidation (or TTL) reconciles the entry.

use std::sync::Arc;

use chrono::Utc;
use tracing::{debug, info, warn};

use sodi_cache::{CachedValue, QueryCache};
use sodi_core::{FieldPatch, Record, RecordId, RecordPage};
use sodi_store::RemoteStore;

use crate::error::ClientResult;
use crate::notify::{MutationEvent, MutationObserver, MutationOp, MutationOutcome, NoOpObserver};

// =============================================================================
// Controller
// =============================================================================

/// Orchestrates optimistic create/update/delete against one cache instance
/// and one store.
///
/// The cache is injected, never ambient: two controllers over two caches
/// never interfere.
pub struct OptimisticController {
    cache: QueryCache,
    store: Arc<dyn RemoteStore>,
    observer: Arc<dyn MutationObserver>,
}

impl OptimisticController {
    pub fn new(cache: QueryCache, store: Arc<dyn RemoteStore>) -> Self {
        Self::with_observer(cache, store, Arc::new(NoOpObserver))
    }

    pub fn with_observer(
        cache: QueryCache,
        store: Arc<dyn RemoteStore>,
        observer: Arc<dyn MutationObserver>,
    ) -> Self {
        OptimisticController {
            cache,
            store,
            observer,
        }
    }

    /// The cache this controller projects into.
    pub fn cache(&self) -> &QueryCache {
        &self.cache
    }

    pub(crate) fn store(&self) -> &dyn RemoteStore {
        self.store.as_ref()
    }

    // =========================================================================
    // Mutations
    // =========================================================================

    /// Creates a record. The cached list under `(collection, list_key)` is
    /// immediately prepended with a pending-id record; the permanent id
    /// arrives with the store's response and the follow-up refetch.
    pub async fn create(
        &self,
        collection: &str,
        list_key: &str,
        fields: FieldPatch,
    ) -> ClientResult<Record> {
        let pending = Record::new_pending(fields.clone());
        let pending_id = pending.id.clone();

        let snapshot = self.cache.get_query_data(collection, list_key);
        let projected = project_create(snapshot.as_ref(), pending);
        let written = self
            .cache
            .set_query_data(collection, list_key, CachedValue::Page(projected));
        debug!(collection, list_key, id = %pending_id, "Optimistic create applied");

        match self.store.create(collection, fields).await {
            Ok(record) => {
                self.commit(MutationOp::Create, collection, record.id.clone());
                Ok(record)
            }
            Err(err) => {
                self.cache
                    .restore_if_version(collection, list_key, snapshot, written);
                self.roll_back(MutationOp::Create, collection, pending_id, &err);
                Err(err.into())
            }
        }
    }

    /// Updates a record. The cached entry under `(collection, list_key)` has
    /// the patch overlaid on the matching record immediately.
    pub async fn update(
        &self,
        collection: &str,
        list_key: &str,
        id: &str,
        patch: FieldPatch,
    ) -> ClientResult<Record> {
        let snapshot = self.cache.get_query_data(collection, list_key);
        let written = snapshot.clone().map(|value| {
            let projected = project_update(value, id, &patch);
            self.cache.set_query_data(collection, list_key, projected)
        });
        debug!(collection, list_key, id, "Optimistic update applied");

        match self.store.update(collection, id, patch).await {
            Ok(record) => {
                self.commit(MutationOp::Update, collection, record.id.clone());
                Ok(record)
            }
            Err(err) => {
                if let Some(written) = written {
                    self.cache
                        .restore_if_version(collection, list_key, snapshot, written);
                }
                self.roll_back(MutationOp::Update, collection, RecordId::from(id), &err);
                Err(err.into())
            }
        }
    }

    /// Deletes a record. The cached list drops the record immediately;
    /// rollback restores the snapshot (original position not guaranteed
    /// beyond what the snapshot held).
    pub async fn delete(&self, collection: &str, list_key: &str, id: &str) -> ClientResult<()> {
        let snapshot = self.cache.get_query_data(collection, list_key);
        let written = match snapshot.clone() {
            Some(CachedValue::Page(page)) => {
                let projected = project_delete(page, id);
                Some(
                    self.cache
                        .set_query_data(collection, list_key, CachedValue::Page(projected)),
                )
            }
            // A cached single record can't be projected to "absent";
            // the success-path invalidation reconciles it.
            _ => None,
        };
        debug!(collection, list_key, id, "Optimistic delete applied");

        match self.store.delete(collection, id).await {
            Ok(()) => {
                self.commit(MutationOp::Delete, collection, RecordId::from(id));
                Ok(())
            }
            Err(err) => {
                if let Some(written) = written {
                    self.cache
                        .restore_if_version(collection, list_key, snapshot, written);
                }
                self.roll_back(MutationOp::Delete, collection, RecordId::from(id), &err);
                Err(err.into())
            }
        }
    }

    // =========================================================================
    // Reconciliation
    // =========================================================================

    fn commit(&self, op: MutationOp, collection: &str, id: RecordId) {
        // Flag every query in the namespace stale; observers refetch the
        // authoritative state on their next read.
        self.cache.invalidate_namespace(collection);
        info!(collection, id = %id, ?op, "Mutation committed");
        self.observer.on_mutation(&MutationEvent {
            op,
            collection: collection.to_string(),
            id,
            outcome: MutationOutcome::Committed,
        });
    }

    fn roll_back(
        &self,
        op: MutationOp,
        collection: &str,
        id: RecordId,
        err: &sodi_store::StoreError,
    ) {
        warn!(collection, id = %id, ?op, error = %err, "Mutation rolled back");
        self.observer.on_mutation(&MutationEvent {
            op,
            collection: collection.to_string(),
            id,
            outcome: MutationOutcome::RolledBack {
                reason: err.to_string(),
            },
        });
    }
}

// =============================================================================
// Projections
// =============================================================================

/// Prepends the pending record to the cached page (newest-first convention)
/// and bumps the total.
fn project_create(snapshot: Option<&CachedValue>, pending: Record) -> RecordPage {
    let mut page = match snapshot {
        Some(CachedValue::Page(page)) => page.clone(),
        _ => RecordPage::empty(),
    };
    page.items.insert(0, pending);
    page.total += 1;
    page
}

/// Overlays the patch on the matching record wherever it appears in the
/// cached value. Non-matching records are untouched.
fn project_update(value: CachedValue, id: &str, patch: &FieldPatch) -> CachedValue {
    let now = Utc::now();
    match value {
        CachedValue::Single(mut record) => {
            if record.id.to_string() == id {
                record.apply_patch(patch, now);
            }
            CachedValue::Single(record)
        }
        CachedValue::Page(mut page) => {
            for record in &mut page.items {
                if record.id.to_string() == id {
                    record.apply_patch(patch, now);
                }
            }
            CachedValue::Page(page)
        }
    }
}

/// Drops the record from the page; total only shrinks when something was
/// actually removed.
fn project_delete(mut page: RecordPage, id: &str) -> RecordPage {
    let before = page.items.len();
    page.items.retain(|record| record.id.to_string() != id);
    if page.items.len() < before {
        page.total = page.total.saturating_sub(1);
    }
    page
}

// =============================================================================
// Unit Tests
// =============================================================================
