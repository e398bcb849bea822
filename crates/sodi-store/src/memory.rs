//! # In-Memory Store
//!
//! A `RemoteStore` backed by nested maps. Used by tests and as a scratch
//! backend; supports one-shot failure injection so rollback paths can be
//! exercised without a real transport.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{Mutex, RwLock};
use tracing::debug;
use uuid::Uuid;

use sodi_core::{FieldPatch, Record, RecordId, RecordPage};

use crate::error::{StoreError, StoreResult};
use crate::gateway::RemoteStore;
use crate::query::ListQuery;

/// In-memory document store.
///
/// ## Failure Injection
/// `fail_next` arms an error that the next operation (any operation)
/// returns instead of executing; `fail_after(n, ...)` lets `n` operations
/// through first. One armed error at a time.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// collection -> id -> record. BTreeMap keeps listing deterministic.
    collections: RwLock<HashMap<String, BTreeMap<String, Record>>>,

    /// Queued injected failure, armed with a skip count.
    injected: Mutex<Option<Injected>>,
}

#[derive(Debug)]
struct Injected {
    skip: usize,
    err: StoreError,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arms an error to be returned by the next operation.
    pub async fn fail_next(&self, err: StoreError) {
        self.fail_after(0, err).await;
    }

    /// Arms an error to be returned by the operation after `skip`
    /// successful ones. Lets tests fail a specific step of a multi-call
    /// orchestration.
    pub async fn fail_after(&self, skip: usize, err: StoreError) {
        *self.injected.lock().await = Some(Injected { skip, err });
    }

    /// Seeds a record directly, bypassing create semantics. Test helper.
    pub async fn seed(&self, collection: &str, record: Record) {
        let mut collections = self.collections.write().await;
        collections
            .entry(collection.to_string())
            .or_default()
            .insert(record.id.to_string(), record);
    }

    async fn take_injected(&self) -> StoreResult<()> {
        let mut injected = self.injected.lock().await;
        if injected.as_ref().is_some_and(|slot| slot.skip == 0) {
            if let Some(armed) = injected.take() {
                return Err(armed.err);
            }
        } else if let Some(slot) = injected.as_mut() {
            slot.skip -= 1;
        }
        Ok(())
    }
}

/// Pending ids never reach a store; refusing them makes the invariant
/// testable instead of implicit.
fn reject_pending(id: &str) -> StoreResult<()> {
    if id.starts_with("temp-") {
        return Err(StoreError::PendingId { id: id.to_string() });
    }
    Ok(())
}

#[async_trait]
impl RemoteStore for MemoryStore {
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Record> {
        self.take_injected().await?;
        reject_pending(id)?;

        let collections = self.collections.read().await;
        collections
            .get(collection)
            .and_then(|bucket| bucket.get(id))
            .cloned()
            .ok_or_else(|| StoreError::not_found(collection, id))
    }

    async fn list(&self, collection: &str, query: &ListQuery) -> StoreResult<RecordPage> {
        self.take_injected().await?;

        let collections = self.collections.read().await;
        let records: Vec<Record> = collections
            .get(collection)
            .map(|bucket| bucket.values().cloned().collect())
            .unwrap_or_default();
        Ok(query.apply(records))
    }

    async fn create(&self, collection: &str, fields: FieldPatch) -> StoreResult<Record> {
        self.take_injected().await?;

        let now = Utc::now();
        let id = Uuid::new_v4().to_string();
        let record = Record {
            id: RecordId::Permanent(id.clone()),
            created_at: now,
            updated_at: now,
            fields,
        };

        let mut collections = self.collections.write().await;
        let bucket = collections.entry(collection.to_string()).or_default();
        if bucket.contains_key(&id) {
            return Err(StoreError::Duplicate {
                collection: collection.to_string(),
                id,
            });
        }
        bucket.insert(id.clone(), record.clone());
        debug!(collection, id = %id, "Record created");
        Ok(record)
    }

    async fn update(&self, collection: &str, id: &str, patch: FieldPatch) -> StoreResult<Record> {
        self.take_injected().await?;
        reject_pending(id)?;

        let mut collections = self.collections.write().await;
        let record = collections
            .get_mut(collection)
            .and_then(|bucket| bucket.get_mut(id))
            .ok_or_else(|| StoreError::not_found(collection, id))?;

        record.apply_patch(&patch, Utc::now());
        debug!(collection, id, fields = patch.len(), "Record updated");
        Ok(record.clone())
    }

    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()> {
        self.take_injected().await?;
        reject_pending(id)?;

        let mut collections = self.collections.write().await;
        let removed = collections
            .get_mut(collection)
            .and_then(|bucket| bucket.remove(id));
        if removed.is_none() {
            return Err(StoreError::not_found(collection, id));
        }
        debug!(collection, id, "Record deleted");
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
