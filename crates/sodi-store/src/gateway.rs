//! # Remote Store Gateway Contract
//!
//! The trait every document-store backend implements. The real Sodiluxe
//! backend is a hosted BaaS; its HTTP/JSON protocol is entirely encapsulated
//! behind this seam and never re-surfaces in the core.
//!
//! ## Contract
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     RemoteStore Contract                                │
//! │                                                                         │
//! │  get(collection, id)          Record            or NotFound            │
//! │  list(collection, query)      RecordPage (items + total)               │
//! │  create(collection, fields)   Record with a STORE-ASSIGNED id          │
//! │  update(collection, id, p)    Record after patch    or NotFound        │
//! │  delete(collection, id)       ()                    or NotFound        │
//! │                                                                         │
//! │  RULES:                                                                │
//! │  • ids are opaque strings; the store assigns them on create            │
//! │  • pending ids (temp-*) are refused with StoreError::PendingId         │
//! │  • update patches overlay fields, they never replace the record        │
//! │  • timestamps (created_at/updated_at) are store-owned system fields    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;

use sodi_core::{FieldPatch, Record, RecordPage};

use crate::error::StoreResult;
use crate::query::ListQuery;

/// A generic document store holding named collections of records.
///
/// All methods are async and non-blocking; no method imposes a timeout,
/// callers impose their own where needed.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Fetches one record by id.
    async fn get(&self, collection: &str, id: &str) -> StoreResult<Record>;

    /// Lists records matching the query predicates.
    async fn list(&self, collection: &str, query: &ListQuery) -> StoreResult<RecordPage>;

    /// Creates a record; the store assigns the permanent id and timestamps.
    async fn create(&self, collection: &str, fields: FieldPatch) -> StoreResult<Record>;

    /// Overlays `patch` onto an existing record and refreshes `updated_at`.
    async fn update(&self, collection: &str, id: &str, patch: FieldPatch) -> StoreResult<Record>;

    /// Deletes a record by id.
    async fn delete(&self, collection: &str, id: &str) -> StoreResult<()>;
}
