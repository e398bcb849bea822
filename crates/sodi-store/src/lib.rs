//! # sodi-store: Record Gateway for Sodiluxe
//!
//! This crate defines the [`RemoteStore`] trait — the boundary every mutation
//! and prefetch crosses — together with two implementations and the query
//! language used to describe list reads.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Sodiluxe Offline Core                      │
//! │                                                                 │
//! │  sodi-client (optimistic mutations, payments)                   │
//! │       │                                                         │
//! │       ▼                                                         │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                 sodi-store (THIS CRATE)                 │   │
//! │  │                                                         │   │
//! │  │   ┌────────────┐   ┌─────────────┐   ┌─────────────┐   │   │
//! │  │   │ RemoteStore│   │  ListQuery  │   │  Backends   │   │   │
//! │  │   │  (trait)   │   │ (predicates │   │ SqliteStore │   │   │
//! │  │   │            │   │  + paging)  │   │ MemoryStore │   │   │
//! │  │   └────────────┘   └─────────────┘   └─────────────┘   │   │
//! │  └─────────────────────────────────────────────────────────┘   │
//! │       │                                                         │
//! │       ▼                                                         │
//! │  SQLite file (WAL)  /  in-process maps (tests)                  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`gateway`] - The [`RemoteStore`] trait and its contract
//! - [`query`] - [`ListQuery`] predicates and their evaluation
//! - [`sqlite`] - SQLite-backed document store
//! - [`memory`] - In-memory store with failure injection
//! - [`error`] - Store error types

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod gateway;
pub mod memory;
pub mod query;
pub mod sqlite;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{StoreError, StoreResult};
pub use gateway::RemoteStore;
pub use memory::MemoryStore;
pub use query::{ListQuery, Predicate};
pub use sqlite::{SqliteConfig, SqliteStore};
