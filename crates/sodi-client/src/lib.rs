//! # sodi-client: Optimistic Mutation Controller for Sodiluxe
//!
//! The orchestration layer of the offline core: every write goes cache-first
//! (the register UI updates instantly), then to the store, then reconciles
//! by invalidation or rollback.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      Sodiluxe Offline Core                      │
//! │                                                                 │
//! │  Register / Back-office UI                                      │
//! │       │                                                         │
//! │       ▼                                                         │
//! │  ┌─────────────────────────────────────────────────────────┐   │
//! │  │                 sodi-client (THIS CRATE)                │   │
//! │  │                                                         │   │
//! │  │  ┌──────────────────────┐   ┌────────────────────────┐ │   │
//! │  │  │ OptimisticController │   │ MutationEvent/Notifier │ │   │
//! │  │  │ create/update/delete │──►│ (events → toasts)      │ │   │
//! │  │  │ add_payment_to_sale  │   └────────────────────────┘ │   │
//! │  │  └──────┬───────┬───────┘                              │   │
//! │  └─────────┼───────┼──────────────────────────────────────┘   │
//! │            ▼       ▼                                           │
//! │      sodi-cache  sodi-store        (math: sodi-core)          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`mutation`] - The optimistic mutation cycle and its projections
//! - [`payments`] - `add_payment_to_sale` orchestration
//! - [`notify`] - Mutation events and the notification adapter
//! - [`error`] - Client error types

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod mutation;
pub mod notify;
pub mod payments;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{ClientError, ClientResult};
pub use mutation::OptimisticController;
pub use notify::{
    ChannelSink, MutationEvent, MutationObserver, MutationOp, MutationOutcome, NoOpObserver,
    Notification, NotificationKind, NotificationPriority, NotificationSink, Notifier,
};
pub use payments::PaymentOutcome;
