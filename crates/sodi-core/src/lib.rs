//! # sodi-core: Pure Business Logic for the Sodiluxe Offline Core
//!
//! This crate is the **heart** of the Sodiluxe offline core. It contains all
//! business logic as pure functions with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  Sodiluxe Offline Core Architecture                     │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    Frontend (Next.js)                           │   │
//! │  │    Sales UI ──► Payment Modal ──► Credit Dashboard             │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    sodi-client                                  │   │
//! │  │    optimistic create/update/delete, add_payment_to_sale        │   │
//! │  └──────────┬─────────────────────────────────────┬────────────────┘   │
//! │             │                                     │                    │
//! │  ┌──────────▼──────────┐             ┌────────────▼────────────────┐   │
//! │  │     sodi-cache      │             │        sodi-store           │   │
//! │  │  TTL query cache    │             │  remote store gateway       │   │
//! │  └──────────┬──────────┘             └────────────┬────────────────┘   │
//! │             │                                     │                    │
//! │  ┌──────────▼─────────────────────────────────────▼────────────────┐   │
//! │  │               ★ sodi-core (THIS CRATE) ★                        │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────┐  ┌───────────┐  ┌───────────┐  ┌───────────┐  │   │
//! │  │   │   types   │  │   money   │  │  payment  │  │   error   │  │   │
//! │  │   │  Record   │  │   Money   │  │ reconcile │  │   typed   │  │   │
//! │  │   │   Sale    │  │  (cents)  │  │ validate  │  │  errors   │  │   │
//! │  │   └───────────┘  └───────────┘  └───────────┘  └───────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Record, Sale, PaymentMethod, etc.)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`payment`] - Payment reconciliation calculator
//! - [`error`] - Domain error types
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in cents (i64) to avoid float errors
//! 4. **Explicit Errors**: All errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use sodi_core::money::Money;
//! use sodi_core::payment::{calculate_sale_status, validate_payment};
//! use sodi_core::types::SaleStatus;
//!
//! let total = Money::from_cents(100_000);
//! let paid = Money::from_cents(100_000);
//!
//! // A fully paid sale is completed
//! assert_eq!(calculate_sale_status(total, paid), SaleStatus::Completed);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod money;
pub mod payment;
pub mod types;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use sodi_core::Money` instead of
// `use sodi_core::money::Money`

pub use error::{CoreError, CoreResult, PaymentError};
pub use money::Money;
pub use payment::{
    apply_payment, calculate_sale_status, calculate_total_paid, can_add_payment, payment_stats,
    validate_payment, PaymentStats,
};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Collection holding sale records.
///
/// ## Why constants?
/// Collection names cross three crates (cache namespaces, store collections,
/// client orchestration). A single definition keeps a typo from silently
/// splitting a namespace.
pub const SALES_COLLECTION: &str = "sales";

/// Collection holding product records.
pub const PRODUCTS_COLLECTION: &str = "products";

/// Collection holding client (customer) records.
pub const CLIENTS_COLLECTION: &str = "clients";
