//! # Error Types
//!
//! Domain-specific error types for sodi-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  sodi-core errors (this file)                                           │
//! │  ├── CoreError        - General domain errors                          │
//! │  └── PaymentError     - Payment validation failures (typed results)    │
//! │                                                                         │
//! │  sodi-store errors (separate crate)                                     │
//! │  └── StoreError       - Gateway/transport failures                     │
//! │                                                                         │
//! │  sodi-client errors (separate crate)                                    │
//! │  └── ClientError      - What the UI layer sees                         │
//! │                                                                         │
//! │  PaymentError is a VALUE, not an exception: validation failures are    │
//! │  returned in a typed outcome and never trigger an optimistic write.    │
//! │  Transport failures flow CoreError → StoreError → ClientError.         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (sale id, amounts, etc.)
//! 3. Errors are enum variants, never String
//! 4. Each error variant maps to a user-facing message

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent domain logic failures outside the payment
/// validation path. They should be caught and translated to user-friendly
/// messages.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Sale cannot be found.
    #[error("Sale not found: {0}")]
    SaleNotFound(String),

    /// Sale is not in a state that allows the requested operation.
    ///
    /// ## When This Occurs
    /// - Adding a payment to a cancelled sale
    /// - Cancelling an already cancelled sale
    #[error("Sale {sale_id} is {current_status}, cannot perform operation")]
    InvalidSaleStatus {
        sale_id: String,
        current_status: String,
    },

    /// A record's fields could not be decoded into the expected domain type.
    ///
    /// ## When This Occurs
    /// - A sale record is missing `total_cents` or carries a wrong type
    /// - A stale persisted shape from a previous deployment leaked through
    #[error("Invalid record for {entity}: {reason}")]
    InvalidRecord { entity: String, reason: String },

    /// A record id string could not be parsed.
    #[error("Invalid record id '{0}'")]
    InvalidId(String),

    /// Payment validation failure (wraps PaymentError).
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),
}

// =============================================================================
// Payment Error
// =============================================================================

/// Payment validation errors.
///
/// Returned as typed values by the payment reconciliation calculator.
/// By the time one of these is produced, nothing has been written to the
/// cache or the store, so there is never anything to roll back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PaymentError {
    /// Payment amount is zero or negative.
    #[error("Invalid payment amount: {amount_cents} cents (must be positive)")]
    InvalidAmount { amount_cents: i64 },

    /// Payment amount exceeds what is left to pay on the sale.
    #[error("Payment of {amount_cents} cents exceeds remaining balance of {remaining_cents} cents")]
    ExceedsRemaining {
        amount_cents: i64,
        remaining_cents: i64,
    },

    /// The sale is already fully paid.
    #[error("Sale is already settled, no further payment accepted")]
    AlreadySettled,
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = PaymentError::ExceedsRemaining {
            amount_cents: 50_001,
            remaining_cents: 50_000,
        };
        assert_eq!(
            err.to_string(),
            "Payment of 50001 cents exceeds remaining balance of 50000 cents"
        );

        let err = PaymentError::InvalidAmount { amount_cents: -5 };
        assert!(err.to_string().contains("-5"));
    }

    #[test]
    fn test_payment_converts_to_core_error() {
        let payment_err = PaymentError::AlreadySettled;
        let core_err: CoreError = payment_err.into();
        assert!(matches!(core_err, CoreError::Payment(_)));
    }
}
