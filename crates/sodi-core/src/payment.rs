//! # Payment Reconciliation Calculator
//!
//! Pure, side-effect-free functions that keep a sale's aggregate payment
//! fields consistent with its per-method breakdown.
//!
//! ## Reconciliation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   Payment Reconciliation                                │
//! │                                                                         │
//! │  PaymentInput { amount: 400.00, method: Cash }                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  validate_payment(sale, amount)                                        │
//! │       │  InvalidAmount? ExceedsRemaining? AlreadySettled?              │
//! │       ▼                                                                 │
//! │  apply_payment(sale, input)      ← pure projection, clones the sale    │
//! │       │                                                                 │
//! │       ├── payments.cash_cents += 40_000                                │
//! │       ├── paid_cents      = calculate_total_paid(payments)             │
//! │       ├── remaining_cents = total_cents - paid_cents                   │
//! │       └── status          = calculate_sale_status(total, paid)         │
//! │       ▼                                                                 │
//! │  projected Sale — handed to the optimistic Update path                 │
//! │                                                                         │
//! │  INVARIANTS AFTER EVERY PROJECTION:                                    │
//! │  • paid == sum(per-method fields)                                      │
//! │  • remaining == total - paid                                           │
//! │  • remaining <= 0  ⇒  status == Completed                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Validation failures are returned as [`PaymentError`] values and are
//! produced before any cache or store write, so the caller has nothing to
//! roll back.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::PaymentError;
use crate::money::Money;
use crate::types::{PaymentBreakdown, PaymentInput, Sale, SaleStatus};

// =============================================================================
// Aggregates
// =============================================================================

/// Sums all per-method amounts into the aggregate paid amount.
///
/// Deterministic, no error conditions: the breakdown's fields are typed
/// integers, so there is no "missing or non-numeric" case to coerce.
pub fn calculate_total_paid(payments: &PaymentBreakdown) -> Money {
    payments
        .iter()
        .fold(Money::zero(), |acc, (_, amount)| acc + amount)
}

/// Derives the sale status from its total and aggregate paid amount.
///
/// Returns `Completed` once the balance reaches (or crosses) zero, else
/// `Pending`. Never returns `Cancelled`: cancellation is an explicit,
/// externally-driven transition, not a reconciliation outcome.
pub fn calculate_sale_status(total: Money, paid: Money) -> SaleStatus {
    if (total - paid).cents() <= 0 {
        SaleStatus::Completed
    } else {
        SaleStatus::Pending
    }
}

// =============================================================================
// Validation
// =============================================================================

/// Validates a prospective payment against the sale's current balance.
///
/// ## Rules (checked in order)
/// 1. `InvalidAmount` — amount must be strictly positive
/// 2. `AlreadySettled` — the sale must still have an outstanding balance
/// 3. `ExceedsRemaining` — the payment must not overshoot the balance
pub fn validate_payment(sale: &Sale, amount: Money) -> Result<(), PaymentError> {
    if !amount.is_positive() {
        return Err(PaymentError::InvalidAmount {
            amount_cents: amount.cents(),
        });
    }

    let remaining = sale.remaining();
    if remaining.cents() <= 0 {
        return Err(PaymentError::AlreadySettled);
    }

    if amount > remaining {
        return Err(PaymentError::ExceedsRemaining {
            amount_cents: amount.cents(),
            remaining_cents: remaining.cents(),
        });
    }

    Ok(())
}

// =============================================================================
// Projection
// =============================================================================

/// Projects a validated payment onto a cloned copy of the sale.
///
/// Validates first, then bumps the method's breakdown field and recomputes
/// every derived aggregate. The input sale is untouched; timestamps are the
/// caller's concern (the mutation layer refreshes `updated_at`).
pub fn apply_payment(sale: &Sale, input: &PaymentInput) -> Result<Sale, PaymentError> {
    validate_payment(sale, input.amount())?;

    let mut projected = sale.clone();
    projected.payments.add(input.method, input.amount());
    projected.paid_cents = calculate_total_paid(&projected.payments).cents();
    projected.remaining_cents = projected.total_cents - projected.paid_cents;
    projected.status = calculate_sale_status(projected.total(), projected.paid());

    Ok(projected)
}

// =============================================================================
// Derived Stats
// =============================================================================

/// Payment progress figures derived from a sale. Pure, no errors.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentStats {
    pub total_cents: i64,
    pub paid_cents: i64,
    pub remaining_cents: i64,
    /// Paid share of the total, 0-100, rounded to 2 decimals.
    pub payment_percentage: f64,
    pub is_fully_paid: bool,
    pub has_partial_payment: bool,
}

/// Derives payment progress figures for display.
pub fn payment_stats(sale: &Sale) -> PaymentStats {
    let is_fully_paid = sale.remaining_cents <= 0;
    PaymentStats {
        total_cents: sale.total_cents,
        paid_cents: sale.paid_cents,
        remaining_cents: sale.remaining_cents,
        payment_percentage: sale.paid().percentage_of(sale.total()),
        is_fully_paid,
        has_partial_payment: sale.paid_cents > 0 && !is_fully_paid,
    }
}

/// True iff another installment can be taken on this sale.
///
/// Only credit sales accept follow-up payments; cash-and-carry sales are
/// settled at the register.
pub fn can_add_payment(sale: &Sale) -> bool {
    sale.is_credit && sale.remaining_cents > 0
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PaymentMethod;
    use chrono::Utc;

    fn credit_sale(total_cents: i64, paid_cents: i64) -> Sale {
        let now = Utc::now();
        let mut payments = PaymentBreakdown::default();
        payments.cash_cents = paid_cents;
        Sale {
            id: "s1".to_string(),
            client_id: "c1".to_string(),
            seller_id: "u1".to_string(),
            total_cents,
            paid_cents,
            remaining_cents: total_cents - paid_cents,
            status: if total_cents - paid_cents <= 0 {
                SaleStatus::Completed
            } else {
                SaleStatus::Pending
            },
            is_credit: true,
            payments,
            created_at: now,
            updated_at: now,
        }
    }

    fn payment(amount_cents: i64, method: PaymentMethod) -> PaymentInput {
        PaymentInput {
            amount_cents,
            method,
            date: None,
            reference: None,
        }
    }

    #[test]
    fn test_total_paid_sums_every_method() {
        let mut payments = PaymentBreakdown::default();
        payments.add(PaymentMethod::Cash, Money::from_cents(100));
        payments.add(PaymentMethod::Card, Money::from_cents(200));
        payments.add(PaymentMethod::Transfer, Money::from_cents(300));
        assert_eq!(calculate_total_paid(&payments).cents(), 600);

        assert_eq!(
            calculate_total_paid(&PaymentBreakdown::default()).cents(),
            0
        );
    }

    #[test]
    fn test_sale_status_thresholds() {
        let total = Money::from_cents(1000);
        assert_eq!(
            calculate_sale_status(total, Money::from_cents(999)),
            SaleStatus::Pending
        );
        assert_eq!(
            calculate_sale_status(total, Money::from_cents(1000)),
            SaleStatus::Completed
        );
        // Over-payment still settles the sale.
        assert_eq!(
            calculate_sale_status(total, Money::from_cents(1001)),
            SaleStatus::Completed
        );
    }

    #[test]
    fn test_validate_payment_boundaries() {
        let sale = credit_sale(100_000, 40_000);

        assert_eq!(
            validate_payment(&sale, Money::from_cents(0)),
            Err(PaymentError::InvalidAmount { amount_cents: 0 })
        );
        assert_eq!(
            validate_payment(&sale, Money::from_cents(-500)),
            Err(PaymentError::InvalidAmount { amount_cents: -500 })
        );

        // Exactly the remaining balance is accepted; one cent over is not.
        assert!(validate_payment(&sale, Money::from_cents(60_000)).is_ok());
        assert_eq!(
            validate_payment(&sale, Money::from_cents(60_001)),
            Err(PaymentError::ExceedsRemaining {
                amount_cents: 60_001,
                remaining_cents: 60_000,
            })
        );
    }

    #[test]
    fn test_validate_payment_settled_sale() {
        let settled = credit_sale(100_000, 100_000);
        assert_eq!(
            validate_payment(&settled, Money::from_cents(1)),
            Err(PaymentError::AlreadySettled)
        );
    }

    #[test]
    fn test_apply_payment_completes_sale() {
        let sale = credit_sale(100_000, 0);
        let projected = apply_payment(&sale, &payment(100_000, PaymentMethod::Cash)).unwrap();

        assert_eq!(projected.paid_cents, 100_000);
        assert_eq!(projected.remaining_cents, 0);
        assert_eq!(projected.status, SaleStatus::Completed);
        assert_eq!(
            calculate_total_paid(&projected.payments).cents(),
            projected.paid_cents
        );

        // The input sale is untouched.
        assert_eq!(sale.paid_cents, 0);
        assert_eq!(sale.status, SaleStatus::Pending);
    }

    #[test]
    fn test_apply_partial_payment_keeps_pending() {
        let sale = credit_sale(100_000, 0);
        let projected = apply_payment(&sale, &payment(40_000, PaymentMethod::MobileWallet)).unwrap();

        assert_eq!(projected.paid_cents, 40_000);
        assert_eq!(projected.remaining_cents, 60_000);
        assert_eq!(projected.status, SaleStatus::Pending);
        assert_eq!(projected.payments.mobile_wallet_cents, 40_000);
    }

    #[test]
    fn test_apply_payment_mixed_methods_reconcile() {
        let sale = credit_sale(100_000, 40_000); // 40k already in cash
        let projected = apply_payment(&sale, &payment(25_000, PaymentMethod::Check)).unwrap();

        assert_eq!(projected.payments.cash_cents, 40_000);
        assert_eq!(projected.payments.check_cents, 25_000);
        assert_eq!(projected.paid_cents, 65_000);
        assert_eq!(projected.remaining_cents, 35_000);
        assert_eq!(
            projected.remaining_cents,
            projected.total_cents - projected.paid_cents
        );
    }

    #[test]
    fn test_payment_stats() {
        let sale = credit_sale(100_000, 40_000);
        let stats = payment_stats(&sale);

        assert_eq!(stats.total_cents, 100_000);
        assert_eq!(stats.paid_cents, 40_000);
        assert_eq!(stats.remaining_cents, 60_000);
        assert_eq!(stats.payment_percentage, 40.0);
        assert!(!stats.is_fully_paid);
        assert!(stats.has_partial_payment);

        let settled = credit_sale(100_000, 100_000);
        let stats = payment_stats(&settled);
        assert!(stats.is_fully_paid);
        assert!(!stats.has_partial_payment);
        assert_eq!(stats.payment_percentage, 100.0);

        let untouched = credit_sale(100_000, 0);
        let stats = payment_stats(&untouched);
        assert!(!stats.is_fully_paid);
        assert!(!stats.has_partial_payment);
    }

    #[test]
    fn test_can_add_payment() {
        assert!(can_add_payment(&credit_sale(100_000, 40_000)));
        assert!(!can_add_payment(&credit_sale(100_000, 100_000)));

        let mut cash_and_carry = credit_sale(100_000, 0);
        cash_and_carry.is_credit = false;
        assert!(!can_add_payment(&cash_and_carry));
    }
}
