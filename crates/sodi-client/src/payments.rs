//! # Payment Orchestration
//!
//! Ties the pure payment math (sodi-core) to the optimistic mutation cycle:
//! fetch the authoritative sale, validate and project the payment, then push
//! the full recomputed field set through an optimistic update.
//!
//! Validation failures are *outcomes*, not errors — an over-payment never
//! touches the cache, never notifies, and is returned as a typed value for
//! the register UI to render inline.

use tracing::{debug, info};

use sodi_core::{apply_payment, PaymentError, PaymentInput, Sale, SALES_COLLECTION};
use sodi_store::ListQuery;

use crate::error::ClientResult;
use crate::mutation::OptimisticController;

/// Result of a payment attempt that reached the orchestration layer.
#[derive(Debug, Clone, PartialEq)]
pub enum PaymentOutcome {
    /// The payment was accepted and committed; the sale reflects the new
    /// aggregates (paid, remaining, status).
    Applied(Sale),

    /// The payment was refused by validation. Nothing was written.
    Rejected(PaymentError),
}

impl PaymentOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, PaymentOutcome::Applied(_))
    }
}

impl OptimisticController {
    /// Records a payment against a sale.
    ///
    /// ## Flow
    /// 1. Fetch the current sale from the store (never trust the cache for
    ///    money math).
    /// 2. Validate + project the payment with the pure calculator.
    /// 3. Push the full recomputed field set as an optimistic update; the
    ///    register sees the new balance immediately.
    ///
    /// ## Returns
    /// - `Ok(PaymentOutcome::Applied(sale))` — committed.
    /// - `Ok(PaymentOutcome::Rejected(err))` — validation refused it; no
    ///   cache write, no notification.
    /// - `Err(ClientError)` — transport fault; any optimistic write was
    ///   rolled back.
    pub async fn add_payment_to_sale(
        &self,
        sale_id: &str,
        payment: &PaymentInput,
        actor_id: &str,
    ) -> ClientResult<PaymentOutcome> {
        let record = self.store().get(SALES_COLLECTION, sale_id).await?;
        let sale = Sale::from_record(&record)?;

        let projected = match apply_payment(&sale, payment) {
            Ok(projected) => projected,
            Err(err) => {
                debug!(
                    sale_id,
                    amount_cents = payment.amount_cents,
                    error = %err,
                    "Payment rejected by validation"
                );
                return Ok(PaymentOutcome::Rejected(err));
            }
        };

        let mut patch = projected.to_fields();
        patch.insert("edited_by".into(), serde_json::Value::String(actor_id.into()));

        let updated = self
            .update(
                SALES_COLLECTION,
                &ListQuery::new().cache_key(),
                sale_id,
                patch,
            )
            .await?;

        let settled = Sale::from_record(&updated)?;
        info!(
            sale_id,
            amount_cents = payment.amount_cents,
            method = ?payment.method,
            remaining_cents = settled.remaining_cents,
            status = %settled.status,
            "Payment recorded"
        );
        Ok(PaymentOutcome::Applied(settled))
    }
}
