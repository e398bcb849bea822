//! # Domain Types
//!
//! Core domain types used throughout the Sodiluxe offline core.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │     Record      │   │      Sale       │   │ PaymentBreakdown│       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (RecordId)  │   │  id             │   │  cash_cents     │       │
//! │  │  created_at     │   │  total_cents    │   │  card_cents     │       │
//! │  │  updated_at     │   │  paid_cents     │   │  mobile_wallet  │       │
//! │  │  fields (JSON)  │   │  remaining      │   │  check / gift   │       │
//! │  └─────────────────┘   │  status         │   │  transfer       │       │
//! │                        │  is_credit      │   └─────────────────┘       │
//! │  ┌─────────────────┐   └─────────────────┘   ┌─────────────────┐       │
//! │  │   RecordId      │   ┌─────────────────┐   │ PaymentMethod   │       │
//! │  │  ─────────────  │   │   SaleStatus    │   │  ─────────────  │       │
//! │  │  Permanent(id)  │   │  Pending        │   │  Cash, Card,    │       │
//! │  │  Pending(uuid)  │   │  Completed      │   │  MobileWallet,  │       │
//! │  └─────────────────┘   │  Cancelled      │   │  Check, Gift,   │       │
//! │                        └─────────────────┘   │  Transfer       │       │
//! │                                              └─────────────────┘       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Pending Id Pattern
//! Optimistic creates insert a record into the cache before the store has
//! assigned an id. Those records carry `RecordId::Pending(uuid)`, which
//! renders as `temp-<uuid>` and is rejected by every store implementation.
//! Downstream code therefore cannot accidentally persist or link against an
//! id that is not yet real.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;

/// A partial set of record fields, applied on top of an existing record.
pub type FieldPatch = Map<String, Value>;

// =============================================================================
// Record Id
// =============================================================================

/// Identity of a record: either a store-assigned id or a local placeholder.
///
/// ## Variants
/// - `Permanent`: opaque unique id assigned by the remote store
/// - `Pending`: locally-generated id for an optimistic insert, never
///   persisted; the store-assigned id supersedes it after refetch
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum RecordId {
    /// Store-assigned, durable id.
    Permanent(String),
    /// Locally-generated id for a not-yet-persisted optimistic insert.
    Pending(Uuid),
}

/// Prefix marking a pending id in its string form.
const PENDING_ID_PREFIX: &str = "temp-";

impl RecordId {
    /// Generates a fresh pending id for an optimistic insert.
    pub fn new_pending() -> Self {
        RecordId::Pending(Uuid::new_v4())
    }

    /// True if this id was assigned by the store.
    #[inline]
    pub const fn is_permanent(&self) -> bool {
        matches!(self, RecordId::Permanent(_))
    }

    /// True if this id is a local optimistic placeholder.
    #[inline]
    pub const fn is_pending(&self) -> bool {
        matches!(self, RecordId::Pending(_))
    }

    /// Returns the permanent id string, if assigned.
    pub fn as_permanent(&self) -> Option<&str> {
        match self {
            RecordId::Permanent(id) => Some(id),
            RecordId::Pending(_) => None,
        }
    }
}

impl std::fmt::Display for RecordId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordId::Permanent(id) => f.write_str(id),
            RecordId::Pending(token) => write!(f, "{PENDING_ID_PREFIX}{token}"),
        }
    }
}

impl From<RecordId> for String {
    fn from(id: RecordId) -> String {
        id.to_string()
    }
}

impl TryFrom<String> for RecordId {
    type Error = CoreError;

    fn try_from(raw: String) -> Result<Self, Self::Error> {
        match raw.strip_prefix(PENDING_ID_PREFIX) {
            Some(token) => {
                let uuid = Uuid::parse_str(token).map_err(|_| CoreError::InvalidId(raw.clone()))?;
                Ok(RecordId::Pending(uuid))
            }
            None if raw.is_empty() => Err(CoreError::InvalidId(raw)),
            None => Ok(RecordId::Permanent(raw)),
        }
    }
}

impl From<&str> for RecordId {
    /// Convenience for permanent ids in call sites and tests.
    fn from(id: &str) -> Self {
        RecordId::Permanent(id.to_string())
    }
}

// =============================================================================
// Record
// =============================================================================

/// A uniquely-identified, field-mapped unit of persisted data.
///
/// Records are grouped into named collections ("sales", "products", ...).
/// The `fields` map is opaque JSON; typed views like [`Sale`] decode from it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Record identity. Pending only for in-cache optimistic inserts.
    pub id: RecordId,

    /// When the record was created (system field).
    pub created_at: DateTime<Utc>,

    /// When the record was last updated (system field).
    pub updated_at: DateTime<Utc>,

    /// The record's domain fields as opaque JSON.
    pub fields: Map<String, Value>,
}

impl Record {
    /// Creates a record with a fresh pending id and current-time timestamps.
    ///
    /// Used by the optimistic create projection; the store never sees this
    /// record directly, only its `fields`.
    pub fn new_pending(fields: Map<String, Value>) -> Self {
        let now = Utc::now();
        Record {
            id: RecordId::new_pending(),
            created_at: now,
            updated_at: now,
            fields,
        }
    }

    /// Returns a field value by name.
    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Overlays `patch` onto the record's fields and refreshes `updated_at`.
    pub fn apply_patch(&mut self, patch: &FieldPatch, now: DateTime<Utc>) {
        for (key, value) in patch {
            self.fields.insert(key.clone(), value.clone());
        }
        self.updated_at = now;
    }
}

// =============================================================================
// Record Page
// =============================================================================

/// A paginated list result: one page of records plus the collection total.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordPage {
    /// Records in this page.
    pub items: Vec<Record>,

    /// Total matching records in the collection (not just this page).
    pub total: u64,
}

impl RecordPage {
    /// An empty page.
    pub fn empty() -> Self {
        RecordPage {
            items: Vec::new(),
            total: 0,
        }
    }
}

// =============================================================================
// Sale Status
// =============================================================================

/// The status of a sale.
///
/// Cancellation is a status transition, never a record deletion. The
/// reconciliation calculator only ever produces `Pending` or `Completed`;
/// `Cancelled` is an explicit, externally-driven transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum SaleStatus {
    /// Sale has an outstanding balance.
    Pending,
    /// Sale is fully paid.
    Completed,
    /// Sale was cancelled by staff.
    Cancelled,
}

impl Default for SaleStatus {
    fn default() -> Self {
        SaleStatus::Pending
    }
}

impl std::fmt::Display for SaleStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            SaleStatus::Pending => "pending",
            SaleStatus::Completed => "completed",
            SaleStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

// =============================================================================
// Payment Method
// =============================================================================

/// Accepted tender types for a sale.
///
/// Every method is an enum variant mapped to a [`PaymentBreakdown`] field
/// through [`PaymentMethod::field_name`], so a mistyped method name is a
/// compile error instead of a silent zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Physical cash payment.
    Cash,
    /// Card payment on external terminal.
    Card,
    /// Mobile wallet transfer (Wave, Orange Money, ...).
    MobileWallet,
    /// Bank check.
    Check,
    /// Gift check.
    CheckGift,
    /// Bank transfer.
    Transfer,
}

impl PaymentMethod {
    /// Every accepted payment method, in reconciliation order.
    pub const ALL: [PaymentMethod; 6] = [
        PaymentMethod::Cash,
        PaymentMethod::Card,
        PaymentMethod::MobileWallet,
        PaymentMethod::Check,
        PaymentMethod::CheckGift,
        PaymentMethod::Transfer,
    ];

    /// The record field carrying this method's paid amount.
    pub const fn field_name(self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash_cents",
            PaymentMethod::Card => "card_cents",
            PaymentMethod::MobileWallet => "mobile_wallet_cents",
            PaymentMethod::Check => "check_cents",
            PaymentMethod::CheckGift => "check_gift_cents",
            PaymentMethod::Transfer => "transfer_cents",
        }
    }
}

// =============================================================================
// Payment Breakdown
// =============================================================================

/// Per-method paid amounts on a sale, in cents.
///
/// ## Invariant
/// `sum(all fields) == Sale::paid_cents`. The reconciliation calculator is
/// the only code that recomputes the aggregate; everything else treats the
/// breakdown as the source of truth.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentBreakdown {
    pub cash_cents: i64,
    pub card_cents: i64,
    pub mobile_wallet_cents: i64,
    pub check_cents: i64,
    pub check_gift_cents: i64,
    pub transfer_cents: i64,
}

impl PaymentBreakdown {
    /// Returns the amount paid through `method`.
    pub const fn amount(&self, method: PaymentMethod) -> Money {
        let cents = match method {
            PaymentMethod::Cash => self.cash_cents,
            PaymentMethod::Card => self.card_cents,
            PaymentMethod::MobileWallet => self.mobile_wallet_cents,
            PaymentMethod::Check => self.check_cents,
            PaymentMethod::CheckGift => self.check_gift_cents,
            PaymentMethod::Transfer => self.transfer_cents,
        };
        Money::from_cents(cents)
    }

    /// Adds `amount` to the given method's total.
    pub fn add(&mut self, method: PaymentMethod, amount: Money) {
        let slot = match method {
            PaymentMethod::Cash => &mut self.cash_cents,
            PaymentMethod::Card => &mut self.card_cents,
            PaymentMethod::MobileWallet => &mut self.mobile_wallet_cents,
            PaymentMethod::Check => &mut self.check_cents,
            PaymentMethod::CheckGift => &mut self.check_gift_cents,
            PaymentMethod::Transfer => &mut self.transfer_cents,
        };
        *slot += amount.cents();
    }

    /// Iterates over `(method, amount)` pairs in reconciliation order.
    pub fn iter(&self) -> impl Iterator<Item = (PaymentMethod, Money)> + '_ {
        PaymentMethod::ALL
            .iter()
            .map(move |&method| (method, self.amount(method)))
    }
}

// =============================================================================
// Sale
// =============================================================================

/// A sale transaction.
///
/// ## Invariants
/// - `paid_cents == sum(payments per-method fields)`
/// - `remaining_cents == total_cents - paid_cents`
/// - `remaining_cents <= 0` implies `status == Completed`
/// - Created when a transaction is finalized; mutated only through
///   payment-addition or status-update operations; never deleted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Sale {
    /// Permanent record id.
    pub id: String,

    /// Client (customer) this sale belongs to.
    pub client_id: String,

    /// Staff member who registered the sale.
    pub seller_id: String,

    /// Sale total in cents.
    pub total_cents: i64,

    /// Aggregate paid amount in cents. Derived from `payments`.
    pub paid_cents: i64,

    /// Outstanding balance in cents. Derived: `total_cents - paid_cents`.
    pub remaining_cents: i64,

    /// Current sale status.
    pub status: SaleStatus,

    /// Whether this is a credit sale (payable in installments).
    pub is_credit: bool,

    /// Per-method paid amounts.
    #[serde(flatten)]
    pub payments: PaymentBreakdown,

    /// When the sale was finalized.
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    /// When the sale was last updated.
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Sale {
    /// Returns the sale total as Money.
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }

    /// Returns the aggregate paid amount as Money.
    #[inline]
    pub fn paid(&self) -> Money {
        Money::from_cents(self.paid_cents)
    }

    /// Returns the outstanding balance as Money.
    #[inline]
    pub fn remaining(&self) -> Money {
        Money::from_cents(self.remaining_cents)
    }

    /// Decodes a sale from a raw record.
    ///
    /// ## Errors
    /// `CoreError::InvalidRecord` when required fields are missing or have
    /// the wrong type (e.g. a stale shape from a previous deployment).
    pub fn from_record(record: &Record) -> CoreResult<Sale> {
        let mut fields = record.fields.clone();
        fields.insert("id".into(), Value::String(record.id.to_string()));
        fields.insert(
            "created_at".into(),
            serde_json::to_value(record.created_at).unwrap_or(Value::Null),
        );
        fields.insert(
            "updated_at".into(),
            serde_json::to_value(record.updated_at).unwrap_or(Value::Null),
        );

        serde_json::from_value(Value::Object(fields)).map_err(|e| CoreError::InvalidRecord {
            entity: "Sale".to_string(),
            reason: e.to_string(),
        })
    }

    /// Encodes the sale's domain fields for a record body or field patch.
    ///
    /// System fields (`id`, `created_at`, `updated_at`) are owned by the
    /// store and stripped here.
    pub fn to_fields(&self) -> FieldPatch {
        let value = serde_json::to_value(self).unwrap_or(Value::Null);
        let mut fields = match value {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        fields.remove("id");
        fields.remove("created_at");
        fields.remove("updated_at");
        fields
    }
}

// =============================================================================
// Payment Input
// =============================================================================

/// A single payment captured at the register or on a credit installment.
#[derive(Debug, Clone, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentInput {
    /// Amount paid in cents.
    pub amount_cents: i64,

    /// Tender type.
    pub method: PaymentMethod,

    /// When the payment was taken. Defaults to now at orchestration time.
    #[ts(as = "Option<String>")]
    pub date: Option<DateTime<Utc>>,

    /// External reference (check number, wallet transaction id, ...).
    pub reference: Option<String>,
}

impl PaymentInput {
    /// Returns the amount as Money.
    #[inline]
    pub fn amount(&self) -> Money {
        Money::from_cents(self.amount_cents)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_sale() -> Sale {
        let now = Utc::now();
        Sale {
            id: "s1".to_string(),
            client_id: "c1".to_string(),
            seller_id: "u1".to_string(),
            total_cents: 100_000,
            paid_cents: 40_000,
            remaining_cents: 60_000,
            status: SaleStatus::Pending,
            is_credit: true,
            payments: PaymentBreakdown {
                cash_cents: 40_000,
                ..Default::default()
            },
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_pending_id_round_trip() {
        let id = RecordId::new_pending();
        let rendered = id.to_string();
        assert!(rendered.starts_with("temp-"));

        let parsed = RecordId::try_from(rendered).unwrap();
        assert_eq!(parsed, id);
        assert!(parsed.is_pending());
        assert_eq!(parsed.as_permanent(), None);
    }

    #[test]
    fn test_permanent_id_round_trip() {
        let id = RecordId::try_from("sale-001".to_string()).unwrap();
        assert!(id.is_permanent());
        assert_eq!(id.as_permanent(), Some("sale-001"));
        assert_eq!(id.to_string(), "sale-001");
    }

    #[test]
    fn test_invalid_ids_rejected() {
        assert!(RecordId::try_from(String::new()).is_err());
        assert!(RecordId::try_from("temp-not-a-uuid".to_string()).is_err());
    }

    #[test]
    fn test_record_apply_patch() {
        let mut fields = Map::new();
        fields.insert("name".into(), Value::String("X".into()));
        fields.insert("price".into(), Value::from(10));
        let mut record = Record::new_pending(fields);
        let before = record.updated_at;

        let mut patch = Map::new();
        patch.insert("price".into(), Value::from(12));
        let later = before + chrono::Duration::seconds(1);
        record.apply_patch(&patch, later);

        assert_eq!(record.field("price"), Some(&Value::from(12)));
        assert_eq!(record.field("name"), Some(&Value::String("X".into())));
        assert_eq!(record.updated_at, later);
    }

    #[test]
    fn test_breakdown_lookup_covers_all_methods() {
        let mut breakdown = PaymentBreakdown::default();
        for (i, method) in PaymentMethod::ALL.into_iter().enumerate() {
            breakdown.add(method, Money::from_cents((i as i64 + 1) * 100));
        }
        for (i, method) in PaymentMethod::ALL.into_iter().enumerate() {
            assert_eq!(breakdown.amount(method).cents(), (i as i64 + 1) * 100);
        }
        let total: i64 = breakdown.iter().map(|(_, amount)| amount.cents()).sum();
        assert_eq!(total, 2100);
    }

    #[test]
    fn test_sale_record_round_trip() {
        let sale = sample_sale();
        let record = Record {
            id: RecordId::Permanent(sale.id.clone()),
            created_at: sale.created_at,
            updated_at: sale.updated_at,
            fields: sale.to_fields(),
        };

        // System fields must not leak into the record body.
        assert!(record.fields.get("id").is_none());
        assert!(record.fields.get("created_at").is_none());

        let decoded = Sale::from_record(&record).unwrap();
        assert_eq!(decoded, sale);
    }

    #[test]
    fn test_sale_from_record_rejects_bad_shape() {
        let mut fields = Map::new();
        fields.insert("total_cents".into(), Value::String("oops".into()));
        let record = Record {
            id: RecordId::Permanent("s1".into()),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            fields,
        };

        let err = Sale::from_record(&record).unwrap_err();
        assert!(matches!(err, CoreError::InvalidRecord { .. }));
    }
}
