//! End-to-end mutation scenarios: optimistic writes, rollback, and the
//! payment lifecycle against an in-process store.

use std::sync::Arc;

use chrono::Utc;
use serde_json::{json, Map, Value};

use sodi_cache::{CacheConfig, CachedValue, QueryCache};
use sodi_client::{
    ChannelSink, Notification, NotificationKind, Notifier, OptimisticController, PaymentOutcome,
};
use sodi_core::{
    FieldPatch, PaymentBreakdown, PaymentInput, PaymentMethod, Record, RecordId, RecordPage, Sale,
    SaleStatus, SALES_COLLECTION,
};
use sodi_store::{ListQuery, MemoryStore, RemoteStore, StoreError};

/// Opt-in log output: `RUST_LOG=debug cargo test -p sodi-client`.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn fields(value: Value) -> FieldPatch {
    match value {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

fn empty_page() -> CachedValue {
    CachedValue::Page(RecordPage::empty())
}

fn controller(
    store: Arc<MemoryStore>,
) -> (
    OptimisticController,
    tokio::sync::mpsc::UnboundedReceiver<Notification>,
) {
    init_tracing();
    let (sink, rx) = ChannelSink::new();
    let controller = OptimisticController::with_observer(
        QueryCache::new(CacheConfig::default()),
        store,
        Arc::new(Notifier::new(Arc::new(sink))),
    );
    (controller, rx)
}

/// Seeds a credit sale with the given total and returns its permanent id.
async fn seed_credit_sale(store: &MemoryStore, total_cents: i64) -> String {
    let now = Utc::now();
    let sale = Sale {
        id: "seeded".to_string(),
        client_id: "client-1".to_string(),
        seller_id: "seller-1".to_string(),
        total_cents,
        paid_cents: 0,
        remaining_cents: total_cents,
        status: SaleStatus::Pending,
        is_credit: true,
        payments: PaymentBreakdown::default(),
        created_at: now,
        updated_at: now,
    };
    let record = store
        .create(SALES_COLLECTION, sale.to_fields())
        .await
        .unwrap();
    record.id.to_string()
}

// =============================================================================
// Optimistic create
// =============================================================================

#[tokio::test]
async fn successful_create_shows_pending_record_then_invalidates() {
    let store = Arc::new(MemoryStore::new());
    let (ctl, mut notifications) = controller(store.clone());
    ctl.cache().set_query_data("products", "list", empty_page());

    let created = ctl
        .create("products", "list", fields(json!({"name": "Lipstick"})))
        .await
        .unwrap();

    // The store assigned a permanent id.
    assert!(created.id.is_permanent());
    assert!(!created.id.to_string().starts_with("temp-"));

    // The cached page still holds the optimistic projection (pending id,
    // total bumped) but is flagged stale so observers refetch.
    let cached = ctl.cache().get_query_data("products", "list").unwrap();
    let page = cached.as_page().unwrap();
    assert_eq!(page.total, 1);
    assert!(page.items[0].id.is_pending());
    assert!(!ctl.cache().is_query_fresh("products", "list"));

    // Refetching through the store yields the permanent record.
    let refetched = store
        .list("products", &ListQuery::new())
        .await
        .unwrap();
    assert_eq!(refetched.total, 1);
    assert_eq!(refetched.items[0].id, created.id);

    let n = notifications.try_recv().unwrap();
    assert_eq!(n.kind, NotificationKind::Success);
}

// =============================================================================
// Failed update rollback
// =============================================================================

#[tokio::test]
async fn failed_update_restores_the_exact_snapshot() {
    let store = Arc::new(MemoryStore::new());
    let (ctl, mut notifications) = controller(store.clone());

    let now = Utc::now();
    let original = CachedValue::Page(RecordPage {
        items: vec![Record {
            id: RecordId::from("p-1"),
            created_at: now,
            updated_at: now,
            fields: fields(json!({"name": "Lipstick", "price": 1500})),
        }],
        total: 1,
    });
    ctl.cache()
        .set_query_data("products", "list", original.clone());

    store
        .fail_next(StoreError::Connection("gateway unreachable".into()))
        .await;

    let err = ctl
        .update("products", "list", "p-1", fields(json!({"price": 1800})))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("gateway unreachable"));

    // Byte-for-byte the pre-mutation value, not a re-derived one.
    assert_eq!(
        ctl.cache().get_query_data("products", "list"),
        Some(original)
    );

    let n = notifications.try_recv().unwrap();
    assert_eq!(n.kind, NotificationKind::Error);
    assert!(n.message.contains("gateway unreachable"));
}

// =============================================================================
// Payment lifecycle
// =============================================================================

#[tokio::test]
async fn full_payment_completes_the_sale() {
    let store = Arc::new(MemoryStore::new());
    let (ctl, _notifications) = controller(store.clone());
    let sale_id = seed_credit_sale(&store, 1000).await;

    let outcome = ctl
        .add_payment_to_sale(
            &sale_id,
            &PaymentInput {
                amount_cents: 1000,
                method: PaymentMethod::Card,
                date: None,
                reference: None,
            },
            "cashier-7",
        )
        .await
        .unwrap();

    let sale = match outcome {
        PaymentOutcome::Applied(sale) => sale,
        other => panic!("expected Applied, got {other:?}"),
    };
    assert_eq!(sale.status, SaleStatus::Completed);
    assert_eq!(sale.paid_cents, 1000);
    assert_eq!(sale.remaining_cents, 0);
    assert_eq!(sale.payments.card_cents, 1000);

    // The stored record agrees with the returned projection.
    let stored = store.get(SALES_COLLECTION, &sale_id).await.unwrap();
    let stored = Sale::from_record(&stored).unwrap();
    assert_eq!(stored.status, SaleStatus::Completed);
    assert_eq!(stored.remaining_cents, 0);
}

#[tokio::test]
async fn partial_payment_keeps_the_sale_pending() {
    let store = Arc::new(MemoryStore::new());
    let (ctl, _notifications) = controller(store.clone());
    let sale_id = seed_credit_sale(&store, 1000).await;

    let outcome = ctl
        .add_payment_to_sale(
            &sale_id,
            &PaymentInput {
                amount_cents: 400,
                method: PaymentMethod::Cash,
                date: None,
                reference: None,
            },
            "cashier-7",
        )
        .await
        .unwrap();

    let sale = match outcome {
        PaymentOutcome::Applied(sale) => sale,
        other => panic!("expected Applied, got {other:?}"),
    };
    assert_eq!(sale.status, SaleStatus::Pending);
    assert_eq!(sale.paid_cents, 400);
    assert_eq!(sale.remaining_cents, 600);
}

#[tokio::test]
async fn overpayment_is_rejected_without_touching_anything() {
    let store = Arc::new(MemoryStore::new());
    let (ctl, mut notifications) = controller(store.clone());
    let sale_id = seed_credit_sale(&store, 1000).await;

    let outcome = ctl
        .add_payment_to_sale(
            &sale_id,
            &PaymentInput {
                amount_cents: 1001,
                method: PaymentMethod::Cash,
                date: None,
                reference: None,
            },
            "cashier-7",
        )
        .await
        .unwrap();
    assert!(!outcome.is_applied());

    // No mutation ran: the stored sale is untouched and no notification
    // was produced (rejections render inline at the register).
    let stored = store.get(SALES_COLLECTION, &sale_id).await.unwrap();
    let stored = Sale::from_record(&stored).unwrap();
    assert_eq!(stored.paid_cents, 0);
    assert!(notifications.try_recv().is_err());
}

#[tokio::test]
async fn payment_update_fault_rolls_back_and_propagates() {
    let store = Arc::new(MemoryStore::new());
    let (ctl, mut notifications) = controller(store.clone());
    let sale_id = seed_credit_sale(&store, 1000).await;

    // Prime the cached sales list with the store's current state.
    let page = store
        .list(SALES_COLLECTION, &ListQuery::new())
        .await
        .unwrap();
    let list_key = ListQuery::new().cache_key();
    ctl.cache()
        .set_query_data(SALES_COLLECTION, &list_key, CachedValue::Page(page.clone()));

    // Let the orchestration's sale fetch through, fail the update.
    let original = store.get(SALES_COLLECTION, &sale_id).await.unwrap();
    store
        .fail_after(1, StoreError::Connection("offline".into()))
        .await;

    let err = ctl
        .add_payment_to_sale(
            &sale_id,
            &PaymentInput {
                amount_cents: 400,
                method: PaymentMethod::Cash,
                date: None,
                reference: None,
            },
            "cashier-7",
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("offline"));

    // The store is unchanged and the optimistic projection was rolled back.
    let stored = store.get(SALES_COLLECTION, &sale_id).await.unwrap();
    assert_eq!(stored, original);
    assert_eq!(
        ctl.cache().get_query_data(SALES_COLLECTION, &list_key),
        Some(CachedValue::Page(page))
    );

    let n = notifications.try_recv().unwrap();
    assert_eq!(n.kind, NotificationKind::Error);
}

#[tokio::test]
async fn payment_fetch_fault_propagates_without_writes() {
    let store = Arc::new(MemoryStore::new());
    let (ctl, mut notifications) = controller(store.clone());
    let sale_id = seed_credit_sale(&store, 1000).await;

    store
        .fail_next(StoreError::Connection("offline".into()))
        .await;

    let err = ctl
        .add_payment_to_sale(
            &sale_id,
            &PaymentInput {
                amount_cents: 400,
                method: PaymentMethod::Cash,
                date: None,
                reference: None,
            },
            "cashier-7",
        )
        .await
        .unwrap_err();
    assert!(err.to_string().contains("offline"));

    // The fault hit before any projection: no notification either.
    let stored = store.get(SALES_COLLECTION, &sale_id).await.unwrap();
    let stored = Sale::from_record(&stored).unwrap();
    assert_eq!(stored.paid_cents, 0);
    assert!(notifications.try_recv().is_err());
}
