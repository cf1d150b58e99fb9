mod common;

use common::*;
use pay_recon::domain::error::ReconError;
use pay_recon::domain::event::{EventChannel, EventRef, IncomingEvent, IncomingEventParams, WebhookKind};
use pay_recon::domain::order::{
    META_DECLINE_REASON, META_PAYMENT_METHOD, OrderStatus, PaymentState, TransactionType,
};
use pay_recon::domain::store::OrderStore;
use pay_recon::services::transactions::{ProcessOutcome, SkipReason};

// ── Scenario A: capture-type transaction settles ───────────────────────────

#[tokio::test]
async fn settled_capture_completes_order() {
    let w = World::new();
    let order = make_order(42, TransactionType::Capture);
    w.orders.insert(order.clone());
    w.gateway
        .put_transaction(make_remote_tx("tx_1", "success", MAR10_NOON));

    let outcome = w.transactions.process(&order_event(&order, "tx_1")).await.unwrap();
    assert_eq!(outcome, ProcessOutcome::Applied(PaymentState::Completed));

    let saved = w.orders.get(42).unwrap().unwrap();
    assert_eq!(saved.payment_state, PaymentState::Completed);
    assert_eq!(saved.status, OrderStatus::Completed);
    assert_eq!(saved.time_updated, MAR10_NOON);
    assert_eq!(saved.time_completed, MAR10_NOON);
    assert_eq!(saved.transaction_id.as_deref(), Some("tx_1"));
    assert_eq!(saved.meta(META_PAYMENT_METHOD), Some("card"));
    assert_eq!(w.orders.completion_count(42), 1, "completion hook fired exactly once");
}

// ── Scenario B: authorisation settles but does not complete ────────────────

#[tokio::test]
async fn settled_authorisation_goes_on_hold() {
    let w = World::new();
    let order = make_order(42, TransactionType::Authorisation);
    w.orders.insert(order.clone());
    w.gateway
        .put_transaction(make_remote_tx("tx_1", "success", MAR10_NOON));

    let outcome = w.transactions.process(&order_event(&order, "tx_1")).await.unwrap();
    assert_eq!(outcome, ProcessOutcome::Applied(PaymentState::Authorised));

    let saved = w.orders.get(42).unwrap().unwrap();
    assert_eq!(saved.status, OrderStatus::OnHold);
    assert_eq!(saved.time_completed, 0);
    assert_eq!(w.orders.completion_count(42), 0, "no completion hook for authorisations");
}

#[tokio::test]
async fn executed_status_goes_on_hold() {
    let w = World::new();
    let order = make_order(42, TransactionType::Capture);
    w.orders.insert(order.clone());
    w.gateway
        .put_transaction(make_remote_tx("tx_1", "executed", MAR10_NOON));

    let outcome = w.transactions.process(&order_event(&order, "tx_1")).await.unwrap();
    assert_eq!(outcome, ProcessOutcome::Applied(PaymentState::Executed));
    assert_eq!(w.orders.get(42).unwrap().unwrap().status, OrderStatus::OnHold);
}

#[tokio::test]
async fn decline_fails_order_and_records_reason() {
    let w = World::new();
    let order = make_order(42, TransactionType::Capture);
    w.orders.insert(order.clone());
    let mut tx = make_remote_tx("tx_1", "blocked", MAR10_NOON);
    tx.decline_reason = Some("insufficient_funds".to_string());
    w.gateway.put_transaction(tx);

    let outcome = w.transactions.process(&order_event(&order, "tx_1")).await.unwrap();
    assert_eq!(outcome, ProcessOutcome::Applied(PaymentState::Failed));

    let saved = w.orders.get(42).unwrap().unwrap();
    assert_eq!(saved.status, OrderStatus::Failed);
    assert_eq!(saved.meta(META_DECLINE_REASON), Some("insufficient_funds"));
}

// ── Idempotency ────────────────────────────────────────────────────────────

#[tokio::test]
async fn processing_the_same_event_twice_is_a_noop() {
    let w = World::new();
    let order = make_order(42, TransactionType::Capture);
    w.orders.insert(order.clone());
    w.gateway
        .put_transaction(make_remote_tx("tx_1", "success", MAR10_NOON));

    let event = order_event(&order, "tx_1");
    let first = w.transactions.process(&event).await.unwrap();
    let after_first = w.orders.get(42).unwrap().unwrap();

    let second = w.transactions.process(&event).await.unwrap();
    let after_second = w.orders.get(42).unwrap().unwrap();

    assert_eq!(first, ProcessOutcome::Applied(PaymentState::Completed));
    assert_eq!(second, ProcessOutcome::Skipped(SkipReason::DuplicateTransaction));
    assert_eq!(after_first.payment_state, after_second.payment_state);
    assert_eq!(after_first.time_updated, after_second.time_updated);
    assert_eq!(w.orders.completion_count(42), 1, "hook still fired exactly once");
}

// ── Ordering: reverse arrival keeps the newer state ────────────────────────

#[tokio::test]
async fn stale_transaction_cannot_regress_a_newer_update() {
    let w = World::new();
    let order = make_order(42, TransactionType::Authorisation);
    w.orders.insert(order.clone());
    w.gateway
        .put_transaction(make_remote_tx("tx_old", "blocked", MAR10_MIDNIGHT));
    w.gateway
        .put_transaction(make_remote_tx("tx_new", "success", MAR10_NOON));

    // Newer event lands first...
    let newer = w.transactions.process(&order_event(&order, "tx_new")).await.unwrap();
    assert_eq!(newer, ProcessOutcome::Applied(PaymentState::Authorised));

    // ...then the older one arrives late and is rejected.
    let older = w.transactions.process(&order_event(&order, "tx_old")).await.unwrap();
    assert_eq!(older, ProcessOutcome::Skipped(SkipReason::StaleTimestamp));

    let saved = w.orders.get(42).unwrap().unwrap();
    assert_eq!(saved.payment_state, PaymentState::Authorised);
    assert_eq!(saved.transaction_id.as_deref(), Some("tx_new"));
}

// ── Guards ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn payment_method_flow_events_are_skipped() {
    let w = World::new();
    let event = card_new_event(7, "card_1", "tx_1");

    let outcome = w.transactions.process(&event).await.unwrap();
    assert_eq!(outcome, ProcessOutcome::Skipped(SkipReason::NotAnOrder));
}

#[tokio::test]
async fn wrong_order_key_is_rejected() {
    let w = World::new();
    let order = make_order(42, TransactionType::Capture);
    w.orders.insert(order.clone());

    let event = IncomingEvent::new(IncomingEventParams {
        channel: EventChannel::Webhook,
        kind: WebhookKind::StatusUpdate,
        reference: Some(EventRef::Order {
            id: 42,
            key: "wrong-key".to_string(),
        }),
        transaction_id: "tx_1".to_string(),
        card_id: None,
        status: "success".to_string(),
        timestamp_raw: String::new(),
        card_update: None,
    });

    let err = w.transactions.process(&event).await.unwrap_err();
    assert_eq!(err.to_string(), "No valid order ID in incoming data.");
}

#[tokio::test]
async fn gateway_fetch_failure_aborts() {
    let w = World::new();
    let order = make_order(42, TransactionType::Capture);
    w.orders.insert(order.clone());
    // No transaction programmed: the fetch fails.

    let err = w.transactions.process(&order_event(&order, "tx_missing")).await.unwrap_err();
    assert!(matches!(err, ReconError::Gateway(_)));
    assert_eq!(err.to_string(), "Failed to get transaction.");

    let saved = w.orders.get(42).unwrap().unwrap();
    assert_eq!(saved.payment_state, PaymentState::None, "order untouched");
}

#[tokio::test]
async fn finalized_order_rejects_status_updates() {
    let w = World::new();
    let mut order = make_order(42, TransactionType::Capture);
    order.status = OrderStatus::Cancelled;
    w.orders.insert(order.clone());
    w.gateway
        .put_transaction(make_remote_tx("tx_1", "success", MAR10_NOON));

    let err = w.transactions.process(&order_event(&order, "tx_1")).await.unwrap_err();
    assert!(matches!(err, ReconError::StateGuard(_)));
    assert!(err.to_string().contains("cancelled"), "message names the current status: {err}");
}
