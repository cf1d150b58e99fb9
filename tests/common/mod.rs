#![allow(dead_code)]

use hmac::{Hmac, Mac};
use pay_recon::domain::card::PaymentToken;
use pay_recon::domain::error::ReconError;
use pay_recon::domain::event::{
    EventChannel, EventRef, IncomingEvent, IncomingEventParams, WebhookKind,
};
use pay_recon::domain::gateway::{
    CancelOutcome, CaptureOutcome, RefundOutcome, RemoteCard, RemoteProcessorGateway,
    RemoteTransaction,
};
use pay_recon::domain::order::{Order, TransactionType};
use pay_recon::domain::store::Clock;
use pay_recon::infra::memory::{MemoryCustomers, MemoryDispatch, MemoryOrders, MemoryTokens};
use pay_recon::services::authenticator::IncomingEventAuthenticator;
use pay_recon::services::payment_methods::PaymentMethodService;
use pay_recon::services::transactions::TransactionService;
use sha2::Sha256;
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

pub const SECRET: &str = "test-shared-secret";

// 2024-03-10 / 2024-03-11 UTC reference points.
pub const MAR10_MIDNIGHT: i64 = 1710028800;
pub const MAR10_NOON: i64 = 1710072000;
pub const MAR10_LAST_SECOND: i64 = 1710115199;
pub const MAR11_MIDNIGHT: i64 = 1710115200;
pub const MAR11_NOON: i64 = 1710158400;

// ── Clock ──────────────────────────────────────────────────────────────────

pub struct FixedClock(AtomicI64);

impl FixedClock {
    pub fn at(epoch: i64) -> Self {
        Self(AtomicI64::new(epoch))
    }

    pub fn set(&self, epoch: i64) {
        self.0.store(epoch, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now_epoch(&self) -> i64 {
        self.0.load(Ordering::SeqCst)
    }
}

// ── Programmable gateway ───────────────────────────────────────────────────

type GwFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ReconError>> + Send + 'a>>;

#[derive(Default)]
pub struct FakeGateway {
    transactions: Mutex<HashMap<String, RemoteTransaction>>,
    cards: Mutex<HashMap<String, RemoteCard>>,
    capture_outcome: Mutex<Option<CaptureOutcome>>,
    cancel_outcome: Mutex<Option<CancelOutcome>>,
    refund_outcome: Mutex<Option<RefundOutcome>>,
    deactivated: Mutex<Vec<String>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put_transaction(&self, tx: RemoteTransaction) {
        self.transactions
            .lock()
            .unwrap()
            .insert(tx.id.clone(), tx);
    }

    pub fn put_card(&self, card: RemoteCard) {
        self.cards.lock().unwrap().insert(card.id.clone(), card);
    }

    pub fn set_capture(&self, outcome: CaptureOutcome) {
        *self.capture_outcome.lock().unwrap() = Some(outcome);
    }

    pub fn set_cancel(&self, outcome: CancelOutcome) {
        *self.cancel_outcome.lock().unwrap() = Some(outcome);
    }

    pub fn set_refund(&self, outcome: RefundOutcome) {
        *self.refund_outcome.lock().unwrap() = Some(outcome);
    }

    pub fn deactivated_cards(&self) -> Vec<String> {
        self.deactivated.lock().unwrap().clone()
    }
}

impl RemoteProcessorGateway for FakeGateway {
    fn get_transaction(&self, id: &str) -> GwFuture<'_, RemoteTransaction> {
        let found = self.transactions.lock().unwrap().get(id).cloned();
        Box::pin(async move {
            found.ok_or_else(|| ReconError::Gateway("transaction fetch failed".to_string()))
        })
    }

    fn capture_transaction(&self, _id: &str, _amount_minor: i64) -> GwFuture<'_, CaptureOutcome> {
        let outcome = self.capture_outcome.lock().unwrap().clone();
        Box::pin(async move {
            outcome.ok_or_else(|| ReconError::Gateway("capture call failed".to_string()))
        })
    }

    fn cancel_transaction(&self, _id: &str, _reference: &str) -> GwFuture<'_, CancelOutcome> {
        let outcome = self.cancel_outcome.lock().unwrap().clone();
        Box::pin(async move {
            outcome.ok_or_else(|| ReconError::Gateway("cancel call failed".to_string()))
        })
    }

    fn refund_transaction(
        &self,
        _id: &str,
        _amount_minor: i64,
        _reference: &str,
    ) -> GwFuture<'_, RefundOutcome> {
        let outcome = self.refund_outcome.lock().unwrap().clone();
        Box::pin(async move {
            outcome.ok_or_else(|| ReconError::Gateway("refund call failed".to_string()))
        })
    }

    fn get_card(&self, card_id: &str) -> GwFuture<'_, RemoteCard> {
        let found = self.cards.lock().unwrap().get(card_id).cloned();
        Box::pin(async move {
            found.ok_or_else(|| ReconError::Gateway("card fetch failed".to_string()))
        })
    }

    fn update_card(&self, card_id: &str, is_active: bool) -> GwFuture<'_, ()> {
        if !is_active {
            self.deactivated.lock().unwrap().push(card_id.to_string());
        }
        Box::pin(async move { Ok(()) })
    }
}

// ── World ──────────────────────────────────────────────────────────────────

pub struct World {
    pub gateway: Arc<FakeGateway>,
    pub orders: Arc<MemoryOrders>,
    pub customers: Arc<MemoryCustomers>,
    pub tokens: Arc<MemoryTokens>,
    pub dispatch: Arc<MemoryDispatch>,
    pub clock: Arc<FixedClock>,
    pub transactions: TransactionService,
    pub payment_methods: PaymentMethodService,
    pub authenticator: IncomingEventAuthenticator,
}

impl World {
    pub fn new() -> Self {
        Self::with_tokenization(true)
    }

    pub fn with_tokenization(enabled: bool) -> Self {
        let gateway = Arc::new(FakeGateway::new());
        let orders = Arc::new(MemoryOrders::new());
        let customers = Arc::new(MemoryCustomers::new());
        let tokens = Arc::new(MemoryTokens::new());
        let clock = Arc::new(FixedClock::at(MAR11_NOON));
        let dispatch = Arc::new(MemoryDispatch::new(30, clock.clone()));

        let transactions = TransactionService::new(gateway.clone(), orders.clone(), clock.clone());
        let payment_methods = PaymentMethodService::new(
            gateway.clone(),
            customers.clone(),
            tokens.clone(),
            dispatch.clone(),
            enabled,
            "pay_recon",
        );

        Self {
            gateway,
            orders,
            customers,
            tokens,
            dispatch,
            clock,
            transactions,
            payment_methods,
            authenticator: IncomingEventAuthenticator::new(SECRET.into()),
        }
    }
}

// ── Builders ───────────────────────────────────────────────────────────────

pub fn make_order(id: u64, transaction_type: TransactionType) -> Order {
    let mut order = Order::new(id, format!("key{id}"), transaction_type);
    order.total_minor = 10_000;
    order
}

pub fn make_remote_tx(id: &str, status: &str, created: i64) -> RemoteTransaction {
    RemoteTransaction {
        id: id.to_string(),
        status: status.to_string(),
        created_timestamp: created,
        payment_method: "card".to_string(),
        card_id: None,
        decline_reason: None,
    }
}

pub fn make_remote_card(id: &str, customer_id: &str, active: bool) -> RemoteCard {
    RemoteCard {
        id: id.to_string(),
        is_active: active,
        customer_id: customer_id.to_string(),
        scheme: "visa".to_string(),
        masked_number: "XXXX XXXX XXXX 4242".to_string(),
        expiry_month: "3".to_string(),
        expiry_year: "27".to_string(),
    }
}

pub fn order_event(order: &Order, transaction_id: &str) -> IncomingEvent {
    IncomingEvent::new(IncomingEventParams {
        channel: EventChannel::Webhook,
        kind: WebhookKind::StatusUpdate,
        reference: Some(EventRef::Order {
            id: order.id,
            key: order.order_key.clone(),
        }),
        transaction_id: transaction_id.to_string(),
        card_id: None,
        status: "success".to_string(),
        timestamp_raw: String::new(),
        card_update: None,
    })
}

pub fn card_new_event(user_id: u64, card_id: &str, transaction_id: &str) -> IncomingEvent {
    IncomingEvent::new(IncomingEventParams {
        channel: EventChannel::Webhook,
        kind: WebhookKind::CardNew,
        reference: Some(EventRef::PaymentMethodFlow {
            user_id,
            nonce: "n0nce".to_string(),
        }),
        transaction_id: transaction_id.to_string(),
        card_id: Some(card_id.to_string()),
        status: "success".to_string(),
        timestamp_raw: String::new(),
        card_update: None,
    })
}

pub fn saved_token(user_id: u64, card_id: &str) -> PaymentToken {
    use pay_recon::domain::card::CardDisplay;
    PaymentToken::new(
        card_id,
        user_id,
        "pay_recon",
        CardDisplay::from_wire("visa", "XXXX XXXX XXXX 4242", "3", "27").unwrap(),
    )
}

// ── Signing helpers (hand-rolled, independent of the crate's own code) ─────

type HmacSha256 = Hmac<Sha256>;

fn hmac_hex(secret: &str, data: &[u8]) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(data);
    hex::encode(mac.finalize().into_bytes())
}

/// Sign a redirect field set the way the payment page does: sorted
/// `key=value` pairs (hash excluded) joined with `&`.
pub fn sign_redirect(secret: &str, fields: &serde_json::Map<String, serde_json::Value>) -> String {
    let mut pairs: Vec<String> = fields
        .iter()
        .filter(|(k, _)| k.as_str() != "hash")
        .map(|(k, v)| match v {
            serde_json::Value::String(s) => format!("{k}={s}"),
            other => format!("{k}={other}"),
        })
        .collect();
    pairs.sort();
    hmac_hex(secret, pairs.join("&").as_bytes())
}

/// Sign a webhook body over its trimmed bytes.
pub fn sign_webhook(secret: &str, body: &str) -> String {
    hmac_hex(secret, body.trim().as_bytes())
}

/// A complete, valid redirect field set for the given composite ref.
pub fn redirect_fields(
    secret: &str,
    order_ref: &str,
    transaction_id: &str,
) -> serde_json::Map<String, serde_json::Value> {
    let mut fields = serde_json::Map::new();
    fields.insert("status".into(), "success".into());
    fields.insert("transaction_id".into(), transaction_id.into());
    fields.insert("order_id".into(), order_ref.into());
    fields.insert("timestamp".into(), "1710158400".into());
    let hash = sign_redirect(secret, &fields);
    fields.insert("hash".into(), hash.into());
    fields
}

/// A complete, valid webhook envelope; returns `(raw_body, hash)`.
pub fn webhook_envelope(
    secret: &str,
    webhook_type: &str,
    body: serde_json::Value,
) -> (String, String) {
    let envelope = serde_json::json!({
        "webhook_id": "wh_1",
        "webhook_type": webhook_type,
        "webhook_body": body,
    });
    let raw = envelope.to_string();
    let hash = sign_webhook(secret, &raw);
    (raw, hash)
}
