use {
    super::error::ReconError,
    serde::{Deserialize, Serialize},
    std::{future::Future, pin::Pin},
};

/// Read-only transaction snapshot fetched from the processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteTransaction {
    pub id: String,
    pub status: String,
    pub created_timestamp: i64,
    pub payment_method: String,
    pub card_id: Option<String>,
    pub decline_reason: Option<String>,
}

/// Stored-card snapshot from the processor. `customer_id` is the processor's
/// own customer reference, used to resolve token ownership on card updates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteCard {
    pub id: String,
    pub is_active: bool,
    pub customer_id: String,
    pub scheme: String,
    pub masked_number: String,
    pub expiry_month: String,
    pub expiry_year: String,
}

/// Shared contract across remote-call outcome shapes. One variant per
/// endpoint, each with its own typed accessors on top of this base.
pub trait RemoteOutcome {
    fn request_succeeded(&self) -> bool;
    fn status(&self) -> &str;
    fn log_payload(&self) -> serde_json::Value;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaptureOutcome {
    pub captured: bool,
    pub transaction_id: String,
    pub status: String,
    pub decline_reason: Option<String>,
    pub error_message: Option<String>,
}

impl RemoteOutcome for CaptureOutcome {
    fn request_succeeded(&self) -> bool {
        self.captured
    }

    fn status(&self) -> &str {
        &self.status
    }

    fn log_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "endpoint": "capture",
            "captured": self.captured,
            "transaction_id": self.transaction_id,
            "status": self.status,
            "decline_reason": self.decline_reason,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelOutcome {
    pub cancelled: bool,
    pub transaction_id: String,
    pub status: String,
    pub error_message: Option<String>,
}

impl RemoteOutcome for CancelOutcome {
    fn request_succeeded(&self) -> bool {
        self.cancelled
    }

    fn status(&self) -> &str {
        &self.status
    }

    fn log_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "endpoint": "cancel",
            "cancelled": self.cancelled,
            "transaction_id": self.transaction_id,
            "status": self.status,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundOutcome {
    pub refunded: bool,
    pub transaction_id: String,
    pub status: String,
    pub decline_reason: Option<String>,
    pub error_message: Option<String>,
}

impl RemoteOutcome for RefundOutcome {
    fn request_succeeded(&self) -> bool {
        self.refunded
    }

    fn status(&self) -> &str {
        &self.status
    }

    fn log_payload(&self) -> serde_json::Value {
        serde_json::json!({
            "endpoint": "refund",
            "refunded": self.refunded,
            "transaction_id": self.transaction_id,
            "status": self.status,
            "decline_reason": self.decline_reason,
        })
    }
}

type GatewayFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ReconError>> + Send + 'a>>;

/// Authenticated HTTP client for the remote processor. Implementations own
/// bearer-token acquisition; this core only sees normalized outcomes.
pub trait RemoteProcessorGateway: Send + Sync {
    fn get_transaction(&self, id: &str) -> GatewayFuture<'_, RemoteTransaction>;

    fn capture_transaction(&self, id: &str, amount_minor: i64) -> GatewayFuture<'_, CaptureOutcome>;

    fn cancel_transaction(&self, id: &str, reference: &str) -> GatewayFuture<'_, CancelOutcome>;

    fn refund_transaction(
        &self,
        id: &str,
        amount_minor: i64,
        reference: &str,
    ) -> GatewayFuture<'_, RefundOutcome>;

    fn get_card(&self, card_id: &str) -> GatewayFuture<'_, RemoteCard>;

    fn update_card(&self, card_id: &str, is_active: bool) -> GatewayFuture<'_, ()>;
}
