use {
    serde::{Deserialize, Serialize},
    std::collections::BTreeMap,
    std::fmt,
};

/// Remote transaction statuses that count as money actually moving.
pub const SETTLED_STATUSES: [&str; 2] = ["success", "settled"];

/// Meta keys for the auxiliary annotations recorded after a status update.
pub const META_PAYMENT_METHOD: &str = "payment_method";
pub const META_DECLINE_REASON: &str = "decline_reason";

/// Payment lifecycle state owned by this core, stored alongside the order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentState {
    None,
    Authorised,
    Executed,
    Completed,
    Failed,
    Cancelled,
    RefundedPartial,
    RefundedFull,
}

impl PaymentState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Authorised => "authorised",
            Self::Executed => "executed",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
            Self::RefundedPartial => "refunded_partial",
            Self::RefundedFull => "refunded_full",
        }
    }
}

impl fmt::Display for PaymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// External (storefront-visible) order status. Owned by the order store; this
/// core only moves it as a side effect of payment transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatus {
    Pending,
    OnHold,
    Failed,
    Completed,
    Cancelled,
    Refunded,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::OnHold => "on-hold",
            Self::Failed => "failed",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Refunded => "refunded",
        }
    }

    /// Statuses a transaction status update may still land on. Anything else
    /// is already finalized and an update against it is an error.
    pub fn awaits_payment(&self) -> bool {
        matches!(self, Self::Pending | Self::Failed | Self::OnHold)
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    Capture,
    Authorisation,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Capture => "capture",
            Self::Authorisation => "authorisation",
        }
    }
}

impl fmt::Display for TransactionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Order snapshot as read from / written back to the order store. The store
/// owns the full aggregate; this is the fixed sub-schema the core touches.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: u64,
    pub order_key: String,
    pub status: OrderStatus,
    /// Order total in minor units.
    pub total_minor: i64,
    pub transaction_id: Option<String>,
    pub transaction_type: TransactionType,
    pub payment_state: PaymentState,
    /// Raw remote status string from the last applied update.
    pub transaction_status: Option<String>,
    /// Epoch seconds of the newest remote transaction applied. The ordering
    /// guard compares against this.
    pub time_updated: i64,
    /// Epoch seconds when payment completed (capture settled), 0 if never.
    pub time_completed: i64,
    pub meta: BTreeMap<String, String>,
}

impl Order {
    pub fn new(id: u64, order_key: impl Into<String>, transaction_type: TransactionType) -> Self {
        Self {
            id,
            order_key: order_key.into(),
            status: OrderStatus::Pending,
            total_minor: 0,
            transaction_id: None,
            transaction_type,
            payment_state: PaymentState::None,
            transaction_status: None,
            time_updated: 0,
            time_completed: 0,
            meta: BTreeMap::new(),
        }
    }

    pub fn has_transaction(&self, transaction_id: &str) -> bool {
        !transaction_id.is_empty() && self.transaction_id.as_deref() == Some(transaction_id)
    }

    pub fn transaction_settled(&self) -> bool {
        self.transaction_status
            .as_deref()
            .is_some_and(|s| SETTLED_STATUSES.contains(&s))
    }

    pub fn set_meta(&mut self, key: &str, value: impl Into<String>) {
        self.meta.insert(key.to_string(), value.into());
    }

    pub fn meta(&self, key: &str) -> Option<&str> {
        self.meta.get(key).map(String::as_str)
    }
}
