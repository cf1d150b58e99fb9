use {
    super::card::PaymentToken,
    super::error::ReconError,
    super::order::Order,
};

/// Aggregate store for orders. Implementations own the full order record;
/// this core reads and writes the sub-schema in [`Order`].
pub trait OrderStore: Send + Sync {
    fn get(&self, id: u64) -> Result<Option<Order>, ReconError>;

    fn save(&self, order: &Order) -> Result<(), ReconError>;

    /// Payment-completion hook. Called exactly once per completed payment,
    /// after the completed snapshot has been saved.
    fn payment_complete(&self, order: &Order) -> Result<(), ReconError>;
}

pub trait CustomerStore: Send + Sync {
    fn exists(&self, user_id: u64) -> Result<bool, ReconError>;

    /// Resolve a local customer by the processor's customer reference.
    fn find_by_remote_id(&self, remote_customer_id: &str) -> Result<Option<u64>, ReconError>;
}

pub trait TokenStore: Send + Sync {
    fn find(&self, user_id: u64, card_id: &str) -> Result<Option<PaymentToken>, ReconError>;

    fn save(&self, token: &PaymentToken) -> Result<(), ReconError>;
}

/// Injected time source so calendar-day guards are testable.
pub trait Clock: Send + Sync {
    fn now_epoch(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch(&self) -> i64 {
        chrono::Utc::now().timestamp()
    }
}
