use {
    crate::domain::{
        card::PaymentToken,
        dispatch::{DeferredDispatch, DeferredJob, HookName},
        error::ReconError,
        event::IncomingEvent,
        order::Order,
        store::{Clock, CustomerStore, OrderStore, TokenStore},
    },
    std::collections::HashMap,
    std::sync::{
        Mutex,
        atomic::{AtomicBool, Ordering},
    },
    std::sync::Arc,
    uuid::Uuid,
};

/// In-memory order aggregate store. Doubles as the test fixture; completion
/// hook firings are recorded so tests can count them.
#[derive(Default)]
pub struct MemoryOrders {
    orders: Mutex<HashMap<u64, Order>>,
    completions: Mutex<Vec<u64>>,
}

impl MemoryOrders {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, order: Order) {
        self.orders
            .lock()
            .expect("orders lock poisoned")
            .insert(order.id, order);
    }

    pub fn completion_count(&self, order_id: u64) -> usize {
        self.completions
            .lock()
            .expect("completions lock poisoned")
            .iter()
            .filter(|id| **id == order_id)
            .count()
    }
}

impl OrderStore for MemoryOrders {
    fn get(&self, id: u64) -> Result<Option<Order>, ReconError> {
        Ok(self
            .orders
            .lock()
            .expect("orders lock poisoned")
            .get(&id)
            .cloned())
    }

    fn save(&self, order: &Order) -> Result<(), ReconError> {
        self.orders
            .lock()
            .expect("orders lock poisoned")
            .insert(order.id, order.clone());
        Ok(())
    }

    fn payment_complete(&self, order: &Order) -> Result<(), ReconError> {
        self.completions
            .lock()
            .expect("completions lock poisoned")
            .push(order.id);
        Ok(())
    }
}

/// In-memory customer lookup: local user id ↔ remote processor customer id.
#[derive(Default)]
pub struct MemoryCustomers {
    remote_ids: Mutex<HashMap<u64, String>>,
}

impl MemoryCustomers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, user_id: u64, remote_id: impl Into<String>) {
        self.remote_ids
            .lock()
            .expect("customers lock poisoned")
            .insert(user_id, remote_id.into());
    }
}

impl CustomerStore for MemoryCustomers {
    fn exists(&self, user_id: u64) -> Result<bool, ReconError> {
        Ok(self
            .remote_ids
            .lock()
            .expect("customers lock poisoned")
            .contains_key(&user_id))
    }

    fn find_by_remote_id(&self, remote_customer_id: &str) -> Result<Option<u64>, ReconError> {
        Ok(self
            .remote_ids
            .lock()
            .expect("customers lock poisoned")
            .iter()
            .find(|(_, remote)| remote.as_str() == remote_customer_id)
            .map(|(id, _)| *id))
    }
}

#[derive(Default)]
pub struct MemoryTokens {
    tokens: Mutex<Vec<PaymentToken>>,
}

impl MemoryTokens {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self) -> usize {
        self.tokens.lock().expect("tokens lock poisoned").len()
    }
}

impl TokenStore for MemoryTokens {
    fn find(&self, user_id: u64, card_id: &str) -> Result<Option<PaymentToken>, ReconError> {
        Ok(self
            .tokens
            .lock()
            .expect("tokens lock poisoned")
            .iter()
            .find(|t| t.user_id == user_id && t.token == card_id)
            .cloned())
    }

    fn save(&self, token: &PaymentToken) -> Result<(), ReconError> {
        let mut tokens = self.tokens.lock().expect("tokens lock poisoned");
        match tokens.iter_mut().find(|t| t.id == token.id) {
            Some(existing) => *existing = token.clone(),
            None => tokens.push(token.clone()),
        }
        Ok(())
    }
}

/// Delay-queue deferred dispatch. Jobs become claimable once their delay has
/// elapsed on the injected clock.
pub struct MemoryDispatch {
    delay_secs: i64,
    clock: Arc<dyn Clock>,
    queue: Mutex<Vec<(i64, DeferredJob)>>,
    reject: AtomicBool,
}

impl MemoryDispatch {
    pub fn new(delay_secs: i64, clock: Arc<dyn Clock>) -> Self {
        Self {
            delay_secs,
            clock,
            queue: Mutex::new(Vec::new()),
            reject: AtomicBool::new(false),
        }
    }

    /// Make the next `schedule` call fail, simulating scheduler rejection.
    pub fn reject_next(&self) {
        self.reject.store(true, Ordering::SeqCst);
    }

    pub fn pending(&self) -> usize {
        self.queue.lock().expect("queue lock poisoned").len()
    }
}

impl DeferredDispatch for MemoryDispatch {
    fn schedule(&self, hook: HookName, event: IncomingEvent) -> Result<(), ReconError> {
        if self.reject.swap(false, Ordering::SeqCst) {
            return Err(ReconError::Dispatch("enqueue rejected".to_string()));
        }
        let run_at = self.clock.now_epoch() + self.delay_secs;
        self.queue.lock().expect("queue lock poisoned").push((
            run_at,
            DeferredJob {
                id: Uuid::now_v7(),
                hook,
                event,
            },
        ));
        Ok(())
    }

    fn claim_due(&self, limit: usize) -> Result<Vec<DeferredJob>, ReconError> {
        let now = self.clock.now_epoch();
        let mut queue = self.queue.lock().expect("queue lock poisoned");
        let mut due = Vec::new();
        let mut i = 0;
        while i < queue.len() && due.len() < limit {
            if queue[i].0 <= now {
                due.push(queue.remove(i).1);
            } else {
                i += 1;
            }
        }
        Ok(due)
    }
}
