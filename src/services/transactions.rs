use {
    crate::domain::{
        calendar::same_utc_day,
        error::ReconError,
        event::{EventRef, IncomingEvent},
        gateway::{RemoteOutcome, RemoteProcessorGateway, RemoteTransaction},
        order::{
            META_DECLINE_REASON, META_PAYMENT_METHOD, Order, OrderStatus, PaymentState,
            TransactionType,
        },
        store::{Clock, OrderStore},
    },
    std::sync::Arc,
};

/// Why `process` stopped without touching the order. None of these are
/// errors; duplicate and out-of-order delivery are expected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The composite ref encodes the standalone payment-method flow.
    NotAnOrder,
    /// The order already carries this transaction id.
    DuplicateTransaction,
    /// A newer or equal update already landed.
    StaleTimestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Skipped(SkipReason),
    Applied(PaymentState),
}

/// Cancellation is a three-way decision: refused-by-rule is not an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelDecision {
    Done,
    /// Same-day captured authorisations must wait until the next UTC day.
    Invalid,
}

/// Consumes trusted events and applies the idempotent, monotonic order state
/// machine. Capture/cancel/refund are separate guarded operations on the
/// same model; each re-reads the order before deciding anything.
pub struct TransactionService {
    gateway: Arc<dyn RemoteProcessorGateway>,
    orders: Arc<dyn OrderStore>,
    clock: Arc<dyn Clock>,
}

impl TransactionService {
    pub fn new(
        gateway: Arc<dyn RemoteProcessorGateway>,
        orders: Arc<dyn OrderStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            gateway,
            orders,
            clock,
        }
    }

    /// Apply a status-update event to its order. Safe to call any number of
    /// times with duplicated or reordered deliveries.
    pub async fn process(&self, event: &IncomingEvent) -> Result<ProcessOutcome, ReconError> {
        match self.process_inner(event).await {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                tracing::error!(
                    transaction_id = %event.transaction_id(),
                    error = %e,
                    "transaction status update failed"
                );
                Err(e)
            }
        }
    }

    async fn process_inner(&self, event: &IncomingEvent) -> Result<ProcessOutcome, ReconError> {
        // This channel multiplexes two unrelated flows; only order refs
        // belong here.
        let Some(EventRef::Order { id, key }) = event.reference() else {
            tracing::debug!(transaction_id = %event.transaction_id(), "not an order event, skipping");
            return Ok(ProcessOutcome::Skipped(SkipReason::NotAnOrder));
        };

        let mut order = self.resolve_order(*id, key)?;

        if order.has_transaction(event.transaction_id()) {
            tracing::debug!(order_id = order.id, transaction_id = %event.transaction_id(),
                "transaction already processed, skipping");
            return Ok(ProcessOutcome::Skipped(SkipReason::DuplicateTransaction));
        }

        let remote = self
            .gateway
            .get_transaction(event.transaction_id())
            .await
            .map_err(|e| {
                tracing::warn!(transaction_id = %event.transaction_id(), error = %e, "transaction fetch failed");
                ReconError::Gateway("Failed to get transaction.".to_string())
            })?;

        // Anti-regression guard: a newer or equal update already landed.
        if order.time_updated >= remote.created_timestamp {
            tracing::debug!(order_id = order.id, order_ts = order.time_updated,
                remote_ts = remote.created_timestamp, "stale transaction snapshot, skipping");
            return Ok(ProcessOutcome::Skipped(SkipReason::StaleTimestamp));
        }

        if !order.status.awaits_payment() {
            return Err(ReconError::StateGuard(format!(
                "Order status \"{}\" is not valid for a transaction status update.",
                order.status
            )));
        }

        let state = self.apply_update(&mut order, event.transaction_id(), &remote)?;
        Ok(ProcessOutcome::Applied(state))
    }

    fn resolve_order(&self, id: u64, key: &str) -> Result<Order, ReconError> {
        let order = self
            .orders
            .get(id)?
            .filter(|o| o.order_key == key)
            .ok_or_else(|| {
                ReconError::NotFound("No valid order ID in incoming data.".to_string())
            })?;
        Ok(order)
    }

    fn apply_update(
        &self,
        order: &mut Order,
        transaction_id: &str,
        remote: &RemoteTransaction,
    ) -> Result<PaymentState, ReconError> {
        order.transaction_id = Some(transaction_id.to_string());
        order.transaction_status = Some(remote.status.clone());
        order.time_updated = remote.created_timestamp;

        let settled = matches!(remote.status.as_str(), "success" | "settled");
        let completed = match (settled, remote.status.as_str(), order.transaction_type) {
            (true, _, TransactionType::Authorisation) => {
                order.payment_state = PaymentState::Authorised;
                order.status = OrderStatus::OnHold;
                false
            }
            (true, _, TransactionType::Capture) => {
                order.payment_state = PaymentState::Completed;
                order.status = OrderStatus::Completed;
                order.time_completed = order.time_updated;
                true
            }
            (false, "executed", _) => {
                order.payment_state = PaymentState::Executed;
                order.status = OrderStatus::OnHold;
                false
            }
            _ => {
                order.payment_state = PaymentState::Failed;
                order.status = OrderStatus::Failed;
                false
            }
        };

        // Auxiliary annotations, independent of the main transition.
        order.set_meta(META_PAYMENT_METHOD, remote.payment_method.clone());
        if let Some(reason) = &remote.decline_reason {
            order.set_meta(META_DECLINE_REASON, reason.clone());
        }

        self.orders.save(order)?;
        if completed {
            self.orders.payment_complete(order)?;
        }

        tracing::info!(order_id = order.id, state = %order.payment_state,
            status = %remote.status, "order transaction state applied");
        Ok(order.payment_state)
    }

    /// Capture a previously authorised transaction for the full order total.
    pub async fn capture(&self, order_id: u64) -> Result<(), ReconError> {
        let mut order = self.fresh_order(order_id)?;

        if order.payment_state != PaymentState::Authorised {
            return Err(ReconError::StateGuard(format!(
                "Order is not awaiting capture (payment state \"{}\").",
                order.payment_state
            )));
        }
        if order.transaction_type != TransactionType::Authorisation {
            return Err(ReconError::StateGuard(
                "Order transaction is not an authorisation.".to_string(),
            ));
        }
        let Some(transaction_id) = order.transaction_id.clone() else {
            return Err(ReconError::StateGuard(
                "Order has no transaction to capture.".to_string(),
            ));
        };
        if order.total_minor <= 0 {
            return Err(ReconError::StateGuard(
                "Order total must be positive to capture.".to_string(),
            ));
        }

        let outcome = self
            .gateway
            .capture_transaction(&transaction_id, order.total_minor)
            .await?;

        if !outcome.request_succeeded() {
            tracing::warn!(order_id, payload = %outcome.log_payload(), "capture declined");
            return Err(ReconError::Gateway(format!(
                "Capture declined with status \"{}\".",
                outcome.status()
            )));
        }

        // The capture response carries no fresh timestamp of its own;
        // re-fetch the capture's transaction to get one.
        let remote = self
            .gateway
            .get_transaction(&outcome.transaction_id)
            .await
            .map_err(|_| ReconError::Gateway("Failed to get transaction.".to_string()))?;

        order.transaction_id = Some(outcome.transaction_id.clone());
        order.transaction_status = Some(remote.status.clone());
        order.payment_state = PaymentState::Completed;
        order.status = OrderStatus::Completed;
        order.time_updated = remote.created_timestamp;
        order.time_completed = remote.created_timestamp;
        self.orders.save(&order)?;
        self.orders.payment_complete(&order)?;

        tracing::info!(order_id, transaction_id = %outcome.transaction_id, "capture completed");
        Ok(())
    }

    /// Cancel (void) a settled transaction. Captured same-day authorisations
    /// are refused with [`CancelDecision::Invalid`] rather than an error.
    pub async fn cancel(&self, order_id: u64) -> Result<CancelDecision, ReconError> {
        let order = self.fresh_order(order_id)?;

        if !order.transaction_settled() {
            return Err(ReconError::StateGuard(format!(
                "Order transaction status \"{}\" cannot be cancelled.",
                order.transaction_status.as_deref().unwrap_or("none")
            )));
        }
        if !matches!(
            order.payment_state,
            PaymentState::Authorised | PaymentState::Executed | PaymentState::Completed
        ) {
            return Err(ReconError::StateGuard(format!(
                "Order payment state \"{}\" cannot be cancelled.",
                order.payment_state
            )));
        }
        if order.transaction_type == TransactionType::Authorisation
            && order.payment_state == PaymentState::Completed
            && same_utc_day(order.time_completed, self.clock.now_epoch())
        {
            tracing::debug!(order_id, "same-day captured order, cancel refused until next day");
            return Ok(CancelDecision::Invalid);
        }
        let Some(transaction_id) = order.transaction_id.clone() else {
            return Err(ReconError::StateGuard(
                "Order has no transaction to cancel.".to_string(),
            ));
        };

        let reference = order.id.to_string();
        let outcome = self
            .gateway
            .cancel_transaction(&transaction_id, &reference)
            .await?;

        if !outcome.request_succeeded() {
            tracing::warn!(order_id, payload = %outcome.log_payload(), "cancel rejected");
            return Err(ReconError::Gateway(format!(
                "Cancel rejected with status \"{}\".",
                outcome.status()
            )));
        }

        let mut order = order;
        order.payment_state = PaymentState::Cancelled;
        order.status = OrderStatus::Cancelled;
        self.orders.save(&order)?;

        tracing::info!(order_id, transaction_id = %transaction_id, "transaction cancelled");
        Ok(CancelDecision::Done)
    }

    /// Refund part or all of a settled transaction. Partial refunds require
    /// the last state change to be from a prior UTC calendar day.
    pub async fn refund(&self, order_id: u64, amount_minor: i64) -> Result<(), ReconError> {
        let order = self.fresh_order(order_id)?;

        if !order.transaction_settled() {
            return Err(ReconError::StateGuard(format!(
                "Order transaction status \"{}\" cannot be refunded.",
                order.transaction_status.as_deref().unwrap_or("none")
            )));
        }
        if matches!(
            order.payment_state,
            PaymentState::RefundedFull | PaymentState::Cancelled
        ) {
            return Err(ReconError::StateGuard(format!(
                "Order payment state \"{}\" cannot be refunded.",
                order.payment_state
            )));
        }
        let now = self.clock.now_epoch();
        if order.transaction_type == TransactionType::Authorisation
            && order.payment_state == PaymentState::Completed
            && same_utc_day(order.time_completed, now)
        {
            return Err(ReconError::StateGuard(
                "Captured orders cannot be refunded on the capture day.".to_string(),
            ));
        }
        if amount_minor <= 0 || amount_minor > order.total_minor {
            return Err(ReconError::StateGuard(format!(
                "Refund amount {amount_minor} is out of range for order total {}.",
                order.total_minor
            )));
        }

        let partial = amount_minor < order.total_minor;
        if partial {
            let last_change = match order.payment_state {
                PaymentState::Completed => order.time_completed,
                _ => order.time_updated,
            };
            if same_utc_day(last_change, now) {
                return Err(ReconError::StateGuard(
                    "Partial refunds are only allowed from the day after the last state change."
                        .to_string(),
                ));
            }
        }

        let Some(transaction_id) = order.transaction_id.clone() else {
            return Err(ReconError::StateGuard(
                "Order has no transaction to refund.".to_string(),
            ));
        };

        let reference = order.id.to_string();
        let outcome = self
            .gateway
            .refund_transaction(&transaction_id, amount_minor, &reference)
            .await?;

        if !outcome.request_succeeded() {
            tracing::warn!(order_id, payload = %outcome.log_payload(), "refund rejected");
            return Err(ReconError::Gateway(format!(
                "Refund rejected with status \"{}\".",
                outcome.status()
            )));
        }

        let mut order = order;
        if partial {
            order.payment_state = PaymentState::RefundedPartial;
        } else {
            order.payment_state = PaymentState::RefundedFull;
            order.status = OrderStatus::Refunded;
        }
        self.orders.save(&order)?;

        tracing::info!(order_id, amount_minor, partial, "refund applied");
        Ok(())
    }

    /// Guard decisions always start from a fresh read; an interleaved handler
    /// may have mutated the order since the caller last saw it.
    fn fresh_order(&self, order_id: u64) -> Result<Order, ReconError> {
        self.orders
            .get(order_id)?
            .ok_or_else(|| ReconError::NotFound(format!("Order {order_id} not found.")))
    }
}
