use {
    crate::domain::{
        card::{CardDisplay, PaymentToken},
        dispatch::{DeferredDispatch, HookName},
        error::ReconError,
        event::{EventRef, IncomingEvent},
        gateway::{RemoteCard, RemoteProcessorGateway},
        store::{CustomerStore, TokenStore},
    },
    std::sync::Arc,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SaveOutcome {
    Saved,
    /// A token for `(user, card)` already exists; saving again is a no-op.
    AlreadyExists,
}

/// Mirrors the transaction pipeline's idempotency pattern for stored cards:
/// the same two delivery channels, the same run-twice-safely guarantees,
/// against the token store instead of the order store.
pub struct PaymentMethodService {
    gateway: Arc<dyn RemoteProcessorGateway>,
    customers: Arc<dyn CustomerStore>,
    tokens: Arc<dyn TokenStore>,
    dispatch: Arc<dyn DeferredDispatch>,
    tokenization_enabled: bool,
    gateway_id: String,
}

impl PaymentMethodService {
    pub fn new(
        gateway: Arc<dyn RemoteProcessorGateway>,
        customers: Arc<dyn CustomerStore>,
        tokens: Arc<dyn TokenStore>,
        dispatch: Arc<dyn DeferredDispatch>,
        tokenization_enabled: bool,
        gateway_id: impl Into<String>,
    ) -> Self {
        Self {
            gateway,
            customers,
            tokens,
            dispatch,
            tokenization_enabled,
            gateway_id: gateway_id.into(),
        }
    }

    /// Defer a card save from a webhook. The delay lets a concurrent redirect
    /// usually win the race and finish first.
    pub fn schedule_save(&self, event: &IncomingEvent) -> Result<(), ReconError> {
        let user_id = self.flow_user(event)?;
        if !self.customers.exists(user_id)? {
            return Err(ReconError::NotFound(format!("Customer {user_id} not found.")));
        }
        self.dispatch
            .schedule(HookName::SaveCard, event.clone())
            .map_err(|e| {
                tracing::error!(user_id, error = %e, "card save enqueue failed");
                ReconError::Dispatch("Failed to schedule action.".to_string())
            })
    }

    /// Save the card referenced by a trusted event, unless it already exists.
    pub async fn save_from_event(&self, event: &IncomingEvent) -> Result<SaveOutcome, ReconError> {
        if !self.tokenization_enabled {
            return Err(ReconError::StateGuard(
                "Saving payment methods is disabled.".to_string(),
            ));
        }

        let user_id = self.flow_user(event)?;
        let card_id = event.card_id().ok_or_else(|| {
            ReconError::Validation("Event carries no card id.".to_string())
        })?;

        let card = self.fetch_active_card(card_id).await?;

        // Re-read before creating; the other channel may have saved it first.
        if self.tokens.find(user_id, card_id)?.is_some() {
            tracing::debug!(user_id, card_id, "token already saved, skipping");
            return Ok(SaveOutcome::AlreadyExists);
        }

        let display = CardDisplay::from_wire(
            &card.scheme,
            &card.masked_number,
            &card.expiry_month,
            &card.expiry_year,
        )?;
        let token = PaymentToken::new(card.id.clone(), user_id, self.gateway_id.clone(), display);
        self.tokens.save(&token)?;

        tracing::info!(user_id, card_id, token_id = %token.id, "payment token saved");
        Ok(SaveOutcome::Saved)
    }

    /// Deferred-task entry point. Re-checks token existence up front because
    /// the synchronous redirect path may have raced this job and won.
    pub async fn process_scheduled(&self, event: &IncomingEvent) -> Result<SaveOutcome, ReconError> {
        let user_id = self.flow_user(event)?;
        if let Some(card_id) = event.card_id()
            && self.tokens.find(user_id, card_id)?.is_some()
        {
            tracing::debug!(user_id, card_id, "token saved by the other channel, skipping");
            return Ok(SaveOutcome::AlreadyExists);
        }
        self.save_from_event(event).await
    }

    /// Apply a `card_update` webhook to an existing token. The owner comes
    /// from the card's remote customer id, not from the event ref; a missing
    /// token is a hard error (no create-on-update).
    pub async fn update_from_event(&self, event: &IncomingEvent) -> Result<(), ReconError> {
        let card_id = event.card_id().ok_or_else(|| {
            ReconError::Validation("Event carries no card id.".to_string())
        })?;
        let update = event.card_update().ok_or_else(|| {
            ReconError::Validation("Event carries no card payload.".to_string())
        })?;

        let card = self
            .gateway
            .get_card(card_id)
            .await
            .map_err(|_| ReconError::Gateway("Card retrieval failed.".to_string()))?;

        let user_id = self
            .customers
            .find_by_remote_id(&card.customer_id)?
            .ok_or_else(|| {
                ReconError::NotFound(format!(
                    "No customer for remote id \"{}\".",
                    card.customer_id
                ))
            })?;

        let mut token = self.tokens.find(user_id, card_id)?.ok_or_else(|| {
            ReconError::NotFound(format!(
                "No stored payment token for customer {user_id} and card {card_id}."
            ))
        })?;

        token.display = CardDisplay::from_wire(
            &update.scheme,
            &update.number,
            &update.expiry_month,
            &update.expiry_year,
        )?;
        self.tokens.save(&token)?;

        tracing::info!(user_id, card_id, update_type = %update.update_type, "payment token updated");
        Ok(())
    }

    /// Redirect-side confirmation of a card save. The redirect carries no
    /// card id; derive it from the transaction, then the usual
    /// existing-token idempotency applies.
    pub async fn confirm_from_redirect(
        &self,
        event: &IncomingEvent,
    ) -> Result<SaveOutcome, ReconError> {
        let remote = self
            .gateway
            .get_transaction(event.transaction_id())
            .await
            .map_err(|_| ReconError::Gateway("Failed to get transaction.".to_string()))?;

        let card_id = remote.card_id.ok_or_else(|| {
            ReconError::NotFound(format!(
                "Transaction {} carries no card id.",
                event.transaction_id()
            ))
        })?;

        let mut event = event.clone();
        event.set_card_id(card_id);
        self.save_from_event(&event).await
    }

    /// Deactivate the remote card behind a stored token, called when the
    /// platform deletes the token. The local delete is the store's job; this
    /// only keeps the processor side in sync.
    pub async fn deactivate_card(&self, user_id: u64, card_id: &str) -> Result<(), ReconError> {
        if self.tokens.find(user_id, card_id)?.is_none() {
            return Err(ReconError::NotFound(format!(
                "No stored payment token for customer {user_id} and card {card_id}."
            )));
        }

        self.gateway
            .update_card(card_id, false)
            .await
            .map_err(|e| {
                tracing::warn!(user_id, card_id, error = %e, "card deactivation failed");
                ReconError::Gateway("Card update failed.".to_string())
            })?;

        tracing::info!(user_id, card_id, "remote card deactivated");
        Ok(())
    }

    async fn fetch_active_card(&self, card_id: &str) -> Result<RemoteCard, ReconError> {
        let card = self
            .gateway
            .get_card(card_id)
            .await
            .map_err(|e| {
                tracing::warn!(card_id, error = %e, "card fetch failed");
                ReconError::Gateway("Card retrieval failed.".to_string())
            })?;
        if !card.is_active {
            return Err(ReconError::StateGuard("Card is not active.".to_string()));
        }
        Ok(card)
    }

    fn flow_user(&self, event: &IncomingEvent) -> Result<u64, ReconError> {
        match event.reference() {
            Some(EventRef::PaymentMethodFlow { user_id, .. }) => Ok(*user_id),
            _ => Err(ReconError::NotFound(
                "Event does not belong to the payment-method flow.".to_string(),
            )),
        }
    }
}
