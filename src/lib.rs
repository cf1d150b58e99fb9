pub mod adapters;
pub mod domain;
pub mod infra;
pub mod services;

use std::sync::Arc;

use {
    domain::dispatch::DeferredDispatch,
    services::{
        authenticator::IncomingEventAuthenticator, payment_methods::PaymentMethodService,
        transactions::TransactionService,
    },
};

#[derive(Clone)]
pub struct AppState {
    pub authenticator: Arc<IncomingEventAuthenticator>,
    pub transactions: Arc<TransactionService>,
    pub payment_methods: Arc<PaymentMethodService>,
    pub dispatch: Arc<dyn DeferredDispatch>,
}
