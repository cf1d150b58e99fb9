pub mod authenticator;
pub mod payment_methods;
pub mod transactions;
pub mod worker;
