pub mod calendar;
pub mod card;
pub mod dispatch;
pub mod error;
pub mod event;
pub mod gateway;
pub mod order;
pub mod store;
