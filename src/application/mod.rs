//! Application layer orchestrating the domain ports.
//!
//! `PaymentFlow` is the primary entry point for unlocking premium content: it
//! creates the payment intent, hands it to the provider, fires the sync
//! notification and waits for the backend to record the payment through the
//! `ReconciliationPoller`. `AuthService` and `QuizSession` cover the session and
//! quiz progress the flow depends on.

pub mod auth;
pub mod payment;
pub mod poller;
pub mod quiz;
pub mod sync;
