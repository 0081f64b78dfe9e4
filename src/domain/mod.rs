//! Domain layer: wire types, the reconciliation state machine and the ports
//! the application layer depends on.

pub mod attempt;
pub mod payment;
pub mod ports;
pub mod reconciliation;
pub mod session;
pub mod storage;
