//! Domain layer: value types of a payment attempt and the ports the
//! orchestrator talks through.

pub mod attempt;
pub mod bank;
pub mod payment;
pub mod ports;
pub mod result;
pub mod session;
