//! Application layer: the payment orchestrator and the provider registry it
//! resolves banks through.

pub mod factory;
pub mod orchestrator;
