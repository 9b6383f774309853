//! Inbound and outbound adapters for driving the flow from a terminal.

pub mod console;
