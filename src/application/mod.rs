//! Application layer containing the order/payment orchestration.
//!
//! [`engine::TransactionEngine`] is the only entry point that mutates orders
//! and payments. It resolves gateways through [`registry::GatewayRegistry`],
//! picks methods with [`selector::GatewaySelector`] and serializes work per
//! order with [`locks::OrderLocks`].

pub mod engine;
pub mod locks;
pub mod registry;
pub mod selector;
