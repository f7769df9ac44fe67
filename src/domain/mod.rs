//! Domain layer: the order and payment aggregates, their value objects, and
//! the ports the engine talks to (storage, gateways, clock, entropy).

pub mod context;
pub mod gateway;
pub mod money;
pub mod order;
pub mod payment;
pub mod ports;
