#![allow(dead_code)]

use orderpay::application::engine::TransactionEngine;
use orderpay::config::PaymentConfig;
use orderpay::domain::context::RequestContext;
use orderpay::domain::order::{Customer, NewOrder, NewOrderItem, Order, OrderId};
use orderpay::domain::payment::{PaymentDetails, PaymentMethod, PaymentRequest};
use orderpay::infrastructure::clock::SystemClock;
use orderpay::infrastructure::gateways::build_registry;
use orderpay::infrastructure::in_memory::InMemoryOrderStore;
use orderpay::infrastructure::random::FixedRandom;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

/// Default gateway settings without simulated latency.
pub fn fast_config() -> PaymentConfig {
    let mut config = PaymentConfig::default();
    for method in PaymentMethod::ALL {
        config.gateways.get_mut(method).latency_ms = 0;
    }
    config
}

/// Engine over an in-memory store and the simulated gateways.
pub fn engine_with(config: &PaymentConfig, random: FixedRandom) -> TransactionEngine {
    let clock = Arc::new(SystemClock);
    let registry = build_registry(config, clock.clone(), Arc::new(random));
    TransactionEngine::from_config(
        Box::new(InMemoryOrderStore::new()),
        registry,
        config,
        clock,
    )
}

/// Every simulated charge approved.
pub fn engine() -> TransactionEngine {
    engine_with(&fast_config(), FixedRandom::approving())
}

pub fn ctx() -> RequestContext {
    RequestContext::for_user(1)
}

pub fn customer() -> Customer {
    Customer {
        name: "Ada Lovelace".to_string(),
        email: "ada@example.com".to_string(),
        phone: None,
    }
}

/// Two A at 50.00 and one B at 25.00: 125.000 in total.
pub fn new_order() -> NewOrder {
    NewOrder {
        customer: customer(),
        items: vec![
            NewOrderItem::new("A", 2, dec!(50.00)),
            NewOrderItem::new("B", 1, dec!(25.00)),
        ],
        notes: None,
    }
}

pub async fn confirmed_order(engine: &TransactionEngine, ctx: &RequestContext) -> Order {
    let order = engine.create_order(ctx, new_order()).await.unwrap();
    engine.confirm_order(ctx, order.id()).await.unwrap()
}

pub fn card_details() -> PaymentDetails {
    PaymentDetails::new()
        .with("card_number", "4242424242424242")
        .with("expiry_month", "12")
        .with("expiry_year", "2030")
        .with("cvv", "123")
}

pub fn details_for(method: PaymentMethod) -> PaymentDetails {
    match method {
        PaymentMethod::CreditCard => card_details(),
        PaymentMethod::Paypal => PaymentDetails::new().with("email", "ada@example.com"),
        PaymentMethod::BankTransfer => PaymentDetails::new()
            .with("account_number", "DE89370400440532013000")
            .with("bank_name", "Example Bank"),
        PaymentMethod::CashOnDelivery => PaymentDetails::new(),
    }
}

pub fn payment(order_id: OrderId, method: PaymentMethod, amount: Decimal) -> PaymentRequest {
    PaymentRequest {
        order_id,
        method,
        amount,
        details: details_for(method),
    }
}
