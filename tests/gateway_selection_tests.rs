mod common;

use common::{confirmed_order, ctx, engine, engine_with, fast_config, new_order, payment};
use orderpay::config::PaymentConfig;
use orderpay::domain::money::Money;
use orderpay::domain::order::{NewOrder, NewOrderItem};
use orderpay::domain::payment::PaymentMethod;
use orderpay::error::EngineError;
use orderpay::infrastructure::random::FixedRandom;
use rust_decimal_macros::dec;

fn money(value: rust_decimal::Decimal) -> Money {
    Money::new(value).unwrap()
}

fn large_order() -> NewOrder {
    NewOrder {
        items: vec![NewOrderItem::new("Piano", 1, dec!(6000))],
        ..new_order()
    }
}

#[tokio::test]
async fn test_available_gateways_respect_ceiling() {
    let engine = engine();

    let small: Vec<PaymentMethod> = engine
        .available_gateways(money(dec!(125)))
        .into_iter()
        .map(|option| option.method)
        .collect();
    assert_eq!(small, PaymentMethod::ALL.to_vec());

    let large = engine.available_gateways(money(dec!(6000)));
    assert_eq!(large.len(), 3);
    assert!(large.iter().all(|o| o.method != PaymentMethod::CashOnDelivery));
    assert_eq!(large[1].label, "PayPal");
}

#[tokio::test]
async fn test_select_for_large_order_goes_online() {
    let mut config = fast_config();
    config.default_method = PaymentMethod::CashOnDelivery;
    let engine = engine_with(&config, FixedRandom::approving());
    let ctx = ctx();
    let order = engine.create_order(&ctx, large_order()).await.unwrap();

    let selected = engine
        .select_gateway(&ctx, order.id(), Some(PaymentMethod::CashOnDelivery))
        .await
        .unwrap();
    assert_eq!(selected, PaymentMethod::CreditCard);

    let small = engine.create_order(&ctx, new_order()).await.unwrap();
    let selected = engine.select_gateway(&ctx, small.id(), None).await.unwrap();
    assert_eq!(selected, PaymentMethod::CashOnDelivery);
}

#[tokio::test]
async fn test_select_fails_without_online_gateway() {
    let mut config = fast_config();
    config.gateways.credit_card.enabled = false;
    config.gateways.paypal.enabled = false;
    let engine = engine_with(&config, FixedRandom::approving());
    let ctx = ctx();
    let order = engine.create_order(&ctx, large_order()).await.unwrap();

    assert!(matches!(
        engine.select_gateway(&ctx, order.id(), None).await,
        Err(EngineError::NoGatewayAvailable(_))
    ));
    // Bank transfer has no ceiling and is still offered directly.
    assert_eq!(
        engine
            .select_gateway(&ctx, order.id(), Some(PaymentMethod::BankTransfer))
            .await
            .unwrap(),
        PaymentMethod::BankTransfer
    );
}

#[tokio::test]
async fn test_env_overrides_ceiling() {
    let mut config =
        PaymentConfig::from_env(|key| (key == "COD_MAX_AMOUNT").then(|| "100".to_string()))
            .unwrap();
    for method in PaymentMethod::ALL {
        config.gateways.get_mut(method).latency_ms = 0;
    }
    assert_eq!(config.gateways.cash_on_delivery.max_amount, Some(money(dec!(100))));
    let engine = engine_with(&config, FixedRandom::approving());

    let methods: Vec<PaymentMethod> = engine
        .available_gateways(money(dec!(125)))
        .into_iter()
        .map(|option| option.method)
        .collect();
    assert!(!methods.contains(&PaymentMethod::CashOnDelivery));
}

#[tokio::test]
async fn test_recommendation_uses_successful_history() {
    let engine = engine();
    let ctx = ctx();
    assert_eq!(engine.recommend_gateway(&ctx).await.unwrap(), None);

    for method in [PaymentMethod::Paypal, PaymentMethod::Paypal, PaymentMethod::BankTransfer] {
        let order = confirmed_order(&engine, &ctx).await;
        engine
            .process_payment(&ctx, payment(order.id(), method, dec!(125)))
            .await
            .unwrap();
    }

    assert_eq!(
        engine.recommend_gateway(&ctx).await.unwrap(),
        Some(PaymentMethod::Paypal)
    );
}
