//! Simulated payment providers.
//!
//! Each provider validates its method-specific details, waits out a
//! configured latency and rolls a [`RandomSource`] against its decline rate.
//! A real integration swaps the roll for a network call and keeps the
//! response shapes.

use crate::application::registry::{Availability, GatewayRegistry};
use crate::config::PaymentConfig;
use crate::domain::gateway::GatewayHandle;
use crate::domain::payment::PaymentMethod;
use crate::domain::ports::{ClockHandle, RandomHandle};
use crate::error::Result;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

pub mod bank_transfer;
pub mod cash_on_delivery;
pub mod credit_card;
pub mod paypal;

pub use bank_transfer::BankTransferGateway;
pub use cash_on_delivery::CashOnDeliveryGateway;
pub use credit_card::CreditCardGateway;
pub use paypal::PaypalGateway;

/// Latency and outcome strategy shared by the simulators.
#[derive(Clone)]
pub struct Simulation {
    latency: Duration,
    decline_rate: u8,
    clock: ClockHandle,
    random: RandomHandle,
}

impl Simulation {
    /// No latency, never declines.
    pub fn new(clock: ClockHandle, random: RandomHandle) -> Self {
        Self {
            latency: Duration::ZERO,
            decline_rate: 0,
            clock,
            random,
        }
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn with_decline_rate(mut self, percent: u8) -> Self {
        self.decline_rate = percent.min(100);
        self
    }

    /// Waits out the latency, then decides whether the provider approves.
    pub async fn settle(&self) -> bool {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.random.roll_percent() <= 100 - self.decline_rate
    }

    pub fn token(&self) -> String {
        self.random.token()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }
}

/// Binds every configured gateway. Gateways whose credentials are missing
/// stay unbound, so lookups for them fail with `NotConfigured`.
pub fn build_registry(
    config: &PaymentConfig,
    clock: ClockHandle,
    random: RandomHandle,
) -> GatewayRegistry {
    let mut registry = GatewayRegistry::new();
    for method in PaymentMethod::ALL {
        let settings = config.gateways.get(method);
        let simulation = Simulation::new(clock.clone(), random.clone())
            .with_latency(settings.latency())
            .with_decline_rate(settings.decline_rate);

        let gateway: Result<GatewayHandle> = match method {
            PaymentMethod::CreditCard => {
                CreditCardGateway::new(settings, simulation).map(|g| Arc::new(g) as GatewayHandle)
            }
            PaymentMethod::Paypal => {
                PaypalGateway::new(settings, simulation).map(|g| Arc::new(g) as GatewayHandle)
            }
            PaymentMethod::BankTransfer => {
                Ok(Arc::new(BankTransferGateway::new(settings, simulation)) as GatewayHandle)
            }
            PaymentMethod::CashOnDelivery => {
                Ok(Arc::new(CashOnDeliveryGateway::new(settings, simulation)) as GatewayHandle)
            }
        };

        match gateway {
            Ok(gateway) => registry.register(
                gateway,
                Availability {
                    enabled: settings.enabled,
                    max_amount: settings.max_amount,
                },
            ),
            Err(e) => warn!(method = %method, error = %e, "gateway left unbound"),
        }
    }
    registry
}

/// Last four characters of a card number.
pub(crate) fn last4(card_number: &str) -> String {
    let digits: Vec<char> = card_number.chars().collect();
    digits[digits.len().saturating_sub(4)..].iter().collect()
}
