use crate::domain::gateway::GatewayHandle;
use crate::domain::money::Money;
use crate::domain::payment::PaymentMethod;
use crate::error::{EngineError, Result};
use std::collections::HashMap;

/// Whether a bound gateway may currently take payments, and up to what amount.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Availability {
    pub enabled: bool,
    pub max_amount: Option<Money>,
}

impl Availability {
    pub fn enabled() -> Self {
        Self {
            enabled: true,
            max_amount: None,
        }
    }

    pub fn accepts(&self, amount: Option<Money>) -> bool {
        match (self.max_amount, amount) {
            _ if !self.enabled => false,
            (Some(max), Some(amount)) => amount <= max,
            _ => true,
        }
    }
}

struct Binding {
    gateway: GatewayHandle,
    availability: Availability,
}

/// Maps each payment method to its provider and availability.
#[derive(Default)]
pub struct GatewayRegistry {
    bindings: HashMap<PaymentMethod, Binding>,
}

impl GatewayRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Binds `gateway` under the method it reports, replacing any earlier binding.
    pub fn register(&mut self, gateway: GatewayHandle, availability: Availability) {
        self.bindings.insert(
            gateway.method(),
            Binding {
                gateway,
                availability,
            },
        );
    }

    pub fn with(mut self, gateway: GatewayHandle, availability: Availability) -> Self {
        self.register(gateway, availability);
        self
    }

    pub fn gateway(&self, method: PaymentMethod) -> Result<GatewayHandle> {
        self.bindings
            .get(&method)
            .map(|b| b.gateway.clone())
            .ok_or(EngineError::NotConfigured(method))
    }

    pub fn availability(&self, method: PaymentMethod) -> Option<Availability> {
        self.bindings.get(&method).map(|b| b.availability)
    }

    /// False for unbound or disabled methods and for amounts over the ceiling.
    pub fn is_available(&self, method: PaymentMethod, amount: Option<Money>) -> bool {
        self.availability(method)
            .is_some_and(|availability| availability.accepts(amount))
    }

    pub fn methods(&self) -> Vec<PaymentMethod> {
        PaymentMethod::ALL
            .into_iter()
            .filter(|m| self.bindings.contains_key(m))
            .collect()
    }
}
