use super::registry::GatewayRegistry;
use crate::domain::money::Money;
use crate::domain::payment::PaymentMethod;
use crate::error::{EngineError, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// A method offered to the customer for a given amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GatewayOption {
    pub method: PaymentMethod,
    pub label: &'static str,
}

/// Picks a payment method for an order from what the registry can serve.
pub struct GatewaySelector {
    registry: Arc<GatewayRegistry>,
    default_method: PaymentMethod,
}

impl GatewaySelector {
    pub fn new(registry: Arc<GatewayRegistry>, default_method: PaymentMethod) -> Self {
        Self {
            registry,
            default_method,
        }
    }

    pub fn default_method(&self) -> PaymentMethod {
        self.default_method
    }

    pub fn is_available(&self, method: PaymentMethod, amount: Option<Money>) -> bool {
        self.registry.is_available(method, amount)
    }

    /// The preferred method when it can take `total`; an online method when
    /// the total is over the cash-on-delivery ceiling; otherwise the default.
    pub fn select(&self, total: Money, preferred: Option<PaymentMethod>) -> Result<PaymentMethod> {
        if let Some(preferred) = preferred
            && self.is_available(preferred, Some(total))
        {
            return Ok(preferred);
        }

        let cod_ceiling = self
            .registry
            .availability(PaymentMethod::CashOnDelivery)
            .and_then(|a| a.max_amount);
        if let Some(ceiling) = cod_ceiling
            && total > ceiling
        {
            return self.select_online();
        }

        Ok(self.default_method)
    }

    fn select_online(&self) -> Result<PaymentMethod> {
        [PaymentMethod::CreditCard, PaymentMethod::Paypal]
            .into_iter()
            .find(|m| self.is_available(*m, None))
            .ok_or_else(|| {
                EngineError::NoGatewayAvailable("No online payment gateway available".to_string())
            })
    }

    /// Every method able to take `amount`, default method first, the rest in
    /// declaration order. Callers retry down this list.
    pub fn fallback_order(&self, amount: Money) -> Vec<PaymentMethod> {
        let mut order = vec![self.default_method];
        order.extend(
            PaymentMethod::ALL
                .into_iter()
                .filter(|m| *m != self.default_method),
        );
        order.retain(|m| self.is_available(*m, Some(amount)));
        order
    }

    pub fn available_gateways(&self, amount: Money) -> Vec<GatewayOption> {
        PaymentMethod::ALL
            .into_iter()
            .filter(|m| self.is_available(*m, Some(amount)))
            .map(|method| GatewayOption {
                method,
                label: method.label(),
            })
            .collect()
    }

    /// The most used method among a user's successful payments, if it is
    /// still available. Ties go to the method declared first.
    pub fn recommend(&self, history: &[PaymentMethod]) -> Option<PaymentMethod> {
        let mut counts: HashMap<PaymentMethod, usize> = HashMap::new();
        for method in history {
            *counts.entry(*method).or_default() += 1;
        }
        let best = PaymentMethod::ALL
            .into_iter()
            .filter_map(|m| counts.get(&m).map(|count| (m, *count)))
            .fold(None::<(PaymentMethod, usize)>, |best, (m, count)| match best {
                Some((_, top)) if top >= count => best,
                _ => Some((m, count)),
            })
            .map(|(m, _)| m)?;
        self.is_available(best, None).then_some(best)
    }
}
