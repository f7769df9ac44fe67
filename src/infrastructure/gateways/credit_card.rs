use super::{Simulation, last4};
use crate::config::{GatewayMode, GatewaySettings};
use crate::domain::gateway::{ChargeOutcome, PaymentGateway, RefundOutcome, VerifyOutcome};
use crate::domain::payment::{Payment, PaymentMethod};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use serde_json::json;
use tracing::info;

const REQUIRED_FIELDS: [&str; 4] = ["card_number", "expiry_month", "expiry_year", "cvv"];

/// Card processor simulator (about 5% of charges declined by default).
pub struct CreditCardGateway {
    mode: GatewayMode,
    simulation: Simulation,
}

impl CreditCardGateway {
    pub fn new(settings: &GatewaySettings, simulation: Simulation) -> Result<Self> {
        if settings.secret_key.as_deref().is_none_or(str::is_empty) {
            return Err(EngineError::NotConfigured(PaymentMethod::CreditCard));
        }
        Ok(Self {
            mode: settings.mode,
            simulation,
        })
    }
}

fn card_brand(card_number: &str) -> &'static str {
    match card_number.chars().next() {
        Some('4') => "Visa",
        Some('5') => "Mastercard",
        Some('3') => "American Express",
        _ => "Unknown",
    }
}

#[async_trait]
impl PaymentGateway for CreditCardGateway {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::CreditCard
    }

    async fn process(&self, payment: &Payment) -> ChargeOutcome {
        let details = payment.details();
        if !details.missing(&REQUIRED_FIELDS).is_empty() {
            return ChargeOutcome::declined("Invalid card details");
        }

        if !self.simulation.settle().await {
            return ChargeOutcome::declined("Card declined");
        }

        let transaction_id = format!(
            "ch_{}_{}",
            self.simulation.token(),
            self.simulation.now().timestamp()
        );
        let card_number = details.get("card_number").unwrap_or_default();
        info!(
            payment_id = %payment.id(),
            transaction_id = %transaction_id,
            mode = self.mode.as_str(),
            "card charge approved"
        );
        ChargeOutcome::approved(
            transaction_id,
            json!({
                "status": "succeeded",
                "mode": self.mode.as_str(),
                "card_brand": card_brand(card_number),
                "last4": last4(card_number),
            }),
        )
    }

    async fn refund(&self, payment: &Payment) -> Result<RefundOutcome> {
        if payment.transaction_id().is_none() {
            return Err(EngineError::PreconditionFailed(
                "No transaction ID for refund".to_string(),
            ));
        }
        let refund_id = format!(
            "re_{}_{}",
            self.simulation.token(),
            self.simulation.now().timestamp()
        );
        Ok(RefundOutcome::accepted(
            refund_id,
            json!({
                "status": "succeeded",
                "amount_refunded": payment.amount(),
            }),
        ))
    }

    async fn verify(&self, transaction_id: &str) -> VerifyOutcome {
        VerifyOutcome {
            success: true,
            status: "succeeded".to_string(),
            gateway_response: json!({
                "id": transaction_id,
                "verified_at": self.simulation.now().to_rfc3339(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::PaymentDetails;
    use crate::infrastructure::gateways::tests::{processing_payment, simulation};
    use crate::infrastructure::random::FixedRandom;

    fn card_details() -> PaymentDetails {
        PaymentDetails::new()
            .with("card_number", "4242424242424242")
            .with("expiry_month", "12")
            .with("expiry_year", "2030")
            .with("cvv", "123")
    }

    fn gateway(random: FixedRandom) -> CreditCardGateway {
        let settings = crate::config::PaymentConfig::default().gateways.credit_card;
        CreditCardGateway::new(&settings, simulation(random, settings.decline_rate)).unwrap()
    }

    #[tokio::test]
    async fn test_card_charge_approved() {
        let payment = processing_payment(PaymentMethod::CreditCard, card_details());
        let outcome = gateway(FixedRandom::approving()).process(&payment).await;

        assert!(outcome.success);
        assert!(outcome.transaction_id.unwrap().starts_with("ch_00000001_"));
        assert_eq!(outcome.gateway_response["card_brand"], "Visa");
        assert_eq!(outcome.gateway_response["last4"], "4242");
        assert_eq!(outcome.gateway_response["mode"], "test");
    }

    #[tokio::test]
    async fn test_card_charge_declined() {
        let payment = processing_payment(PaymentMethod::CreditCard, card_details());
        let outcome = gateway(FixedRandom::declining()).process(&payment).await;

        assert!(!outcome.success);
        assert_eq!(outcome.transaction_id, None);
        assert_eq!(outcome.error(), Some("Card declined"));
    }

    #[tokio::test]
    async fn test_card_requires_all_fields() {
        let details = PaymentDetails::new().with("card_number", "4242424242424242");
        let payment = processing_payment(PaymentMethod::CreditCard, details);
        let outcome = gateway(FixedRandom::approving()).process(&payment).await;

        assert!(!outcome.success);
        assert_eq!(outcome.error(), Some("Invalid card details"));
    }

    #[tokio::test]
    async fn test_refund_requires_transaction_id() {
        let payment = processing_payment(PaymentMethod::CreditCard, card_details());
        let result = gateway(FixedRandom::approving()).refund(&payment).await;
        assert!(matches!(result, Err(EngineError::PreconditionFailed(_))));
    }

    #[test]
    fn test_missing_secret_key() {
        let mut settings = crate::config::PaymentConfig::default().gateways.credit_card;
        settings.secret_key = None;
        let result = CreditCardGateway::new(&settings, simulation(FixedRandom::approving(), 0));
        assert!(matches!(
            result,
            Err(EngineError::NotConfigured(PaymentMethod::CreditCard))
        ));
    }

    #[test]
    fn test_card_brand() {
        assert_eq!(card_brand("5555"), "Mastercard");
        assert_eq!(card_brand("3782"), "American Express");
        assert_eq!(card_brand("6011"), "Unknown");
    }
}
