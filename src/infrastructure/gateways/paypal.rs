use super::Simulation;
use crate::config::{GatewayMode, GatewaySettings};
use crate::domain::gateway::{ChargeOutcome, PaymentGateway, RefundOutcome, VerifyOutcome};
use crate::domain::payment::{Payment, PaymentMethod};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use serde_json::json;
use tracing::info;

/// Wallet simulator (about 10% of charges declined by default).
pub struct PaypalGateway {
    mode: GatewayMode,
    simulation: Simulation,
}

impl PaypalGateway {
    pub fn new(settings: &GatewaySettings, simulation: Simulation) -> Result<Self> {
        let missing = |value: &Option<String>| value.as_deref().is_none_or(str::is_empty);
        if missing(&settings.client_id) || missing(&settings.secret) {
            return Err(EngineError::NotConfigured(PaymentMethod::Paypal));
        }
        Ok(Self {
            mode: settings.mode,
            simulation,
        })
    }
}

#[async_trait]
impl PaymentGateway for PaypalGateway {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::Paypal
    }

    async fn process(&self, payment: &Payment) -> ChargeOutcome {
        let Some(email) = payment.details().get("email").filter(|e| !e.trim().is_empty()) else {
            return ChargeOutcome::declined("PayPal email required");
        };

        if !self.simulation.settle().await {
            return ChargeOutcome::declined("Payment declined");
        }

        let transaction_id = format!("PAYPAL-{}", self.simulation.token().to_uppercase());
        info!(
            payment_id = %payment.id(),
            transaction_id = %transaction_id,
            mode = self.mode.as_str(),
            "wallet charge approved"
        );
        ChargeOutcome::approved(
            transaction_id,
            json!({
                "status": "COMPLETED",
                "payer_email": email,
                "mode": self.mode.as_str(),
            }),
        )
    }

    async fn refund(&self, payment: &Payment) -> Result<RefundOutcome> {
        if payment.transaction_id().is_none() {
            return Err(EngineError::PreconditionFailed(
                "No transaction ID".to_string(),
            ));
        }
        Ok(RefundOutcome::accepted(
            format!("REFUND-{}", self.simulation.token().to_uppercase()),
            json!({
                "status": "COMPLETED",
                "refund_amount": payment.amount(),
            }),
        ))
    }

    async fn verify(&self, transaction_id: &str) -> VerifyOutcome {
        VerifyOutcome {
            success: true,
            status: "COMPLETED".to_string(),
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
    use crate::config::PaymentConfig;
    use crate::domain::payment::PaymentDetails;
    use crate::infrastructure::gateways::tests::{processing_payment, simulation};
    use crate::infrastructure::random::FixedRandom;

    fn gateway(random: FixedRandom) -> PaypalGateway {
        let settings = PaymentConfig::default().gateways.paypal;
        PaypalGateway::new(&settings, simulation(random, settings.decline_rate)).unwrap()
    }

    #[tokio::test]
    async fn test_wallet_charge() {
        let details = PaymentDetails::new().with("email", "buyer@example.com");
        let payment = processing_payment(PaymentMethod::Paypal, details);

        let outcome = gateway(FixedRandom::new(90)).process(&payment).await;
        assert!(outcome.success);
        assert_eq!(outcome.transaction_id.as_deref(), Some("PAYPAL-00000001"));
        assert_eq!(outcome.gateway_response["payer_email"], "buyer@example.com");

        let outcome = gateway(FixedRandom::new(91)).process(&payment).await;
        assert!(!outcome.success);
        assert_eq!(outcome.error(), Some("Payment declined"));
    }

    #[tokio::test]
    async fn test_wallet_requires_email() {
        let payment = processing_payment(PaymentMethod::Paypal, PaymentDetails::new());
        let outcome = gateway(FixedRandom::approving()).process(&payment).await;
        assert_eq!(outcome.error(), Some("PayPal email required"));
    }

    #[tokio::test]
    async fn test_wallet_verify_is_read_only() {
        let gateway = gateway(FixedRandom::approving());
        let first = gateway.verify("PAYPAL-1").await;
        assert!(first.success);
        assert_eq!(first.status, "COMPLETED");
        assert_eq!(first.gateway_response["id"], "PAYPAL-1");
    }
}
