use super::Simulation;
use crate::config::GatewaySettings;
use crate::domain::gateway::{ChargeOutcome, PaymentGateway, RefundOutcome, VerifyOutcome};
use crate::domain::money::Money;
use crate::domain::payment::{Payment, PaymentMethod};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use serde_json::json;
use tracing::info;

/// Cash collected by the courier. Enforces the configured ceiling locally.
pub struct CashOnDeliveryGateway {
    max_amount: Option<Money>,
    simulation: Simulation,
}

impl CashOnDeliveryGateway {
    pub fn new(settings: &GatewaySettings, simulation: Simulation) -> Self {
        Self {
            max_amount: settings.max_amount,
            simulation,
        }
    }
}

#[async_trait]
impl PaymentGateway for CashOnDeliveryGateway {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::CashOnDelivery
    }

    async fn process(&self, payment: &Payment) -> ChargeOutcome {
        if let Some(max) = self.max_amount
            && payment.amount() > max
        {
            return ChargeOutcome::declined(format!("Amount exceeds COD limit ({max})"));
        }
        if !self.simulation.settle().await {
            return ChargeOutcome::declined("Cash on delivery unavailable");
        }

        let transaction_id = format!("COD-{}", self.simulation.token().to_uppercase());
        info!(
            payment_id = %payment.id(),
            transaction_id = %transaction_id,
            "cash on delivery registered"
        );
        ChargeOutcome::approved(
            transaction_id,
            json!({
                "status": "pending_delivery",
                "amount_to_collect": payment.amount(),
            }),
        )
    }

    async fn refund(&self, payment: &Payment) -> Result<RefundOutcome> {
        if payment.transaction_id().is_none() {
            return Err(EngineError::PreconditionFailed(
                "No transaction ID for refund".to_string(),
            ));
        }
        Ok(RefundOutcome::accepted(
            format!("CODR-{}", self.simulation.token().to_uppercase()),
            json!({ "status": "processing" }),
        ))
    }

    async fn verify(&self, transaction_id: &str) -> VerifyOutcome {
        VerifyOutcome {
            success: true,
            status: "pending_delivery".to_string(),
            gateway_response: json!({ "id": transaction_id }),
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
    use rust_decimal_macros::dec;

    fn gateway(max: rust_decimal::Decimal) -> CashOnDeliveryGateway {
        let mut settings = PaymentConfig::default().gateways.cash_on_delivery;
        settings.max_amount = Some(Money::new(max).unwrap());
        CashOnDeliveryGateway::new(&settings, simulation(FixedRandom::approving(), 0))
    }

    #[tokio::test]
    async fn test_cod_within_limit() {
        let payment = processing_payment(PaymentMethod::CashOnDelivery, PaymentDetails::new());
        let outcome = gateway(dec!(125)).process(&payment).await;
        assert!(outcome.success);
        assert_eq!(outcome.gateway_response["amount_to_collect"], "125.000");
    }

    #[tokio::test]
    async fn test_cod_over_limit() {
        let payment = processing_payment(PaymentMethod::CashOnDelivery, PaymentDetails::new());
        let outcome = gateway(dec!(100)).process(&payment).await;
        assert!(!outcome.success);
        assert_eq!(outcome.transaction_id, None);
        assert_eq!(outcome.error(), Some("Amount exceeds COD limit (100.000)"));
    }
}
