use super::Simulation;
use crate::config::GatewaySettings;
use crate::domain::gateway::{ChargeOutcome, PaymentGateway, RefundOutcome, VerifyOutcome};
use crate::domain::payment::{Payment, PaymentMethod};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use serde_json::json;
use tracing::info;

const REQUIRED_FIELDS: [&str; 2] = ["account_number", "bank_name"];

/// Bank transfer registration. Deterministic: valid details always succeed
/// and settle out of band.
pub struct BankTransferGateway {
    processing_time: String,
    simulation: Simulation,
}

impl BankTransferGateway {
    pub fn new(settings: &GatewaySettings, simulation: Simulation) -> Self {
        Self {
            processing_time: settings
                .processing_time
                .clone()
                .unwrap_or_else(|| "3-5 business days".to_string()),
            simulation,
        }
    }
}

#[async_trait]
impl PaymentGateway for BankTransferGateway {
    fn method(&self) -> PaymentMethod {
        PaymentMethod::BankTransfer
    }

    async fn process(&self, payment: &Payment) -> ChargeOutcome {
        let details = payment.details();
        if !details.missing(&REQUIRED_FIELDS).is_empty() {
            return ChargeOutcome::declined("Bank details required");
        }
        if !self.simulation.settle().await {
            return ChargeOutcome::declined("Bank transfer rejected");
        }

        let transaction_id = format!("BT-{}", self.simulation.token().to_uppercase());
        info!(
            payment_id = %payment.id(),
            transaction_id = %transaction_id,
            "bank transfer initiated"
        );
        ChargeOutcome::approved(
            transaction_id,
            json!({
                "status": "pending_verification",
                "processing_time": self.processing_time,
                "bank_name": details.get("bank_name"),
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
            format!("BTR-{}", self.simulation.token().to_uppercase()),
            json!({
                "status": "processing",
                "processing_time": self.processing_time,
            }),
        ))
    }

    async fn verify(&self, transaction_id: &str) -> VerifyOutcome {
        VerifyOutcome {
            success: true,
            status: "pending_verification".to_string(),
            gateway_response: json!({ "id": transaction_id }),
        }
    }
}
