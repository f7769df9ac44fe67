use super::payment::{Payment, PaymentMethod, error_response};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;

/// Result of asking a gateway to collect a payment.
#[derive(Debug, Clone, PartialEq)]
pub struct ChargeOutcome {
    pub success: bool,
    pub transaction_id: Option<String>,
    pub gateway_response: Value,
}

impl ChargeOutcome {
    pub fn approved(transaction_id: impl Into<String>, gateway_response: Value) -> Self {
        Self {
            success: true,
            transaction_id: Some(transaction_id.into()),
            gateway_response,
        }
    }

    pub fn declined(error: impl Into<String>) -> Self {
        Self {
            success: false,
            transaction_id: None,
            gateway_response: error_response(error),
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.gateway_response.get("error").and_then(Value::as_str)
    }
}

/// Result of asking a gateway to return collected money.
#[derive(Debug, Clone, PartialEq)]
pub struct RefundOutcome {
    pub success: bool,
    pub refund_id: Option<String>,
    pub gateway_response: Value,
}

impl RefundOutcome {
    pub fn accepted(refund_id: impl Into<String>, gateway_response: Value) -> Self {
        Self {
            success: true,
            refund_id: Some(refund_id.into()),
            gateway_response,
        }
    }

    pub fn rejected(error: impl Into<String>) -> Self {
        Self {
            success: false,
            refund_id: None,
            gateway_response: error_response(error),
        }
    }

    pub fn error(&self) -> Option<&str> {
        self.gateway_response.get("error").and_then(Value::as_str)
    }
}

/// Result of a read-only status query against a gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifyOutcome {
    pub success: bool,
    pub status: String,
    pub gateway_response: Value,
}

/// Capability contract shared by every payment provider.
///
/// `process` and `verify` never fail: provider problems come back as an
/// unsuccessful outcome carrying `{"error": ...}`. `refund` fails with
/// `PreconditionFailed` when the payment was never settled.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    fn method(&self) -> PaymentMethod;

    async fn process(&self, payment: &Payment) -> ChargeOutcome;

    async fn refund(&self, payment: &Payment) -> Result<RefundOutcome>;

    async fn verify(&self, transaction_id: &str) -> VerifyOutcome;
}

pub type GatewayHandle = Arc<dyn PaymentGateway>;
