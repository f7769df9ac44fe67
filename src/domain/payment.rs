use super::money::Money;
use super::order::{Order, OrderId};
use crate::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentId(Uuid);

impl PaymentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PaymentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PaymentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for PaymentId {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| EngineError::Validation(format!("Invalid payment id '{s}': {e}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    CreditCard,
    Paypal,
    BankTransfer,
    CashOnDelivery,
}

impl PaymentMethod {
    pub const ALL: [PaymentMethod; 4] = [
        Self::CreditCard,
        Self::Paypal,
        Self::BankTransfer,
        Self::CashOnDelivery,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CreditCard => "credit_card",
            Self::Paypal => "paypal",
            Self::BankTransfer => "bank_transfer",
            Self::CashOnDelivery => "cash_on_delivery",
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            Self::CreditCard => "Credit Card",
            Self::Paypal => "PayPal",
            Self::BankTransfer => "Bank Transfer",
            Self::CashOnDelivery => "Cash on Delivery",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|method| method.as_str() == s)
            .ok_or_else(|| EngineError::Validation(format!("Unknown payment method '{s}'")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Successful,
    Failed,
    Refunded,
    Cancelled,
}

impl PaymentStatus {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Successful => "successful",
            Self::Failed => "failed",
            Self::Refunded => "refunded",
            Self::Cancelled => "cancelled",
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Processing => "Processing",
            Self::Successful => "Successful",
            Self::Failed => "Failed",
            Self::Refunded => "Refunded",
            Self::Cancelled => "Cancelled",
        }
    }

    /// `successful` counts as final even though it may still be refunded.
    pub const fn is_final(&self) -> bool {
        matches!(
            self,
            Self::Successful | Self::Failed | Self::Refunded | Self::Cancelled
        )
    }

    pub const fn can_transition_to(&self, next: PaymentStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Pending, Self::Cancelled)
                | (Self::Processing, Self::Successful)
                | (Self::Processing, Self::Failed)
                | (Self::Successful, Self::Refunded)
        )
    }
}

impl fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Method-specific payment data such as card number or wallet email.
///
/// `Debug` prints only the field names so the values never reach a log line.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PaymentDetails(BTreeMap<String, String>);

impl PaymentDetails {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Names of the `required` fields that are absent or blank.
    pub fn missing<'a>(&self, required: &[&'a str]) -> Vec<&'a str> {
        required
            .iter()
            .copied()
            .filter(|key| self.get(key).is_none_or(|v| v.trim().is_empty()))
            .collect()
    }
}

impl fmt::Debug for PaymentDetails {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.0.keys()).finish()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PaymentDetails {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Input for settling an order.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
    pub order_id: OrderId,
    pub method: PaymentMethod,
    pub amount: rust_decimal::Decimal,
    pub details: PaymentDetails,
}

/// One attempt to settle an order for a fixed amount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    id: PaymentId,
    order_id: OrderId,
    method: PaymentMethod,
    amount: Money,
    status: PaymentStatus,
    transaction_id: Option<String>,
    details: PaymentDetails,
    gateway_response: Value,
    processed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Payment {
    /// Opens a pending payment for the full order total.
    pub(crate) fn open(
        order: &Order,
        method: PaymentMethod,
        details: PaymentDetails,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        if !order.can_be_paid() {
            return Err(EngineError::InvalidTransition(format!(
                "Order must be confirmed. Current: {}",
                order.status()
            )));
        }
        Ok(Self {
            id: PaymentId::new(),
            order_id: order.id(),
            method,
            amount: order.total(),
            status: PaymentStatus::Pending,
            transaction_id: None,
            details,
            gateway_response: Value::Null,
            processed_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id(&self) -> PaymentId {
        self.id
    }

    pub fn order_id(&self) -> OrderId {
        self.order_id
    }

    pub fn method(&self) -> PaymentMethod {
        self.method
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn status(&self) -> PaymentStatus {
        self.status
    }

    pub fn transaction_id(&self) -> Option<&str> {
        self.transaction_id.as_deref()
    }

    pub fn details(&self) -> &PaymentDetails {
        &self.details
    }

    pub fn gateway_response(&self) -> &Value {
        &self.gateway_response
    }

    pub fn processed_at(&self) -> Option<DateTime<Utc>> {
        self.processed_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn is_successful(&self) -> bool {
        self.status == PaymentStatus::Successful
    }

    fn transition(&mut self, next: PaymentStatus, now: DateTime<Utc>) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(EngineError::InvalidTransition(format!(
                "Payment cannot move from {} to {}",
                self.status, next
            )));
        }
        self.status = next;
        self.updated_at = now;
        Ok(())
    }

    pub(crate) fn begin_processing(&mut self, now: DateTime<Utc>) -> Result<()> {
        self.transition(PaymentStatus::Processing, now)
    }

    pub(crate) fn mark_successful(
        &mut self,
        transaction_id: String,
        response: Value,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.transition(PaymentStatus::Successful, now)?;
        self.transaction_id = Some(transaction_id);
        self.gateway_response = response;
        self.processed_at = Some(now);
        Ok(())
    }

    pub(crate) fn mark_failed(&mut self, response: Value, now: DateTime<Utc>) -> Result<()> {
        self.transition(PaymentStatus::Failed, now)?;
        self.gateway_response = response;
        Ok(())
    }

    /// Records a refund, keeping the original gateway response and adding
    /// the refund response under the `refund` key.
    pub(crate) fn mark_refunded(
        &mut self,
        refund_id: Option<String>,
        response: Value,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.transition(PaymentStatus::Refunded, now)?;

        let mut refund = match response {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => Map::from_iter([("response".to_string(), other)]),
        };
        if let Some(refund_id) = refund_id {
            refund.insert("refund_id".to_string(), Value::String(refund_id));
        }

        let mut merged = match std::mem::take(&mut self.gateway_response) {
            Value::Object(map) => map,
            Value::Null => Map::new(),
            other => Map::from_iter([("original".to_string(), other)]),
        };
        merged.insert("refund".to_string(), Value::Object(refund));
        self.gateway_response = Value::Object(merged);
        Ok(())
    }

    /// A short error message for failed attempts.
    pub fn failure_reason(&self) -> Option<&str> {
        match self.status {
            PaymentStatus::Failed => self.gateway_response.get("error").and_then(Value::as_str),
            _ => None,
        }
    }
}

/// Builds the `{"error": ...}` response used for every failed gateway call.
pub fn error_response(message: impl Into<String>) -> Value {
    json!({ "error": message.into() })
}
