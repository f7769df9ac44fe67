use crate::domain::money::Money;
use crate::domain::payment::{PaymentId, PaymentMethod};
use rust_decimal::Decimal;
use std::fmt;
use std::time::Duration;
use thiserror::Error;

pub type Result<T, E = EngineError> = std::result::Result<T, E>;

/// Every failure an engine operation can surface to its caller.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
    #[error("Amount mismatch: {actual} != {expected}")]
    AmountMismatch { expected: Money, actual: Decimal },
    #[error("Gateway '{0}' not configured")]
    NotConfigured(PaymentMethod),
    #[error("No payment gateway available: {0}")]
    NoGatewayAvailable(String),
    #[error("Payment declined by {method}: {reason}")]
    PaymentDeclined {
        method: PaymentMethod,
        reason: String,
        payment_id: Option<PaymentId>,
    },
    #[error("Gateway '{method}' timed out after {}ms", .after.as_millis())]
    GatewayTimeout {
        method: PaymentMethod,
        after: Duration,
        payment_id: Option<PaymentId>,
    },
    #[error("Precondition failed: {0}")]
    PreconditionFailed(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Internal error: {0}")]
    Internal(String),
    #[error("Storage error: {0}")]
    Storage(Box<dyn std::error::Error + Send + Sync>),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Coarse classification of an [`EngineError`], stable enough to hand to a
/// presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    InvalidTransition,
    AmountMismatch,
    NotConfigured,
    NoGatewayAvailable,
    PaymentDeclined,
    GatewayTimeout,
    PreconditionFailed,
    Conflict,
    NotFound,
    Internal,
}

impl ErrorKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Validation => "validation_error",
            Self::InvalidTransition => "invalid_transition",
            Self::AmountMismatch => "amount_mismatch",
            Self::NotConfigured => "not_configured",
            Self::NoGatewayAvailable => "no_gateway_available",
            Self::PaymentDeclined => "payment_declined",
            Self::GatewayTimeout => "gateway_timeout",
            Self::PreconditionFailed => "precondition_failed",
            Self::Conflict => "conflict",
            Self::NotFound => "not_found",
            Self::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::InvalidTransition(_) => ErrorKind::InvalidTransition,
            Self::AmountMismatch { .. } => ErrorKind::AmountMismatch,
            Self::NotConfigured(_) => ErrorKind::NotConfigured,
            Self::NoGatewayAvailable(_) => ErrorKind::NoGatewayAvailable,
            Self::PaymentDeclined { .. } => ErrorKind::PaymentDeclined,
            Self::GatewayTimeout { .. } => ErrorKind::GatewayTimeout,
            Self::PreconditionFailed(_) => ErrorKind::PreconditionFailed,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Config(_)
            | Self::Internal(_)
            | Self::Storage(_)
            | Self::Io(_)
            | Self::Csv(_)
            | Self::Json(_) => ErrorKind::Internal,
        }
    }

    /// Declines and timeouts can be retried with a fresh payment attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind(),
            ErrorKind::PaymentDeclined | ErrorKind::GatewayTimeout
        )
    }

    pub(crate) fn storage(message: impl Into<String>) -> Self {
        Self::Storage(Box::new(std::io::Error::other(message.into())))
    }
}

impl From<::config::ConfigError> for EngineError {
    fn from(err: ::config::ConfigError) -> Self {
        Self::Config(err.to_string())
    }
}

#[cfg(feature = "storage-rocksdb")]
impl From<rocksdb::Error> for EngineError {
    fn from(err: rocksdb::Error) -> Self {
        Self::Storage(Box::new(err))
    }
}
