use crate::domain::order::{NewOrderItem, UserId};
use crate::domain::payment::{PaymentDetails, PaymentMethod};
use crate::error::{EngineError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::BufRead;

/// One line of a command script.
///
/// `order` and `payment` fields name a script-local reference (the `ref` given
/// when the entity was created) or a raw id. `user` defaults to 1.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Command {
    CreateOrder {
        #[serde(rename = "ref")]
        reference: Option<String>,
        user: Option<UserId>,
        customer_name: String,
        customer_email: String,
        customer_phone: Option<String>,
        items: Vec<NewOrderItem>,
        notes: Option<String>,
    },
    UpdateOrder {
        order: String,
        user: Option<UserId>,
        customer_name: Option<String>,
        customer_email: Option<String>,
        customer_phone: Option<String>,
        notes: Option<String>,
        items: Option<Vec<NewOrderItem>>,
        status: Option<String>,
    },
    ConfirmOrder {
        order: String,
        user: Option<UserId>,
    },
    CancelOrder {
        order: String,
        user: Option<UserId>,
    },
    CompleteOrder {
        order: String,
        user: Option<UserId>,
    },
    DeleteOrder {
        order: String,
        user: Option<UserId>,
    },
    Pay {
        #[serde(rename = "ref")]
        reference: Option<String>,
        order: String,
        user: Option<UserId>,
        method: PaymentMethod,
        amount: Decimal,
        #[serde(default)]
        details: PaymentDetails,
    },
    Refund {
        payment: String,
        user: Option<UserId>,
    },
    Verify {
        payment: String,
        user: Option<UserId>,
    },
}

impl Command {
    pub fn user(&self) -> Option<UserId> {
        match self {
            Self::CreateOrder { user, .. }
            | Self::UpdateOrder { user, .. }
            | Self::ConfirmOrder { user, .. }
            | Self::CancelOrder { user, .. }
            | Self::CompleteOrder { user, .. }
            | Self::DeleteOrder { user, .. }
            | Self::Pay { user, .. }
            | Self::Refund { user, .. }
            | Self::Verify { user, .. } => *user,
        }
    }
}

/// Reads commands from a JSON-lines source.
///
/// Blank lines and lines starting with `#` are skipped. Each remaining line
/// yields its own `Result`, so one malformed command does not stop the rest.
pub struct CommandReader<R: BufRead> {
    source: R,
}

impl<R: BufRead> CommandReader<R> {
    pub fn new(source: R) -> Self {
        Self { source }
    }

    /// Lazily parses commands line by line.
    pub fn commands(self) -> impl Iterator<Item = Result<Command>> {
        self.source
            .lines()
            .enumerate()
            .filter_map(|(index, line)| match line {
                Ok(line) => {
                    let line = line.trim();
                    if line.is_empty() || line.starts_with('#') {
                        return None;
                    }
                    Some(serde_json::from_str(line).map_err(|e| {
                        EngineError::Validation(format!("line {}: {e}", index + 1))
                    }))
                }
                Err(e) => Some(Err(EngineError::from(e))),
            })
    }
}
