//! Adapters behind the domain ports: stores, gateway simulators, clock and
//! randomness sources.

use crate::domain::order::OrderId;
use crate::domain::payment::PaymentId;
use crate::domain::ports::UnitOfWork;
use crate::error::{EngineError, Result};
use std::collections::HashMap;

pub mod clock;
pub mod gateways;
pub mod in_memory;
pub mod random;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;

/// Read access a store offers while validating a unit of work.
pub(crate) trait CommitView {
    fn order_exists(&self, order_id: OrderId) -> Result<bool>;
    fn has_payments(&self, order_id: OrderId) -> Result<bool>;
    fn transaction_owner(&self, transaction_id: &str) -> Result<Option<PaymentId>>;
}

/// Rejects a unit of work that would break a cross reference between
/// orders and payments. Runs before anything is written.
pub(crate) fn validate_unit(work: &UnitOfWork, view: &impl CommitView) -> Result<()> {
    for order_id in work.deleted_orders() {
        let pending_payment = work.payments().iter().any(|p| p.order_id() == *order_id);
        if pending_payment || view.has_payments(*order_id)? {
            return Err(EngineError::Conflict(format!(
                "Cannot delete order {order_id} with associated payments"
            )));
        }
    }

    let mut claimed: HashMap<&str, PaymentId> = HashMap::new();
    for payment in work.payments() {
        let order_id = payment.order_id();
        let in_unit = work.orders().iter().any(|o| o.id() == order_id);
        if work.deleted_orders().contains(&order_id) || !(in_unit || view.order_exists(order_id)?)
        {
            return Err(EngineError::Conflict(format!(
                "Payment {} references unknown order {order_id}",
                payment.id()
            )));
        }

        if let Some(transaction_id) = payment.transaction_id() {
            let owner = match claimed.get(transaction_id) {
                Some(owner) => Some(*owner),
                None => view.transaction_owner(transaction_id)?,
            };
            if let Some(owner) = owner
                && owner != payment.id()
            {
                return Err(EngineError::Conflict(format!(
                    "Transaction id {transaction_id} already belongs to payment {owner}"
                )));
            }
            claimed.insert(transaction_id, payment.id());
        }
    }
    Ok(())
}
