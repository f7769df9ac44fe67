use super::command_reader::Command;
use crate::application::engine::TransactionEngine;
use crate::domain::context::RequestContext;
use crate::domain::order::{Customer, NewOrder, OrderId, OrderPatch, UserId};
use crate::domain::payment::{PaymentId, PaymentRequest};
use crate::error::{EngineError, Result};
use crate::interfaces::csv::ledger_writer::{OrderRow, PaymentRow};
use std::collections::HashMap;
use tracing::info;

const DEFAULT_USER: UserId = 1;

/// Executes script commands against an engine, tracking the script-local
/// references given to created orders and payments.
pub struct ScriptRunner<'a> {
    engine: &'a TransactionEngine,
    orders: HashMap<String, OrderId>,
    payments: HashMap<String, PaymentId>,
}

impl<'a> ScriptRunner<'a> {
    pub fn new(engine: &'a TransactionEngine) -> Self {
        Self {
            engine,
            orders: HashMap::new(),
            payments: HashMap::new(),
        }
    }

    fn order_id(&self, reference: &str) -> Result<OrderId> {
        match self.orders.get(reference) {
            Some(id) => Ok(*id),
            None => reference.parse(),
        }
    }

    fn payment_id(&self, reference: &str) -> Result<PaymentId> {
        match self.payments.get(reference) {
            Some(id) => Ok(*id),
            None => reference.parse(),
        }
    }

    pub async fn run(&mut self, command: Command) -> Result<()> {
        let ctx = RequestContext::for_user(command.user().unwrap_or(DEFAULT_USER));
        let engine = self.engine;

        match command {
            Command::CreateOrder {
                reference,
                customer_name,
                customer_email,
                customer_phone,
                items,
                notes,
                ..
            } => {
                let order = engine
                    .create_order(
                        &ctx,
                        NewOrder {
                            customer: Customer {
                                name: customer_name,
                                email: customer_email,
                                phone: customer_phone,
                            },
                            items,
                            notes,
                        },
                    )
                    .await?;
                if let Some(reference) = reference {
                    self.orders.insert(reference, order.id());
                }
            }
            Command::UpdateOrder {
                order,
                customer_name,
                customer_email,
                customer_phone,
                notes,
                items,
                status,
                ..
            } => {
                let patch = OrderPatch {
                    customer_name,
                    customer_email,
                    customer_phone,
                    notes,
                    items,
                    status,
                };
                engine
                    .update_order(&ctx, self.order_id(&order)?, patch)
                    .await?;
            }
            Command::ConfirmOrder { order, .. } => {
                engine.confirm_order(&ctx, self.order_id(&order)?).await?;
            }
            Command::CancelOrder { order, .. } => {
                engine.cancel_order(&ctx, self.order_id(&order)?).await?;
            }
            Command::CompleteOrder { order, .. } => {
                engine.complete_order(&ctx, self.order_id(&order)?).await?;
            }
            Command::DeleteOrder { order, .. } => {
                engine.delete_order(&ctx, self.order_id(&order)?).await?;
            }
            Command::Pay {
                reference,
                order,
                method,
                amount,
                details,
                ..
            } => {
                let request = PaymentRequest {
                    order_id: self.order_id(&order)?,
                    method,
                    amount,
                    details,
                };
                let result = engine.process_payment(&ctx, request).await;
                // Recorded failed attempts get their reference too.
                let payment_id = match &result {
                    Ok(payment) => Some(payment.id()),
                    Err(
                        EngineError::PaymentDeclined { payment_id, .. }
                        | EngineError::GatewayTimeout { payment_id, .. },
                    ) => *payment_id,
                    Err(_) => None,
                };
                if let (Some(reference), Some(payment_id)) = (reference, payment_id) {
                    self.payments.insert(reference, payment_id);
                }
                result?;
            }
            Command::Refund { payment, .. } => {
                engine
                    .refund_payment(&ctx, self.payment_id(&payment)?)
                    .await?;
            }
            Command::Verify { payment, .. } => {
                let payment_id = self.payment_id(&payment)?;
                let outcome = engine.verify_payment(&ctx, payment_id).await?;
                info!(
                    %payment_id,
                    success = outcome.success,
                    status = %outcome.status,
                    "payment verified"
                );
            }
        }
        Ok(())
    }

    fn order_label(&self, id: OrderId) -> String {
        label(&self.orders, id)
    }

    fn payment_label(&self, id: PaymentId) -> String {
        label(&self.payments, id)
    }

    /// The whole store as ledger rows, using script references where known.
    pub async fn ledger(&self) -> Result<(Vec<OrderRow>, Vec<PaymentRow>)> {
        let (orders, payments) = self.engine.snapshot().await?;

        let order_rows = orders
            .iter()
            .map(|order| OrderRow {
                order: self.order_label(order.id()),
                user: order.user_id(),
                customer: order.customer().name.clone(),
                status: order.status().as_str(),
                total: order.total().to_string(),
                items: order.items().len(),
                payments: payments
                    .iter()
                    .filter(|p| p.order_id() == order.id())
                    .count(),
            })
            .collect();

        let payment_rows = payments
            .iter()
            .map(|payment| PaymentRow {
                payment: self.payment_label(payment.id()),
                order: self.order_label(payment.order_id()),
                method: payment.method().as_str(),
                amount: payment.amount().to_string(),
                status: payment.status().as_str(),
                transaction_id: payment.transaction_id().unwrap_or_default().to_string(),
            })
            .collect();

        Ok((order_rows, payment_rows))
    }
}

fn label<T: PartialEq + ToString>(references: &HashMap<String, T>, id: T) -> String {
    references
        .iter()
        .find(|(_, known)| **known == id)
        .map(|(reference, _)| reference.clone())
        .unwrap_or_else(|| id.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::registry::{Availability, GatewayRegistry};
    use crate::application::registry::tests::stub;
    use crate::domain::payment::PaymentMethod;
    use crate::infrastructure::clock::SystemClock;
    use crate::infrastructure::in_memory::InMemoryOrderStore;
    use crate::interfaces::script::command_reader::CommandReader;
    use std::sync::Arc;

    fn engine() -> TransactionEngine {
        TransactionEngine::new(
            Box::new(InMemoryOrderStore::new()),
            GatewayRegistry::new().with(stub(PaymentMethod::CreditCard), Availability::enabled()),
            Arc::new(SystemClock),
        )
    }

    async fn run_script(runner: &mut ScriptRunner<'_>, script: &str) -> Vec<Result<()>> {
        let mut results = Vec::new();
        for command in CommandReader::new(script.as_bytes()).commands() {
            results.push(match command {
                Ok(command) => runner.run(command).await,
                Err(e) => Err(e),
            });
        }
        results
    }

    #[tokio::test]
    async fn test_script_pays_order_by_reference() {
        let engine = engine();
        let mut runner = ScriptRunner::new(&engine);
        let results = run_script(
            &mut runner,
            r#"{"op": "create_order", "ref": "o1", "customer_name": "Ada", "customer_email": "ada@example.com", "items": [{"product_name": "A", "quantity": 2, "price": "50.00"}, {"product_name": "B", "quantity": 1, "price": "25.00"}]}
{"op": "confirm_order", "order": "o1"}
{"op": "pay", "ref": "p1", "order": "o1", "method": "credit_card", "amount": "125.000"}
{"op": "verify", "payment": "p1"}"#,
        )
        .await;
        assert!(results.iter().all(Result::is_ok), "{results:?}");

        let (orders, payments) = runner.ledger().await.unwrap();
        assert_eq!(orders.len(), 1);
        assert_eq!(orders[0].order, "o1");
        assert_eq!(orders[0].status, "paid");
        assert_eq!(orders[0].total, "125.000");
        assert_eq!(orders[0].payments, 1);
        assert_eq!(payments[0].payment, "p1");
        assert_eq!(payments[0].order, "o1");
        assert_eq!(payments[0].status, "successful");
    }

    #[tokio::test]
    async fn test_unknown_reference_and_foreign_user() {
        let engine = engine();
        let mut runner = ScriptRunner::new(&engine);
        let results = run_script(
            &mut runner,
            r#"{"op": "confirm_order", "order": "nope"}
{"op": "create_order", "ref": "o1", "user": 5, "customer_name": "Ada", "customer_email": "ada@example.com", "items": [{"product_name": "A", "quantity": 1, "price": "1"}]}
{"op": "confirm_order", "order": "o1"}
{"op": "confirm_order", "order": "o1", "user": 5}"#,
        )
        .await;

        assert!(matches!(results[0], Err(EngineError::Validation(_))));
        assert!(results[1].is_ok());
        assert!(matches!(results[2], Err(EngineError::NotFound(_))));
        assert!(results[3].is_ok());
    }
}
