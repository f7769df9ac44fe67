use super::{CommitView, validate_unit};
use crate::domain::order::{Order, OrderId, UserId};
use crate::domain::payment::{Payment, PaymentId, PaymentMethod};
use crate::domain::ports::{OrderStore, UnitOfWork};
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Default)]
struct State {
    orders: HashMap<OrderId, Order>,
    payments: HashMap<PaymentId, Payment>,
    transaction_ids: HashMap<String, PaymentId>,
}

impl CommitView for State {
    fn order_exists(&self, order_id: OrderId) -> Result<bool> {
        Ok(self.orders.contains_key(&order_id))
    }

    fn has_payments(&self, order_id: OrderId) -> Result<bool> {
        Ok(self.payments.values().any(|p| p.order_id() == order_id))
    }

    fn transaction_owner(&self, transaction_id: &str) -> Result<Option<PaymentId>> {
        Ok(self.transaction_ids.get(transaction_id).copied())
    }
}

/// A thread-safe in-memory store for orders and payments.
///
/// Uses `Arc<RwLock<..>>` so clones share the same data. A commit holds the
/// write lock for validation and all writes, so readers never observe half
/// of a unit of work.
#[derive(Default, Clone)]
pub struct InMemoryOrderStore {
    state: Arc<RwLock<State>>,
}

impl InMemoryOrderStore {
    /// Creates a new, empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        let state = self.state.read().await;
        Ok(state.orders.get(&order_id).cloned())
    }

    async fn orders(&self) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        let mut orders: Vec<Order> = state.orders.values().cloned().collect();
        orders.sort_by_key(|o| (o.created_at(), o.id()));
        Ok(orders)
    }

    async fn get_payment(&self, payment_id: PaymentId) -> Result<Option<Payment>> {
        let state = self.state.read().await;
        Ok(state.payments.get(&payment_id).cloned())
    }

    async fn payments_for_order(&self, order_id: OrderId) -> Result<Vec<Payment>> {
        let state = self.state.read().await;
        let mut payments: Vec<Payment> = state
            .payments
            .values()
            .filter(|p| p.order_id() == order_id)
            .cloned()
            .collect();
        payments.sort_by_key(|p| (p.created_at(), p.id()));
        Ok(payments)
    }

    async fn payments(&self) -> Result<Vec<Payment>> {
        let state = self.state.read().await;
        let mut payments: Vec<Payment> = state.payments.values().cloned().collect();
        payments.sort_by_key(|p| (p.created_at(), p.id()));
        Ok(payments)
    }

    async fn successful_methods(&self, user_id: UserId) -> Result<Vec<PaymentMethod>> {
        let state = self.state.read().await;
        Ok(state
            .payments
            .values()
            .filter(|p| p.is_successful())
            .filter(|p| {
                state
                    .orders
                    .get(&p.order_id())
                    .is_some_and(|order| order.user_id() == user_id)
            })
            .map(Payment::method)
            .collect())
    }

    async fn commit(&self, work: UnitOfWork) -> Result<()> {
        let mut state = self.state.write().await;
        validate_unit(&work, &*state)?;

        for order in work.orders() {
            state.orders.insert(order.id(), order.clone());
        }
        for payment in work.payments() {
            if let Some(transaction_id) = payment.transaction_id() {
                state
                    .transaction_ids
                    .insert(transaction_id.to_string(), payment.id());
            }
            state.payments.insert(payment.id(), payment.clone());
        }
        for order_id in work.deleted_orders() {
            state.orders.remove(order_id);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::order::OrderStatus;
    use crate::domain::order::tests::sample_order;
    use crate::domain::payment::{PaymentDetails, PaymentMethod};
    use crate::error::EngineError;
    use chrono::Utc;
    use serde_json::json;

    fn settled_payment(order: &mut Order, transaction_id: &str) -> Payment {
        let now = Utc::now();
        order
            .transition_to(OrderStatus::Confirmed, false, now)
            .unwrap();
        let mut payment =
            Payment::open(order, PaymentMethod::CreditCard, PaymentDetails::new(), now).unwrap();
        payment.begin_processing(now).unwrap();
        payment
            .mark_successful(transaction_id.to_string(), json!({}), now)
            .unwrap();
        payment
    }

    #[tokio::test]
    async fn test_in_memory_order_store() {
        let store = InMemoryOrderStore::new();
        let order = sample_order();

        store
            .commit(UnitOfWork::new().save_order(order.clone()))
            .await
            .unwrap();
        let retrieved = store.get_order(order.id()).await.unwrap().unwrap();
        assert_eq!(retrieved, order);

        assert!(store.get_order(OrderId::new()).await.unwrap().is_none());
        assert_eq!(store.orders().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_commit_order_and_payment_together() {
        let store = InMemoryOrderStore::new();
        let mut order = sample_order();
        let payment = settled_payment(&mut order, "ch_1");

        store
            .commit(
                UnitOfWork::new()
                    .save_order(order.clone())
                    .save_payment(payment.clone()),
            )
            .await
            .unwrap();

        let payments = store.payments_for_order(order.id()).await.unwrap();
        assert_eq!(payments, vec![payment.clone()]);
        assert_eq!(
            store.get_payment(payment.id()).await.unwrap(),
            Some(payment)
        );
    }

    #[tokio::test]
    async fn test_commit_rejects_dangling_payment() {
        let store = InMemoryOrderStore::new();
        let mut order = sample_order();
        let payment = settled_payment(&mut order, "ch_1");

        let result = store.commit(UnitOfWork::new().save_payment(payment)).await;
        assert!(matches!(result, Err(EngineError::Conflict(_))));
        assert!(store.payments().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_commit_rejects_duplicate_transaction_id() {
        let store = InMemoryOrderStore::new();
        let mut first = sample_order();
        let mut second = sample_order();
        let p1 = settled_payment(&mut first, "ch_same");
        let p2 = settled_payment(&mut second, "ch_same");

        store
            .commit(UnitOfWork::new().save_order(first).save_payment(p1))
            .await
            .unwrap();
        let result = store
            .commit(
                UnitOfWork::new()
                    .save_order(second.clone())
                    .save_payment(p2),
            )
            .await;
        assert!(matches!(result, Err(EngineError::Conflict(_))));
        // Nothing from the rejected unit was written.
        assert!(store.get_order(second.id()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_successful_methods_by_user() {
        let store = InMemoryOrderStore::new();
        let mut order = sample_order();
        let payment = settled_payment(&mut order, "ch_1");
        let user_id = order.user_id();
        store
            .commit(UnitOfWork::new().save_order(order).save_payment(payment))
            .await
            .unwrap();

        assert_eq!(
            store.successful_methods(user_id).await.unwrap(),
            vec![PaymentMethod::CreditCard]
        );
        assert!(store.successful_methods(user_id + 1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delete_blocked_by_payments() {
        let store = InMemoryOrderStore::new();
        let mut order = sample_order();
        let payment = settled_payment(&mut order, "ch_1");
        store
            .commit(UnitOfWork::new().save_order(order.clone()).save_payment(payment))
            .await
            .unwrap();

        let result = store.commit(UnitOfWork::new().delete_order(order.id())).await;
        assert!(matches!(result, Err(EngineError::Conflict(_))));
        assert!(store.get_order(order.id()).await.unwrap().is_some());
    }
}
