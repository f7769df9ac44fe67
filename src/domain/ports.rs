use super::order::{Order, OrderId, UserId};
use super::payment::{Payment, PaymentId, PaymentMethod};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// A batch of writes applied all-or-nothing by [`OrderStore::commit`].
#[derive(Debug, Clone, Default)]
pub struct UnitOfWork {
    orders: Vec<Order>,
    payments: Vec<Payment>,
    deleted_orders: Vec<OrderId>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn save_order(mut self, order: Order) -> Self {
        self.orders.push(order);
        self
    }

    pub fn save_payment(mut self, payment: Payment) -> Self {
        self.payments.push(payment);
        self
    }

    pub fn delete_order(mut self, order_id: OrderId) -> Self {
        self.deleted_orders.push(order_id);
        self
    }

    pub fn orders(&self) -> &[Order] {
        &self.orders
    }

    pub fn payments(&self) -> &[Payment] {
        &self.payments
    }

    pub fn deleted_orders(&self) -> &[OrderId] {
        &self.deleted_orders
    }

    pub fn is_empty(&self) -> bool {
        self.orders.is_empty() && self.payments.is_empty() && self.deleted_orders.is_empty()
    }
}

/// Transactional storage for orders and their payments.
///
/// `commit` must apply the whole unit or nothing, and must reject a unit
/// that would leave a dangling reference: a payment without its order, an
/// order deleted while payments point at it, or a transaction id that is
/// already used by another payment.
#[async_trait]
pub trait OrderStore: Send + Sync {
    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>>;
    async fn orders(&self) -> Result<Vec<Order>>;
    async fn get_payment(&self, payment_id: PaymentId) -> Result<Option<Payment>>;
    async fn payments_for_order(&self, order_id: OrderId) -> Result<Vec<Payment>>;
    async fn payments(&self) -> Result<Vec<Payment>>;
    /// Methods of every successful payment on the user's orders.
    async fn successful_methods(&self, user_id: UserId) -> Result<Vec<PaymentMethod>>;
    async fn commit(&self, work: UnitOfWork) -> Result<()>;
}

pub type OrderStoreBox = Box<dyn OrderStore>;
pub type OrderStoreHandle = Arc<dyn OrderStore>;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Source of randomness for the gateway simulators.
pub trait RandomSource: Send + Sync {
    /// A roll in `1..=100`.
    fn roll_percent(&self) -> u8;

    /// A fresh token for transaction and refund ids.
    fn token(&self) -> String;
}

pub type ClockHandle = Arc<dyn Clock>;
pub type RandomHandle = Arc<dyn RandomSource>;
