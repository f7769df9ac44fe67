use super::{CommitView, validate_unit};
use crate::domain::order::{Order, OrderId, UserId};
use crate::domain::payment::{Payment, PaymentId, PaymentMethod};
use crate::domain::ports::{OrderStore, UnitOfWork};
use crate::error::{EngineError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, IteratorMode, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Column Family for storing orders (items included).
pub const CF_ORDERS: &str = "orders";
/// Column Family for storing payments.
pub const CF_PAYMENTS: &str = "payments";
/// Column Family mapping gateway transaction ids to payment ids.
pub const CF_TRANSACTION_IDS: &str = "transaction_ids";

/// A persistent store implementation using RocksDB.
///
/// Orders and payments live in separate Column Families as JSON. A unit of
/// work is validated and written through a single `WriteBatch`, so it lands
/// atomically. Commits are serialized by `commit_lock` so validation reads
/// and the batch write cannot interleave with another commit.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDBStore {
    db: Arc<DB>,
    commit_lock: Arc<Mutex<()>>,
}

impl RocksDBStore {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the required column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let descriptors = [CF_ORDERS, CF_PAYMENTS, CF_TRANSACTION_IDS]
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect::<Vec<_>>();

        let db = DB::open_cf_descriptors(&opts, path, descriptors)?;

        Ok(Self {
            db: Arc::new(db),
            commit_lock: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| EngineError::storage(format!("Column family '{name}' not found")))
    }

    fn get_json<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key)? {
            Some(bytes) => Ok(Some(decode(&bytes)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut values = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::Start) {
            let (_key, value) = item?;
            values.push(decode(&value)?);
        }
        Ok(values)
    }
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value)
        .map_err(|e| EngineError::storage(format!("Serialization error: {e}")))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes)
        .map_err(|e| EngineError::storage(format!("Deserialization error: {e}")))
}

fn key_of(id: impl ToString) -> Vec<u8> {
    id.to_string().into_bytes()
}

impl CommitView for RocksDBStore {
    fn order_exists(&self, order_id: OrderId) -> Result<bool> {
        let cf = self.cf(CF_ORDERS)?;
        Ok(self.db.get_pinned_cf(cf, key_of(order_id))?.is_some())
    }

    fn has_payments(&self, order_id: OrderId) -> Result<bool> {
        Ok(self
            .scan::<Payment>(CF_PAYMENTS)?
            .iter()
            .any(|p| p.order_id() == order_id))
    }

    fn transaction_owner(&self, transaction_id: &str) -> Result<Option<PaymentId>> {
        self.get_json(CF_TRANSACTION_IDS, transaction_id.as_bytes())
    }
}

#[async_trait]
impl OrderStore for RocksDBStore {
    async fn get_order(&self, order_id: OrderId) -> Result<Option<Order>> {
        self.get_json(CF_ORDERS, &key_of(order_id))
    }

    async fn orders(&self) -> Result<Vec<Order>> {
        let mut orders: Vec<Order> = self.scan(CF_ORDERS)?;
        orders.sort_by_key(|o| (o.created_at(), o.id()));
        Ok(orders)
    }

    async fn get_payment(&self, payment_id: PaymentId) -> Result<Option<Payment>> {
        self.get_json(CF_PAYMENTS, &key_of(payment_id))
    }

    async fn payments_for_order(&self, order_id: OrderId) -> Result<Vec<Payment>> {
        let mut payments: Vec<Payment> = self
            .scan::<Payment>(CF_PAYMENTS)?
            .into_iter()
            .filter(|p| p.order_id() == order_id)
            .collect();
        payments.sort_by_key(|p| (p.created_at(), p.id()));
        Ok(payments)
    }

    async fn payments(&self) -> Result<Vec<Payment>> {
        let mut payments: Vec<Payment> = self.scan(CF_PAYMENTS)?;
        payments.sort_by_key(|p| (p.created_at(), p.id()));
        Ok(payments)
    }

    async fn successful_methods(&self, user_id: UserId) -> Result<Vec<PaymentMethod>> {
        let owned: HashSet<OrderId> = self
            .scan::<Order>(CF_ORDERS)?
            .into_iter()
            .filter(|order| order.user_id() == user_id)
            .map(|order| order.id())
            .collect();
        if owned.is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .scan::<Payment>(CF_PAYMENTS)?
            .into_iter()
            .filter(|p| p.is_successful() && owned.contains(&p.order_id()))
            .map(|p| p.method())
            .collect())
    }

    async fn commit(&self, work: UnitOfWork) -> Result<()> {
        let _guard = self.commit_lock.lock().unwrap_or_else(|e| e.into_inner());
        validate_unit(&work, self)?;

        let orders = self.cf(CF_ORDERS)?;
        let payments = self.cf(CF_PAYMENTS)?;
        let transaction_ids = self.cf(CF_TRANSACTION_IDS)?;

        let mut batch = WriteBatch::default();
        for order in work.orders() {
            batch.put_cf(orders, key_of(order.id()), encode(order)?);
        }
        for payment in work.payments() {
            if let Some(transaction_id) = payment.transaction_id() {
                batch.put_cf(transaction_ids, transaction_id.as_bytes(), encode(&payment.id())?);
            }
            batch.put_cf(payments, key_of(payment.id()), encode(payment)?);
        }
        for order_id in work.deleted_orders() {
            batch.delete_cf(orders, key_of(order_id));
        }
        self.db.write(batch)?;
        Ok(())
    }
}
