use crate::domain::order::OrderId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockTable = Arc<Mutex<HashMap<OrderId, Arc<AsyncMutex<()>>>>>;

/// One async mutex per order.
///
/// Holding the guard is the engine's equivalent of a row lock on the order:
/// status checks, the gateway call and the commit all happen under it.
/// Entries nobody holds or waits for are dropped when the last guard goes.
#[derive(Default)]
pub struct OrderLocks {
    locks: LockTable,
}

/// Exclusive access to one order. Owned, so it can move into a spawned task.
pub struct OrderGuard {
    order_id: OrderId,
    guard: Option<OwnedMutexGuard<()>>,
    locks: LockTable,
}

impl OrderLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, order_id: OrderId) -> OrderGuard {
        let lock = {
            let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
            locks.entry(order_id).or_default().clone()
        };
        OrderGuard {
            order_id,
            guard: Some(lock.lock_owned().await),
            locks: self.locks.clone(),
        }
    }

    /// Number of orders with a live lock entry.
    pub fn len(&self) -> usize {
        self.locks.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Drop for OrderGuard {
    fn drop(&mut self) {
        // Release first so the guard's own handle is not counted.
        self.guard.take();
        let mut locks = self.locks.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(lock) = locks.get(&self.order_id)
            && Arc::strong_count(lock) == 1
        {
            locks.remove(&self.order_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_same_order_serializes() {
        let locks = Arc::new(OrderLocks::new());
        let order_id = OrderId::new();

        let guard = locks.acquire(order_id).await;
        let contender = {
            let locks = locks.clone();
            tokio::spawn(async move {
                locks.acquire(order_id).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        tokio::time::timeout(Duration::from_secs(1), contender)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_different_orders_are_independent() {
        let locks = OrderLocks::new();
        let _first = locks.acquire(OrderId::new()).await;
        let second = tokio::time::timeout(Duration::from_millis(100), locks.acquire(OrderId::new())).await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn test_released_entries_are_pruned() {
        let locks = Arc::new(OrderLocks::new());
        let order_id = OrderId::new();

        let guard = locks.acquire(order_id).await;
        let waiter = {
            let locks = locks.clone();
            tokio::spawn(async move {
                let _guard = locks.acquire(order_id).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        // A waiter still references the entry, so it survives the release.
        drop(guard);
        waiter.await.unwrap();
        assert!(locks.is_empty());

        for _ in 0..100 {
            drop(locks.acquire(OrderId::new()).await);
        }
        assert!(locks.is_empty());
    }
}
