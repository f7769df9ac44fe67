use super::locks::{OrderGuard, OrderLocks};
use super::registry::GatewayRegistry;
use super::selector::{GatewayOption, GatewaySelector};
use crate::config::PaymentConfig;
use crate::domain::context::RequestContext;
use crate::domain::gateway::{ChargeOutcome, GatewayHandle, VerifyOutcome};
use crate::domain::money::Money;
use crate::domain::order::{NewOrder, Order, OrderId, OrderPatch, OrderStatus, validate_items};
use crate::domain::payment::{
    Payment, PaymentId, PaymentMethod, PaymentRequest, PaymentStatus, error_response,
};
use crate::domain::ports::{ClockHandle, OrderStoreBox, OrderStoreHandle, UnitOfWork};
use crate::error::{EngineError, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{Instrument, Span, error, info, instrument, warn};

const DEFAULT_GATEWAY_TIMEOUT: Duration = Duration::from_millis(5000);

/// The main entry point for order and payment processing.
///
/// `TransactionEngine` owns the storage backend and the gateway registry.
/// Every mutating operation runs under the per-order lock, builds a single
/// [`UnitOfWork`] and commits it at the end, so an operation either lands
/// completely or leaves the store untouched.
pub struct TransactionEngine {
    store: OrderStoreHandle,
    registry: Arc<GatewayRegistry>,
    selector: GatewaySelector,
    clock: ClockHandle,
    gateway_timeout: Duration,
    record_failed_attempts: bool,
    locks: OrderLocks,
}

impl TransactionEngine {
    /// Creates an engine paying by credit card by default, with a 5s
    /// gateway timeout.
    pub fn new(store: OrderStoreBox, registry: GatewayRegistry, clock: ClockHandle) -> Self {
        let registry = Arc::new(registry);
        Self {
            store: Arc::from(store),
            selector: GatewaySelector::new(registry.clone(), PaymentMethod::CreditCard),
            registry,
            clock,
            gateway_timeout: DEFAULT_GATEWAY_TIMEOUT,
            record_failed_attempts: false,
            locks: OrderLocks::new(),
        }
    }

    pub fn from_config(
        store: OrderStoreBox,
        registry: GatewayRegistry,
        config: &PaymentConfig,
        clock: ClockHandle,
    ) -> Self {
        Self::new(store, registry, clock)
            .with_default_method(config.default_method)
            .with_gateway_timeout(config.gateway_timeout())
            .with_failed_attempts_recorded(config.record_failed_attempts)
    }

    pub fn with_default_method(mut self, method: PaymentMethod) -> Self {
        self.selector = GatewaySelector::new(self.registry.clone(), method);
        self
    }

    pub fn with_gateway_timeout(mut self, timeout: Duration) -> Self {
        self.gateway_timeout = timeout;
        self
    }

    /// Keeps declined and timed-out attempts as `failed` payments. Off by
    /// default: a failed attempt then leaves no trace in the store.
    pub fn with_failed_attempts_recorded(mut self, record: bool) -> Self {
        self.record_failed_attempts = record;
        self
    }

    async fn owned_order(&self, ctx: &RequestContext, order_id: OrderId) -> Result<Order> {
        self.store
            .get_order(order_id)
            .await?
            .filter(|order| order.user_id() == ctx.user_id)
            .ok_or_else(|| EngineError::NotFound(format!("Order {order_id}")))
    }

    async fn owned_payment(&self, ctx: &RequestContext, payment_id: PaymentId) -> Result<Payment> {
        let payment = self
            .store
            .get_payment(payment_id)
            .await?
            .ok_or_else(|| EngineError::NotFound(format!("Payment {payment_id}")))?;
        // Payments of someone else's order are as invisible as the order.
        match self.owned_order(ctx, payment.order_id()).await {
            Ok(_) => Ok(payment),
            Err(EngineError::NotFound(_)) => {
                Err(EngineError::NotFound(format!("Payment {payment_id}")))
            }
            Err(e) => Err(e),
        }
    }

    async fn has_successful_payment(&self, order_id: OrderId) -> Result<bool> {
        Ok(self
            .store
            .payments_for_order(order_id)
            .await?
            .iter()
            .any(Payment::is_successful))
    }

    // --- Orders ---

    #[instrument(skip(self, ctx, input), fields(user = ctx.user_id))]
    pub async fn create_order(&self, ctx: &RequestContext, input: NewOrder) -> Result<Order> {
        let items = validate_items(input.items)?;
        let order = Order::create(
            ctx.user_id,
            input.customer,
            items,
            input.notes,
            self.clock.now(),
        )?;
        self.store
            .commit(UnitOfWork::new().save_order(order.clone()))
            .await?;
        info!(order_id = %order.id(), total = %order.total(), "order created");
        Ok(order)
    }

    /// Applies a partial update. Items are replaced wholesale and the total
    /// recomputed. A status value outside the known set is ignored; a known
    /// status whose guard fails rejects the whole update.
    #[instrument(skip(self, ctx, patch), fields(user = ctx.user_id))]
    pub async fn update_order(
        &self,
        ctx: &RequestContext,
        order_id: OrderId,
        patch: OrderPatch,
    ) -> Result<Order> {
        let _guard = self.locks.acquire(order_id).await;
        let mut order = self.owned_order(ctx, order_id).await?;
        if !order.can_be_updated() {
            return Err(EngineError::InvalidTransition(format!(
                "Order cannot be updated in status {}",
                order.status()
            )));
        }

        let now = self.clock.now();
        order.apply_details(&patch, now)?;
        if let Some(items) = patch.items {
            order.replace_items(validate_items(items)?, now)?;
        }
        if let Some(raw) = patch.status.as_deref() {
            match raw.parse::<OrderStatus>() {
                Ok(target) => {
                    let has_successful = self.has_successful_payment(order_id).await?;
                    order.transition_to(target, has_successful, now)?;
                }
                Err(_) => warn!(%order_id, status = raw, "ignoring unknown order status"),
            }
        }

        self.store
            .commit(UnitOfWork::new().save_order(order.clone()))
            .await?;
        info!(%order_id, status = %order.status(), total = %order.total(), "order updated");
        Ok(order)
    }

    async fn move_order(
        &self,
        ctx: &RequestContext,
        order_id: OrderId,
        target: OrderStatus,
    ) -> Result<Order> {
        let _guard = self.locks.acquire(order_id).await;
        let mut order = self.owned_order(ctx, order_id).await?;
        let has_successful = self.has_successful_payment(order_id).await?;
        order.transition_to(target, has_successful, self.clock.now())?;
        self.store
            .commit(UnitOfWork::new().save_order(order.clone()))
            .await?;
        info!(%order_id, status = %target, "order status changed");
        Ok(order)
    }

    #[instrument(skip(self, ctx), fields(user = ctx.user_id))]
    pub async fn confirm_order(&self, ctx: &RequestContext, order_id: OrderId) -> Result<Order> {
        self.move_order(ctx, order_id, OrderStatus::Confirmed).await
    }

    #[instrument(skip(self, ctx), fields(user = ctx.user_id))]
    pub async fn cancel_order(&self, ctx: &RequestContext, order_id: OrderId) -> Result<Order> {
        self.move_order(ctx, order_id, OrderStatus::Cancelled).await
    }

    #[instrument(skip(self, ctx), fields(user = ctx.user_id))]
    pub async fn complete_order(&self, ctx: &RequestContext, order_id: OrderId) -> Result<Order> {
        self.move_order(ctx, order_id, OrderStatus::Completed).await
    }

    /// Removes an order that never had a payment attempt.
    #[instrument(skip(self, ctx), fields(user = ctx.user_id))]
    pub async fn delete_order(&self, ctx: &RequestContext, order_id: OrderId) -> Result<()> {
        {
            let _guard = self.locks.acquire(order_id).await;
            self.owned_order(ctx, order_id).await?;
            if !self.store.payments_for_order(order_id).await?.is_empty() {
                return Err(EngineError::Conflict(
                    "Cannot delete order with existing payments".to_string(),
                ));
            }
            self.store
                .commit(UnitOfWork::new().delete_order(order_id))
                .await?;
        }
        info!(%order_id, "order deleted");
        Ok(())
    }

    // --- Payments ---

    /// Charges a confirmed order for its full total.
    ///
    /// The order lock is held across the gateway call, so concurrent attempts
    /// on one order run one after another and only the first can see the
    /// order as payable. The gateway call and the commit run in their own
    /// task: a caller that stops waiting does not cancel a charge already in
    /// flight, and the lock is held until its outcome is stored.
    #[instrument(
        skip(self, ctx, request),
        fields(user = ctx.user_id, order_id = %request.order_id, method = %request.method)
    )]
    pub async fn process_payment(
        &self,
        ctx: &RequestContext,
        request: PaymentRequest,
    ) -> Result<Payment> {
        let PaymentRequest {
            order_id,
            method,
            amount,
            details,
        } = request;

        let guard = self.locks.acquire(order_id).await;
        let order = self.owned_order(ctx, order_id).await?;
        if !order.can_be_paid() {
            return Err(EngineError::InvalidTransition(format!(
                "Order must be confirmed. Current: {}",
                order.status()
            )));
        }
        if order.total() != amount {
            return Err(EngineError::AmountMismatch {
                expected: order.total(),
                actual: amount,
            });
        }

        let gateway = self.registry.gateway(method)?;
        if !self
            .registry
            .availability(method)
            .is_some_and(|availability| availability.enabled)
        {
            return Err(EngineError::NoGatewayAvailable(format!(
                "Gateway '{method}' is disabled"
            )));
        }

        let now = self.clock.now();
        let mut payment = Payment::open(&order, method, details, now)?;
        payment.begin_processing(now)?;

        let attempt = ChargeAttempt {
            store: self.store.clone(),
            clock: self.clock.clone(),
            gateway,
            timeout: self.gateway_timeout,
            record_failure: self.record_failed_attempts,
            _guard: guard,
        };
        tokio::spawn(attempt.run(order, payment).instrument(Span::current()))
            .await
            .map_err(|e| EngineError::Internal(format!("Payment task failed: {e}")))?
    }

    /// Returns a successful payment's money. On any failure the payment
    /// stays successful.
    #[instrument(skip(self, ctx), fields(user = ctx.user_id))]
    pub async fn refund_payment(
        &self,
        ctx: &RequestContext,
        payment_id: PaymentId,
    ) -> Result<Payment> {
        let order_id = self.owned_payment(ctx, payment_id).await?.order_id();
        let _guard = self.locks.acquire(order_id).await;
        // Re-read under the lock; a concurrent refund may have won.
        let mut payment = self.owned_payment(ctx, payment_id).await?;
        if payment.status() != PaymentStatus::Successful {
            return Err(EngineError::InvalidTransition(format!(
                "Only successful payments can be refunded. Current: {}",
                payment.status()
            )));
        }

        let method = payment.method();
        let gateway = self.registry.gateway(method)?;
        let outcome = tokio::time::timeout(self.gateway_timeout, gateway.refund(&payment))
            .await
            .map_err(|_| EngineError::GatewayTimeout {
                method,
                after: self.gateway_timeout,
                payment_id: Some(payment_id),
            })??;
        if !outcome.success {
            let reason = outcome.error().unwrap_or("Refund failed").to_string();
            warn!(%payment_id, reason = %reason, "refund rejected");
            return Err(EngineError::PaymentDeclined {
                method,
                reason,
                payment_id: Some(payment_id),
            });
        }

        payment.mark_refunded(outcome.refund_id, outcome.gateway_response, self.clock.now())?;
        if let Err(e) = self
            .store
            .commit(UnitOfWork::new().save_payment(payment.clone()))
            .await
        {
            error!(%payment_id, error = %e, "refund accepted but commit failed");
            return Err(e);
        }
        info!(%payment_id, "payment refunded");
        Ok(payment)
    }

    /// Asks the gateway for the current state of a settled payment. Nothing
    /// is written.
    #[instrument(skip(self, ctx), fields(user = ctx.user_id))]
    pub async fn verify_payment(
        &self,
        ctx: &RequestContext,
        payment_id: PaymentId,
    ) -> Result<VerifyOutcome> {
        let payment = self.owned_payment(ctx, payment_id).await?;
        let transaction_id = payment.transaction_id().ok_or_else(|| {
            EngineError::PreconditionFailed("Payment has no transaction ID".to_string())
        })?;
        let method = payment.method();
        let gateway = self.registry.gateway(method)?;
        tokio::time::timeout(self.gateway_timeout, gateway.verify(transaction_id))
            .await
            .map_err(|_| EngineError::GatewayTimeout {
                method,
                after: self.gateway_timeout,
                payment_id: Some(payment_id),
            })
    }

    // --- Reads ---

    pub async fn get_order(&self, ctx: &RequestContext, order_id: OrderId) -> Result<Order> {
        self.owned_order(ctx, order_id).await
    }

    pub async fn get_payment(&self, ctx: &RequestContext, payment_id: PaymentId) -> Result<Payment> {
        self.owned_payment(ctx, payment_id).await
    }

    /// Payments of an order, newest first.
    pub async fn order_payments(
        &self,
        ctx: &RequestContext,
        order_id: OrderId,
    ) -> Result<Vec<Payment>> {
        self.owned_order(ctx, order_id).await?;
        let mut payments = self.store.payments_for_order(order_id).await?;
        payments.reverse();
        Ok(payments)
    }

    pub async fn list_orders(&self, ctx: &RequestContext) -> Result<Vec<Order>> {
        Ok(self
            .store
            .orders()
            .await?
            .into_iter()
            .filter(|order| order.user_id() == ctx.user_id)
            .collect())
    }

    // --- Gateway selection ---

    pub fn available_gateways(&self, amount: Money) -> Vec<GatewayOption> {
        self.selector.available_gateways(amount)
    }

    pub async fn select_gateway(
        &self,
        ctx: &RequestContext,
        order_id: OrderId,
        preferred: Option<PaymentMethod>,
    ) -> Result<PaymentMethod> {
        let order = self.owned_order(ctx, order_id).await?;
        self.selector.select(order.total(), preferred)
    }

    /// The caller's most used method among successful payments, if still
    /// available.
    pub async fn recommend_gateway(&self, ctx: &RequestContext) -> Result<Option<PaymentMethod>> {
        let history = self.store.successful_methods(ctx.user_id).await?;
        Ok(self.selector.recommend(&history))
    }

    /// Every stored order and payment, oldest first.
    pub async fn snapshot(&self) -> Result<(Vec<Order>, Vec<Payment>)> {
        Ok((self.store.orders().await?, self.store.payments().await?))
    }
}

/// One gateway call and the bookkeeping of its outcome. Owns everything it
/// touches, the order lock included, so it can outlive the caller.
struct ChargeAttempt {
    store: OrderStoreHandle,
    clock: ClockHandle,
    gateway: GatewayHandle,
    timeout: Duration,
    record_failure: bool,
    _guard: OrderGuard,
}

impl ChargeAttempt {
    async fn run(self, mut order: Order, mut payment: Payment) -> Result<Payment> {
        let method = payment.method();
        let outcome = tokio::time::timeout(self.timeout, self.gateway.process(&payment)).await;
        let now = self.clock.now();
        match outcome {
            Ok(ChargeOutcome {
                success: true,
                transaction_id: Some(transaction_id),
                gateway_response,
            }) => {
                payment.mark_successful(transaction_id, gateway_response, now)?;
                order.mark_paid(now)?;
                let work = UnitOfWork::new()
                    .save_order(order)
                    .save_payment(payment.clone());
                if let Err(e) = self.store.commit(work).await {
                    error!(
                        payment_id = %payment.id(),
                        transaction_id = payment.transaction_id().unwrap_or_default(),
                        error = %e,
                        "charge approved but commit failed"
                    );
                    return Err(e);
                }
                info!(
                    payment_id = %payment.id(),
                    transaction_id = payment.transaction_id().unwrap_or_default(),
                    "payment successful"
                );
                Ok(payment)
            }
            Ok(outcome) => {
                let reason = match outcome.error() {
                    Some(error) => error.to_string(),
                    None if outcome.success => "Gateway returned no transaction ID".to_string(),
                    None => "Payment declined".to_string(),
                };
                let response = if outcome.gateway_response.get("error").is_some() {
                    outcome.gateway_response
                } else {
                    error_response(reason.clone())
                };
                payment.mark_failed(response, now)?;
                warn!(payment_id = %payment.id(), reason = %reason, "payment declined");
                Err(EngineError::PaymentDeclined {
                    method,
                    reason,
                    payment_id: self.record(payment).await?,
                })
            }
            Err(_elapsed) => {
                let after = self.timeout;
                payment.mark_failed(
                    error_response(format!("Gateway timed out after {}ms", after.as_millis())),
                    now,
                )?;
                warn!(payment_id = %payment.id(), timeout_ms = after.as_millis() as u64, "gateway timed out");
                Err(EngineError::GatewayTimeout {
                    method,
                    after,
                    payment_id: self.record(payment).await?,
                })
            }
        }
    }

    /// Stores a failed attempt when failures are recorded.
    async fn record(&self, payment: Payment) -> Result<Option<PaymentId>> {
        if !self.record_failure {
            return Ok(None);
        }
        let payment_id = payment.id();
        self.store
            .commit(UnitOfWork::new().save_payment(payment))
            .await?;
        Ok(Some(payment_id))
    }
}
