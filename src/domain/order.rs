use super::money::Money;
use crate::error::{EngineError, Result};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identifier of the user owning an order.
pub type UserId = u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(Uuid);

impl OrderId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for OrderId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for OrderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for OrderId {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| EngineError::Validation(format!("Invalid order id '{s}': {e}")))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Paid,
    Cancelled,
    Completed,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        Self::Pending,
        Self::Confirmed,
        Self::Paid,
        Self::Cancelled,
        Self::Completed,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Paid => "paid",
            Self::Cancelled => "cancelled",
            Self::Completed => "completed",
        }
    }

    pub const fn label(&self) -> &'static str {
        match self {
            Self::Pending => "Pending",
            Self::Confirmed => "Confirmed",
            Self::Paid => "Paid",
            Self::Cancelled => "Cancelled",
            Self::Completed => "Completed",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| EngineError::Validation(format!("Unknown order status '{s}'")))
    }
}

/// Customer contact fields copied onto the order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Customer {
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
}

impl Customer {
    fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(EngineError::Validation(
                "Customer name is required".to_string(),
            ));
        }
        if !self.email.contains('@') {
            return Err(EngineError::Validation(format!(
                "Invalid customer email '{}'",
                self.email
            )));
        }
        Ok(())
    }
}

/// A line item as supplied by the caller, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewOrderItem {
    pub product_name: String,
    pub quantity: i64,
    pub price: Decimal,
}

impl NewOrderItem {
    pub fn new(product_name: impl Into<String>, quantity: i64, price: Decimal) -> Self {
        Self {
            product_name: product_name.into(),
            quantity,
            price,
        }
    }
}

/// A validated line item. The subtotal is always derived, never supplied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderItem {
    product_name: String,
    quantity: u32,
    price: Money,
    subtotal: Money,
}

impl OrderItem {
    pub fn product_name(&self) -> &str {
        &self.product_name
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn price(&self) -> Money {
        self.price
    }

    pub fn subtotal(&self) -> Money {
        self.subtotal
    }
}

impl TryFrom<NewOrderItem> for OrderItem {
    type Error = EngineError;

    fn try_from(item: NewOrderItem) -> Result<Self> {
        if item.product_name.trim().is_empty() {
            return Err(EngineError::Validation(
                "Product name is required".to_string(),
            ));
        }
        let quantity = u32::try_from(item.quantity)
            .ok()
            .filter(|q| *q > 0)
            .ok_or_else(|| {
                EngineError::Validation(format!(
                    "Quantity for '{}' must be a positive integer, got {}",
                    item.product_name, item.quantity
                ))
            })?;
        let price = Money::new(item.price)?;
        Ok(Self {
            product_name: item.product_name,
            quantity,
            price,
            subtotal: price.times(quantity)?,
        })
    }
}

/// Sum of `quantity * price` over the given items.
pub fn total_of(items: &[OrderItem]) -> Result<Money> {
    items.iter().try_fold(Money::ZERO, |total, item| {
        total.checked_add(item.price.times(item.quantity)?)
    })
}

/// Validates a caller-supplied item list. Empty lists are rejected.
pub fn validate_items(items: Vec<NewOrderItem>) -> Result<Vec<OrderItem>> {
    if items.is_empty() {
        return Err(EngineError::Validation(
            "An order needs at least one item".to_string(),
        ));
    }
    items.into_iter().map(OrderItem::try_from).collect()
}

/// Input for creating an order.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub customer: Customer,
    pub items: Vec<NewOrderItem>,
    pub notes: Option<String>,
}

/// Partial update of an order. `None` leaves a field untouched.
#[derive(Debug, Clone, Default)]
pub struct OrderPatch {
    pub customer_name: Option<String>,
    pub customer_email: Option<String>,
    pub customer_phone: Option<String>,
    pub notes: Option<String>,
    /// Replaces the whole item list when present.
    pub items: Option<Vec<NewOrderItem>>,
    /// Raw status value; values outside [`OrderStatus`] are ignored.
    pub status: Option<String>,
}

/// The order aggregate.
///
/// Fields are private: every mutation goes through the engine, which keeps
/// the total in step with the items and checks status guards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    user_id: UserId,
    customer: Customer,
    items: Vec<OrderItem>,
    total: Money,
    status: OrderStatus,
    notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl Order {
    pub(crate) fn create(
        user_id: UserId,
        customer: Customer,
        items: Vec<OrderItem>,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        customer.validate()?;
        if items.is_empty() {
            return Err(EngineError::Validation(
                "An order needs at least one item".to_string(),
            ));
        }
        Ok(Self {
            id: OrderId::new(),
            user_id,
            customer,
            total: total_of(&items)?,
            items,
            status: OrderStatus::Pending,
            notes,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn id(&self) -> OrderId {
        self.id
    }

    pub fn user_id(&self) -> UserId {
        self.user_id
    }

    pub fn customer(&self) -> &Customer {
        &self.customer
    }

    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    pub fn total(&self) -> Money {
        self.total
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn notes(&self) -> Option<&str> {
        self.notes.as_deref()
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    pub fn can_be_paid(&self) -> bool {
        self.status == OrderStatus::Confirmed
    }

    pub fn can_be_updated(&self) -> bool {
        matches!(self.status, OrderStatus::Pending | OrderStatus::Confirmed)
    }

    /// Applies the customer and notes fields of a patch.
    pub(crate) fn apply_details(&mut self, patch: &OrderPatch, now: DateTime<Utc>) -> Result<()> {
        let mut customer = self.customer.clone();
        if let Some(name) = &patch.customer_name {
            customer.name = name.clone();
        }
        if let Some(email) = &patch.customer_email {
            customer.email = email.clone();
        }
        if let Some(phone) = &patch.customer_phone {
            customer.phone = Some(phone.clone());
        }
        customer.validate()?;
        self.customer = customer;
        if let Some(notes) = &patch.notes {
            self.notes = Some(notes.clone());
        }
        self.updated_at = now;
        Ok(())
    }

    /// Swaps the item list wholesale and recomputes the total.
    pub(crate) fn replace_items(&mut self, items: Vec<OrderItem>, now: DateTime<Utc>) -> Result<()> {
        if !self.can_be_updated() {
            return Err(EngineError::InvalidTransition(format!(
                "Items of a {} order cannot change",
                self.status
            )));
        }
        self.total = total_of(&items)?;
        self.items = items;
        self.updated_at = now;
        Ok(())
    }

    /// Moves the order to `target` if the lifecycle allows it.
    ///
    /// `has_successful_payment` feeds the cancellation guard. Reaching `paid`
    /// is only possible through [`Order::mark_paid`].
    pub(crate) fn transition_to(
        &mut self,
        target: OrderStatus,
        has_successful_payment: bool,
        now: DateTime<Utc>,
    ) -> Result<()> {
        use OrderStatus::*;

        if self.status == target {
            return Ok(());
        }
        let allowed = match (self.status, target) {
            (Pending, Confirmed) => true,
            (Pending | Confirmed, Cancelled) => {
                if has_successful_payment {
                    return Err(EngineError::InvalidTransition(
                        "Cannot cancel order with successful payments".to_string(),
                    ));
                }
                true
            }
            (Paid, Completed) => true,
            _ => false,
        };
        if !allowed {
            return Err(EngineError::InvalidTransition(format!(
                "Order cannot move from {} to {}",
                self.status, target
            )));
        }
        self.status = target;
        self.updated_at = now;
        Ok(())
    }

    pub(crate) fn mark_paid(&mut self, now: DateTime<Utc>) -> Result<()> {
        if !self.can_be_paid() {
            return Err(EngineError::InvalidTransition(format!(
                "Order must be confirmed. Current: {}",
                self.status
            )));
        }
        self.status = OrderStatus::Paid;
        self.updated_at = now;
        Ok(())
    }
}
