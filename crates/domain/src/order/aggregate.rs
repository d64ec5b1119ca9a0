//! Order aggregate implementation.

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::Version;

use crate::aggregate::Aggregate;

use super::{
    Money, OrderError, OrderEvent, OrderItem, OrderStatus, PaymentStatus, ProductId, UserId,
    events::OrderPlacedData, quantities_by_product,
};

/// Order aggregate root.
///
/// Holds the two coupled state machines of an order: its lifecycle status
/// and its payment sub-state. The payment sub-state gates exactly one
/// lifecycle edge (`Created → Confirmed` or `Created → Cancelled`).
#[derive(Debug, Clone, Default)]
pub struct Order {
    id: Option<AggregateId>,
    version: Version,
    user_id: Option<UserId>,
    status: OrderStatus,
    payment_status: PaymentStatus,
    items: Vec<OrderItem>,
    total_amount: Money,
    created_at: Option<DateTime<Utc>>,
    /// Why the order was cancelled or its payment failed.
    closing_reason: Option<String>,
}

impl Aggregate for Order {
    type Event = OrderEvent;
    type Error = OrderError;

    fn aggregate_type() -> &'static str {
        "Order"
    }

    fn id(&self) -> Option<AggregateId> {
        self.id
    }

    fn version(&self) -> Version {
        self.version
    }

    fn set_version(&mut self, version: Version) {
        self.version = version;
    }

    fn apply(&mut self, event: Self::Event) {
        match event {
            OrderEvent::OrderPlaced(data) => self.apply_order_placed(data),
            OrderEvent::PaymentConfirmed(_) => {
                self.payment_status = PaymentStatus::Paid;
                self.status = OrderStatus::Confirmed;
            }
            OrderEvent::PaymentFailed(data) => {
                self.payment_status = PaymentStatus::Failed;
                self.status = OrderStatus::Cancelled;
                self.closing_reason = Some(data.reason);
            }
            OrderEvent::OrderCancelled(data) => {
                self.status = OrderStatus::Cancelled;
                self.closing_reason = Some(data.reason);
            }
            OrderEvent::OrderShipped(_) => self.status = OrderStatus::Shipped,
            OrderEvent::OrderDelivered(_) => self.status = OrderStatus::Delivered,
        }
    }
}

// Query methods
impl Order {
    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn payment_status(&self) -> PaymentStatus {
        self.payment_status
    }

    /// Lines in the order they were placed.
    pub fn items(&self) -> &[OrderItem] {
        &self.items
    }

    /// Units held in the stock ledger per product. Lines of one product at
    /// different prices share a reservation.
    pub fn reserved_quantities(&self) -> Vec<(ProductId, u32)> {
        // `place` rejects item sets whose sums overflow.
        quantities_by_product(&self.items).unwrap_or_default()
    }

    pub fn total_amount(&self) -> Money {
        self.total_amount
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }

    pub fn closing_reason(&self) -> Option<&str> {
        self.closing_reason.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

// Command methods (return events)
impl Order {
    /// Records a new order with stock already reserved for every line.
    pub fn place(
        &self,
        order_id: AggregateId,
        user_id: UserId,
        items: Vec<OrderItem>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        if self.id.is_some() {
            return Err(OrderError::AlreadyPlaced);
        }
        if items.is_empty() {
            return Err(OrderError::NoItems);
        }
        for item in &items {
            if item.quantity == 0 {
                return Err(OrderError::InvalidQuantity {
                    product_id: item.product_id,
                    quantity: item.quantity,
                });
            }
            if !item.unit_price.is_positive() {
                return Err(OrderError::InvalidPrice {
                    product_id: item.product_id,
                    price: item.unit_price.cents(),
                });
            }
        }

        quantities_by_product(&items)?;

        let total = items
            .iter()
            .try_fold(Money::zero(), |total, item| {
                item.unit_price
                    .checked_multiply(item.quantity)
                    .and_then(|line| total.checked_add(line))
            })
            .ok_or(OrderError::AmountOverflow)?;
        Ok(vec![OrderEvent::order_placed(
            order_id, user_id, items, total,
        )])
    }

    /// Marks payment as received and confirms the order.
    pub fn confirm_payment(&self) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_payment_pending(OrderStatus::Confirmed)?;
        Ok(vec![OrderEvent::payment_confirmed()])
    }

    /// Marks payment as failed and cancels the order.
    pub fn fail_payment(&self, reason: impl Into<String>) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_payment_pending(OrderStatus::Cancelled)?;
        Ok(vec![OrderEvent::payment_failed(reason)])
    }

    /// Cancels an unpaid order.
    pub fn cancel(
        &self,
        reason: impl Into<String>,
        cancelled_by: Option<String>,
    ) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_placed()?;
        if !self.status.can_cancel() || self.payment_status != PaymentStatus::Pending {
            return Err(OrderError::InvalidStateTransition {
                from: self.status,
                to: OrderStatus::Cancelled,
            });
        }

        Ok(vec![OrderEvent::order_cancelled(reason, cancelled_by)])
    }

    /// Moves a confirmed order along the fulfilment path.
    pub fn advance_status(&self, target: OrderStatus) -> Result<Vec<OrderEvent>, OrderError> {
        self.ensure_placed()?;
        if !self.status.can_advance_to(target) {
            return Err(OrderError::InvalidStateTransition {
                from: self.status,
                to: target,
            });
        }

        Ok(match target {
            OrderStatus::Shipped => vec![OrderEvent::order_shipped()],
            _ => vec![OrderEvent::order_delivered()],
        })
    }

    fn ensure_placed(&self) -> Result<(), OrderError> {
        if self.id.is_none() {
            return Err(OrderError::NotPlaced);
        }
        Ok(())
    }

    fn ensure_payment_pending(&self, target: OrderStatus) -> Result<(), OrderError> {
        self.ensure_placed()?;
        if self.payment_status.is_settled() {
            return Err(OrderError::PaymentAlreadyProcessed {
                status: self.payment_status,
            });
        }
        if !self.status.can_confirm() {
            return Err(OrderError::InvalidStateTransition {
                from: self.status,
                to: target,
            });
        }
        Ok(())
    }

    fn apply_order_placed(&mut self, data: OrderPlacedData) {
        self.id = Some(data.order_id);
        self.user_id = Some(data.user_id);
        self.items = data.items;
        self.total_amount = data.total_amount;
        self.created_at = Some(data.placed_at);
        self.status = OrderStatus::Created;
        self.payment_status = PaymentStatus::Pending;
    }
}
