//! Read models returned by the orchestrator.

use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{Aggregate, Money, Order, OrderStatus, PaymentStatus, ProductId, UserId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderItemView {
    pub product_id: ProductId,
    /// None when the catalog lookup failed or the product is unknown.
    pub product_name: Option<String>,
    pub quantity: u32,
    pub unit_price: Money,
    pub total_price: Money,
}

/// A hydrated order as returned to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderView {
    pub order_id: AggregateId,
    pub user_id: UserId,
    pub order_status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub total_amount: Money,
    pub items: Vec<OrderItemView>,
    pub created_at: Option<DateTime<Utc>>,
    pub closing_reason: Option<String>,
}

impl OrderView {
    /// Builds the view from a placed order. `names` is aligned with the
    /// order's items; missing entries degrade to None.
    pub(crate) fn from_order(order: &Order, names: Vec<Option<String>>) -> Option<Self> {
        let mut names = names.into_iter();
        let items = order
            .items()
            .iter()
            .map(|item| OrderItemView {
                product_id: item.product_id,
                product_name: names.next().flatten(),
                quantity: item.quantity,
                unit_price: item.unit_price,
                total_price: item.total_price(),
            })
            .collect();

        Some(Self {
            order_id: order.id()?,
            user_id: order.user_id()?,
            order_status: order.status(),
            payment_status: order.payment_status(),
            total_amount: order.total_amount(),
            items,
            created_at: order.created_at(),
            closing_reason: order.closing_reason().map(str::to_owned),
        })
    }
}
