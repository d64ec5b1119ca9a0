//! Payment domain events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use serde::{Deserialize, Serialize};

use crate::aggregate::DomainEvent;
use crate::order::{Money, UserId};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum PaymentEvent {
    /// A provider payment order was opened for an order.
    PaymentCreated(PaymentCreatedData),

    /// The provider's signed confirmation verified.
    PaymentSucceeded(PaymentSucceededData),

    /// Verification failed or the payment could not be completed.
    PaymentDeclined(PaymentDeclinedData),

    /// The terminal outcome has been applied to the order.
    PaymentOrderSynced(PaymentOrderSyncedData),
}

impl DomainEvent for PaymentEvent {
    fn event_type(&self) -> &'static str {
        match self {
            PaymentEvent::PaymentCreated(_) => "PaymentCreated",
            PaymentEvent::PaymentSucceeded(_) => "PaymentSucceeded",
            PaymentEvent::PaymentDeclined(_) => "PaymentDeclined",
            PaymentEvent::PaymentOrderSynced(_) => "PaymentOrderSynced",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentCreatedData {
    pub payment_id: AggregateId,
    pub order_id: AggregateId,
    pub user_id: UserId,
    pub amount: Money,
    pub currency: String,
    /// Payment order ID issued by the provider.
    pub provider_order_ref: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentSucceededData {
    pub provider_payment_ref: String,
    pub signature: String,
    pub verified_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentDeclinedData {
    pub provider_payment_ref: Option<String>,
    pub reason: String,
    pub declined_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentOrderSyncedData {
    pub synced_at: DateTime<Utc>,
}

impl PaymentEvent {
    pub fn payment_created(
        payment_id: AggregateId,
        order_id: AggregateId,
        user_id: UserId,
        amount: Money,
        currency: impl Into<String>,
        provider_order_ref: impl Into<String>,
    ) -> Self {
        PaymentEvent::PaymentCreated(PaymentCreatedData {
            payment_id,
            order_id,
            user_id,
            amount,
            currency: currency.into(),
            provider_order_ref: provider_order_ref.into(),
            created_at: Utc::now(),
        })
    }

    pub fn payment_succeeded(
        provider_payment_ref: impl Into<String>,
        signature: impl Into<String>,
    ) -> Self {
        PaymentEvent::PaymentSucceeded(PaymentSucceededData {
            provider_payment_ref: provider_payment_ref.into(),
            signature: signature.into(),
            verified_at: Utc::now(),
        })
    }

    pub fn payment_declined(provider_payment_ref: Option<String>, reason: impl Into<String>) -> Self {
        PaymentEvent::PaymentDeclined(PaymentDeclinedData {
            provider_payment_ref,
            reason: reason.into(),
            declined_at: Utc::now(),
        })
    }

    pub fn payment_order_synced() -> Self {
        PaymentEvent::PaymentOrderSynced(PaymentOrderSyncedData {
            synced_at: Utc::now(),
        })
    }
}
