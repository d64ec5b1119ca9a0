//! Placement saga step log events.

use chrono::{DateTime, Utc};
use common::AggregateId;
use domain::{DomainEvent, ProductId, UserId};
use serde::{Deserialize, Serialize};

/// Events recorded while a placement saga runs.
///
/// Each event is appended before the saga moves on, so the log always shows
/// how far a crashed saga got.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SagaEvent {
    SagaStarted(SagaStartedData),

    /// The items about to be reserved, written before any ledger call.
    ReservationRequested(ReservationRequestedData),

    ItemReserved(ItemReservedData),

    ItemReservationFailed(ItemReservationFailedData),

    /// The order record was persisted.
    OrderCreated(OrderCreatedData),

    CartCleared(CartClearedData),

    /// A forward step failed.
    StepFailed(StepFailedData),

    /// Compensation started after a step failure.
    CompensationStarted(CompensationData),

    ItemReleased(ItemReleasedData),

    /// A release could not be applied (retried out of band).
    ItemReleaseFailed(ItemReleaseFailedData),

    /// The persisted order was cancelled during compensation.
    OrderVoided(OrderVoidedData),

    SagaCompleted(SagaCompletedData),

    SagaFailed(SagaFailedData),
}

impl DomainEvent for SagaEvent {
    fn event_type(&self) -> &'static str {
        match self {
            SagaEvent::SagaStarted(_) => "SagaStarted",
            SagaEvent::ReservationRequested(_) => "ReservationRequested",
            SagaEvent::ItemReserved(_) => "ItemReserved",
            SagaEvent::ItemReservationFailed(_) => "ItemReservationFailed",
            SagaEvent::OrderCreated(_) => "OrderCreated",
            SagaEvent::CartCleared(_) => "CartCleared",
            SagaEvent::StepFailed(_) => "StepFailed",
            SagaEvent::CompensationStarted(_) => "CompensationStarted",
            SagaEvent::ItemReleased(_) => "ItemReleased",
            SagaEvent::ItemReleaseFailed(_) => "ItemReleaseFailed",
            SagaEvent::OrderVoided(_) => "OrderVoided",
            SagaEvent::SagaCompleted(_) => "SagaCompleted",
            SagaEvent::SagaFailed(_) => "SagaFailed",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaStartedData {
    pub saga_id: AggregateId,
    /// ID the order will be persisted under; also the reservation key.
    pub order_id: AggregateId,
    pub user_id: UserId,
    pub saga_type: String,
    pub started_at: DateTime<Utc>,
}

/// One line to reserve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestedItem {
    pub product_id: ProductId,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReservationRequestedData {
    pub items: Vec<RequestedItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemReservedData {
    pub product_id: ProductId,
    pub quantity: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemReservationFailedData {
    pub product_id: ProductId,
    pub error: String,
    /// False when the ledger may still have applied the reservation
    /// (timeout or transport failure).
    pub definitive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderCreatedData {
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartClearedData {
    pub cleared_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepFailedData {
    pub step_name: String,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompensationData {
    /// The step that triggered compensation.
    pub from_step: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemReleasedData {
    pub product_id: ProductId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemReleaseFailedData {
    pub product_id: ProductId,
    pub error: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderVoidedData {
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaCompletedData {
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaFailedData {
    pub reason: String,
    pub failed_at: DateTime<Utc>,
}

// Convenience constructors
impl SagaEvent {
    pub fn saga_started(
        saga_id: AggregateId,
        order_id: AggregateId,
        user_id: UserId,
        saga_type: impl Into<String>,
    ) -> Self {
        SagaEvent::SagaStarted(SagaStartedData {
            saga_id,
            order_id,
            user_id,
            saga_type: saga_type.into(),
            started_at: Utc::now(),
        })
    }

    pub fn reservation_requested(items: Vec<RequestedItem>) -> Self {
        SagaEvent::ReservationRequested(ReservationRequestedData { items })
    }

    pub fn item_reserved(product_id: ProductId, quantity: u32) -> Self {
        SagaEvent::ItemReserved(ItemReservedData {
            product_id,
            quantity,
        })
    }

    pub fn item_reservation_failed(
        product_id: ProductId,
        error: impl Into<String>,
        definitive: bool,
    ) -> Self {
        SagaEvent::ItemReservationFailed(ItemReservationFailedData {
            product_id,
            error: error.into(),
            definitive,
        })
    }

    pub fn order_created() -> Self {
        SagaEvent::OrderCreated(OrderCreatedData {
            created_at: Utc::now(),
        })
    }

    pub fn cart_cleared() -> Self {
        SagaEvent::CartCleared(CartClearedData {
            cleared_at: Utc::now(),
        })
    }

    pub fn step_failed(step_name: impl Into<String>, error: impl Into<String>) -> Self {
        SagaEvent::StepFailed(StepFailedData {
            step_name: step_name.into(),
            error: error.into(),
        })
    }

    pub fn compensation_started(from_step: impl Into<String>) -> Self {
        SagaEvent::CompensationStarted(CompensationData {
            from_step: from_step.into(),
        })
    }

    pub fn item_released(product_id: ProductId) -> Self {
        SagaEvent::ItemReleased(ItemReleasedData { product_id })
    }

    pub fn item_release_failed(product_id: ProductId, error: impl Into<String>) -> Self {
        SagaEvent::ItemReleaseFailed(ItemReleaseFailedData {
            product_id,
            error: error.into(),
        })
    }

    pub fn order_voided(reason: impl Into<String>) -> Self {
        SagaEvent::OrderVoided(OrderVoidedData {
            reason: reason.into(),
        })
    }

    pub fn saga_completed() -> Self {
        SagaEvent::SagaCompleted(SagaCompletedData {
            completed_at: Utc::now(),
        })
    }

    pub fn saga_failed(reason: impl Into<String>) -> Self {
        SagaEvent::SagaFailed(SagaFailedData {
            reason: reason.into(),
            failed_at: Utc::now(),
        })
    }
}
