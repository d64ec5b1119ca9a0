//! Saga instance aggregate.

use common::AggregateId;
use domain::{Aggregate, ProductId, UserId};
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::error::SagaError;
use crate::events::{RequestedItem, SagaEvent};
use crate::placement;
use crate::state::SagaState;

/// Where a single line stands with respect to the stock ledger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemProgress {
    /// Reserve requested, outcome not yet recorded.
    Requested,
    Reserved,
    /// The ledger refused the reservation; nothing is held.
    Refused,
    /// The reserve call failed in a way that may still have applied.
    Indeterminate,
    Released,
    /// Release attempted and failed; still held.
    ReleaseFailed,
}

impl ItemProgress {
    fn may_hold_stock(&self) -> bool {
        !matches!(self, ItemProgress::Refused | ItemProgress::Released)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SagaItem {
    pub product_id: ProductId,
    pub quantity: u32,
    pub progress: ItemProgress,
    pub last_error: Option<String>,
}

/// An event-sourced placement saga.
///
/// The event log is the persisted step log: replaying it tells the recovery
/// sweep which lines may still hold stock and whether the order and cart
/// steps ran.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SagaInstance {
    id: Option<AggregateId>,
    version: Version,
    saga_type: String,
    order_id: Option<AggregateId>,
    user_id: Option<UserId>,
    state: SagaState,
    items: Vec<SagaItem>,
    order_created: bool,
    cart_cleared: bool,
    order_voided: bool,
    failed_step: Option<String>,
    failure_reason: Option<String>,
}

impl Aggregate for SagaInstance {
    type Event = SagaEvent;
    type Error = SagaError;

    fn aggregate_type() -> &'static str {
        "OrderPlacementSaga"
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
            SagaEvent::SagaStarted(data) => {
                self.id = Some(data.saga_id);
                self.order_id = Some(data.order_id);
                self.user_id = Some(data.user_id);
                self.saga_type = data.saga_type;
                self.state = SagaState::Running;
            }
            SagaEvent::ReservationRequested(data) => {
                self.items = data
                    .items
                    .into_iter()
                    .map(|item| SagaItem {
                        product_id: item.product_id,
                        quantity: item.quantity,
                        progress: ItemProgress::Requested,
                        last_error: None,
                    })
                    .collect();
            }
            SagaEvent::ItemReserved(data) => {
                self.set_progress(data.product_id, ItemProgress::Reserved, None);
            }
            SagaEvent::ItemReservationFailed(data) => {
                let progress = if data.definitive {
                    ItemProgress::Refused
                } else {
                    ItemProgress::Indeterminate
                };
                self.set_progress(data.product_id, progress, Some(data.error));
            }
            SagaEvent::OrderCreated(_) => self.order_created = true,
            SagaEvent::CartCleared(_) => self.cart_cleared = true,
            SagaEvent::StepFailed(data) => {
                self.failed_step = Some(data.step_name);
                self.failure_reason = Some(data.error);
            }
            SagaEvent::CompensationStarted(_) => {
                self.state = SagaState::Compensating;
            }
            SagaEvent::ItemReleased(data) => {
                self.set_progress(data.product_id, ItemProgress::Released, None);
            }
            SagaEvent::ItemReleaseFailed(data) => {
                self.set_progress(data.product_id, ItemProgress::ReleaseFailed, Some(data.error));
            }
            SagaEvent::OrderVoided(_) => self.order_voided = true,
            SagaEvent::SagaCompleted(_) => {
                self.state = SagaState::Completed;
            }
            SagaEvent::SagaFailed(data) => {
                self.state = SagaState::Failed;
                self.failure_reason = Some(data.reason);
            }
        }
    }
}

// Query methods
impl SagaInstance {
    pub fn state(&self) -> SagaState {
        self.state
    }

    pub fn order_id(&self) -> Option<AggregateId> {
        self.order_id
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn saga_type(&self) -> &str {
        &self.saga_type
    }

    pub fn items(&self) -> &[SagaItem] {
        &self.items
    }

    pub fn item(&self, product_id: ProductId) -> Option<&SagaItem> {
        self.items.iter().find(|i| i.product_id == product_id)
    }

    pub fn order_created(&self) -> bool {
        self.order_created
    }

    pub fn cart_cleared(&self) -> bool {
        self.cart_cleared
    }

    pub fn order_voided(&self) -> bool {
        self.order_voided
    }

    pub fn failed_step(&self) -> Option<&str> {
        self.failed_step.as_deref()
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    /// Last forward step that finished.
    pub fn last_completed_step(&self) -> Option<&'static str> {
        if self.cart_cleared {
            Some(placement::STEP_CLEAR_CART)
        } else if self.order_created {
            Some(placement::STEP_CREATE_ORDER)
        } else if !self.items.is_empty()
            && self
                .items
                .iter()
                .all(|i| i.progress == ItemProgress::Reserved)
        {
            Some(placement::STEP_RESERVE_STOCK)
        } else {
            None
        }
    }

    /// Lines that may still hold stock for this order.
    ///
    /// Only meaningful once compensation has started; a completed saga's
    /// reservations belong to the order and settle through payment.
    pub fn pending_releases(&self) -> Vec<RequestedItem> {
        self.items
            .iter()
            .filter(|i| i.progress.may_hold_stock())
            .map(|i| RequestedItem {
                product_id: i.product_id,
                quantity: i.quantity,
            })
            .collect()
    }

    /// Compensation ran but left stock held: an outstanding compensation failure.
    pub fn has_compensation_failure(&self) -> bool {
        matches!(self.state, SagaState::Compensating | SagaState::Failed)
            && !self.pending_releases().is_empty()
    }

    fn set_progress(&mut self, product_id: ProductId, progress: ItemProgress, error: Option<String>) {
        if let Some(item) = self.items.iter_mut().find(|i| i.product_id == product_id) {
            item.progress = progress;
            if error.is_some() {
                item.last_error = error;
            }
        }
    }
}
