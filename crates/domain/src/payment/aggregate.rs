use std::fmt;

use chrono::{DateTime, Utc};
use common::AggregateId;
use event_store::Version;
use serde::{Deserialize, Serialize};

use crate::aggregate::Aggregate;
use crate::order::{Money, UserId};

use super::{PaymentError, PaymentEvent, events::PaymentCreatedData};

/// Lifecycle of a local payment record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentState {
    #[default]
    Created,
    Paid,
    Failed,
}

impl PaymentState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, PaymentState::Paid | PaymentState::Failed)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentState::Created => "CREATED",
            PaymentState::Paid => "PAID",
            PaymentState::Failed => "FAILED",
        }
    }
}

impl fmt::Display for PaymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payment aggregate root.
///
/// Moves into PAID or FAILED exactly once. `order_synced` tracks whether the
/// terminal outcome has also been applied to the order, so a crash between
/// the two writes can be detected and re-driven.
#[derive(Debug, Clone, Default)]
pub struct Payment {
    id: Option<AggregateId>,
    version: Version,
    order_id: Option<AggregateId>,
    user_id: Option<UserId>,
    amount: Money,
    currency: String,
    provider_order_ref: String,
    provider_payment_ref: Option<String>,
    signature: Option<String>,
    state: PaymentState,
    failure_reason: Option<String>,
    order_synced: bool,
    created_at: Option<DateTime<Utc>>,
}

impl Aggregate for Payment {
    type Event = PaymentEvent;
    type Error = PaymentError;

    fn aggregate_type() -> &'static str {
        "Payment"
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
            PaymentEvent::PaymentCreated(data) => self.apply_created(data),
            PaymentEvent::PaymentSucceeded(data) => {
                self.state = PaymentState::Paid;
                self.provider_payment_ref = Some(data.provider_payment_ref);
                self.signature = Some(data.signature);
            }
            PaymentEvent::PaymentDeclined(data) => {
                self.state = PaymentState::Failed;
                self.provider_payment_ref = data.provider_payment_ref;
                self.failure_reason = Some(data.reason);
            }
            PaymentEvent::PaymentOrderSynced(_) => self.order_synced = true,
        }
    }
}

impl Payment {
    pub fn order_id(&self) -> Option<AggregateId> {
        self.order_id
    }

    pub fn user_id(&self) -> Option<UserId> {
        self.user_id
    }

    pub fn amount(&self) -> Money {
        self.amount
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn provider_order_ref(&self) -> &str {
        &self.provider_order_ref
    }

    pub fn provider_payment_ref(&self) -> Option<&str> {
        self.provider_payment_ref.as_deref()
    }

    pub fn signature(&self) -> Option<&str> {
        self.signature.as_deref()
    }

    pub fn state(&self) -> PaymentState {
        self.state
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }

    /// True once the terminal state has been pushed to the order.
    pub fn order_synced(&self) -> bool {
        self.order_synced
    }

    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        self.created_at
    }
}

impl Payment {
    pub fn create(
        &self,
        payment_id: AggregateId,
        order_id: AggregateId,
        user_id: UserId,
        amount: Money,
        currency: &str,
        provider_order_ref: &str,
    ) -> Result<Vec<PaymentEvent>, PaymentError> {
        if self.id.is_some() {
            return Err(PaymentError::AlreadyCreated);
        }
        Ok(vec![PaymentEvent::payment_created(
            payment_id,
            order_id,
            user_id,
            amount,
            currency,
            provider_order_ref,
        )])
    }

    pub fn succeed(
        &self,
        provider_payment_ref: &str,
        signature: &str,
    ) -> Result<Vec<PaymentEvent>, PaymentError> {
        self.ensure_open()?;
        Ok(vec![PaymentEvent::payment_succeeded(
            provider_payment_ref,
            signature,
        )])
    }

    pub fn decline(
        &self,
        provider_payment_ref: Option<String>,
        reason: &str,
    ) -> Result<Vec<PaymentEvent>, PaymentError> {
        self.ensure_open()?;
        Ok(vec![PaymentEvent::payment_declined(
            provider_payment_ref,
            reason,
        )])
    }

    /// Records that the order saw the terminal outcome. Repeats are no-ops.
    pub fn mark_order_synced(&self) -> Result<Vec<PaymentEvent>, PaymentError> {
        if self.id.is_none() {
            return Err(PaymentError::NotCreated);
        }
        if !self.state.is_terminal() {
            return Err(PaymentError::NotTerminal { state: self.state });
        }
        if self.order_synced {
            return Ok(vec![]);
        }
        Ok(vec![PaymentEvent::payment_order_synced()])
    }

    fn ensure_open(&self) -> Result<(), PaymentError> {
        if self.id.is_none() {
            return Err(PaymentError::NotCreated);
        }
        if self.state.is_terminal() {
            return Err(PaymentError::AlreadyTerminal { state: self.state });
        }
        Ok(())
    }

    fn apply_created(&mut self, data: PaymentCreatedData) {
        self.id = Some(data.payment_id);
        self.order_id = Some(data.order_id);
        self.user_id = Some(data.user_id);
        self.amount = data.amount;
        self.currency = data.currency;
        self.provider_order_ref = data.provider_order_ref;
        self.created_at = Some(data.created_at);
        self.state = PaymentState::Created;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn created() -> Payment {
        let mut payment = Payment::default();
        let order_id = AggregateId::new();
        let events = payment
            .create(
                order_id.derive("payment"),
                order_id,
                UserId::new(3),
                Money::from_cents(12000),
                "INR",
                "order_0001",
            )
            .unwrap();
        payment.apply_events(events);
        payment
    }

    #[test]
    fn create_holds_provider_reference() {
        let payment = created();
        assert_eq!(payment.state(), PaymentState::Created);
        assert_eq!(payment.provider_order_ref(), "order_0001");
        assert_eq!(payment.amount(), Money::from_cents(12000));
        assert!(!payment.is_terminal());
    }

    #[test]
    fn terminal_state_is_reached_once() {
        let mut payment = created();
        let events = payment.succeed("pay_1", "abc").unwrap();
        payment.apply_events(events);

        assert_eq!(payment.state(), PaymentState::Paid);
        assert_eq!(payment.provider_payment_ref(), Some("pay_1"));
        assert!(matches!(
            payment.decline(None, "late"),
            Err(PaymentError::AlreadyTerminal {
                state: PaymentState::Paid
            })
        ));
        assert!(matches!(
            payment.succeed("pay_1", "abc"),
            Err(PaymentError::AlreadyTerminal { .. })
        ));
    }

    #[test]
    fn order_sync_requires_terminal_state_and_is_idempotent() {
        let mut payment = created();
        assert!(matches!(
            payment.mark_order_synced(),
            Err(PaymentError::NotTerminal { .. })
        ));

        let events = payment.decline(Some("pay_9".into()), "bad signature").unwrap();
        payment.apply_events(events);
        let events = payment.mark_order_synced().unwrap();
        assert_eq!(events.len(), 1);
        payment.apply_events(events);

        assert!(payment.order_synced());
        assert_eq!(payment.failure_reason(), Some("bad signature"));
        assert!(payment.mark_order_synced().unwrap().is_empty());
    }

    #[test]
    fn commands_before_create_fail() {
        let payment = Payment::default();
        assert!(matches!(
            payment.succeed("p", "s"),
            Err(PaymentError::NotCreated)
        ));
        assert!(matches!(
            created().create(
                AggregateId::new(),
                AggregateId::new(),
                UserId::new(1),
                Money::from_cents(1),
                "INR",
                "x"
            ),
            Err(PaymentError::AlreadyCreated)
        ));
    }
}
