//! Payment intents and callback verification.

use std::time::Duration;

use common::AggregateId;
use domain::{
    Aggregate, DomainError, Money, Payment, PaymentError, PaymentState, PaymentStatus,
    PaymentStore, UserId,
};
use event_store::EventStore;
use saga::{KeyedLocks, SagaError};
use serde::{Deserialize, Serialize};

use crate::error::{Result, VerifierError};
use crate::gateway::PaymentGateway;
use crate::port::OrderPort;
use crate::signature::SignatureVerifier;

#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Public key id handed to clients so they can open the provider checkout.
    pub key_id: String,
    pub currency: String,
    pub gateway_timeout: Duration,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            key_id: "test_key".to_string(),
            currency: "INR".to_string(),
            gateway_timeout: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub payment_id: AggregateId,
    pub order_id: AggregateId,
    pub user_id: UserId,
    pub provider_order_ref: String,
    pub amount: Money,
    pub currency: String,
    pub key_id: String,
}

/// Provider callback payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerifyPayment {
    pub order_id: AggregateId,
    pub provider_order_ref: String,
    pub provider_payment_ref: String,
    pub signature: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VerificationResult {
    pub order_id: AggregateId,
    pub payment_status: PaymentStatus,
    /// True when the payment was already settled and nothing was re-applied.
    pub replayed: bool,
}

fn order_payment_status(state: PaymentState) -> PaymentStatus {
    match state {
        PaymentState::Created => PaymentStatus::Pending,
        PaymentState::Paid => PaymentStatus::Paid,
        PaymentState::Failed => PaymentStatus::Failed,
    }
}

/// Opens provider payments for orders and settles them from signed
/// provider callbacks. Work on one order is serialized.
pub struct PaymentVerifier<S, O, G>
where
    S: EventStore,
{
    payments: PaymentStore<S>,
    orders: O,
    gateway: G,
    signatures: SignatureVerifier,
    config: VerifierConfig,
    locks: KeyedLocks<AggregateId>,
}

impl<S, O, G> PaymentVerifier<S, O, G>
where
    S: EventStore,
    O: OrderPort,
    G: PaymentGateway,
{
    pub fn new(
        store: S,
        orders: O,
        gateway: G,
        signatures: SignatureVerifier,
        config: VerifierConfig,
    ) -> Self {
        Self {
            payments: PaymentStore::new(store),
            orders,
            gateway,
            signatures,
            config,
            locks: KeyedLocks::new(),
        }
    }

    /// Opens a provider payment order for a PENDING order and records it
    /// locally. Asking again while the payment is still open returns the
    /// same intent.
    #[tracing::instrument(skip_all, fields(%order_id, %user_id, %amount))]
    pub async fn create_payment_intent(
        &self,
        order_id: AggregateId,
        user_id: UserId,
        amount: Money,
    ) -> Result<PaymentIntent> {
        let _guard = self.locks.lock(order_id).await;
        let order = self.orders.get_order(order_id).await?;

        if order.user_id != user_id {
            return Err(VerifierError::Validation(format!(
                "order {order_id} does not belong to user {user_id}"
            )));
        }
        if order.total_amount != amount {
            return Err(VerifierError::Validation(format!(
                "amount {amount} does not match order total {}",
                order.total_amount
            )));
        }

        if let Some(existing) = self.payments.find_by_order(order_id).await? {
            if existing.is_terminal() {
                return Err(VerifierError::AlreadyProcessed {
                    state: existing.state(),
                });
            }
            tracing::debug!("returning open payment intent");
            return self.intent(&existing);
        }

        if order.payment_status != PaymentStatus::Pending {
            return Err(VerifierError::Validation(format!(
                "order payment is already {}",
                order.payment_status
            )));
        }
        if !order.order_status.can_confirm() {
            return Err(VerifierError::Validation(format!(
                "order is {}",
                order.order_status
            )));
        }

        let receipt = format!("receipt_{order_id}");
        let provider_order = tokio::time::timeout(
            self.config.gateway_timeout,
            self.gateway
                .create_order(&receipt, amount, &self.config.currency),
        )
        .await
        .map_err(|_| VerifierError::Gateway("timed out creating provider order".into()))??;

        let payment = self
            .payments
            .create(
                order_id,
                user_id,
                amount,
                &self.config.currency,
                &provider_order.id,
            )
            .await?;

        metrics::counter!("payment_intents_total").increment(1);
        tracing::info!(provider_order_ref = %provider_order.id, "payment intent created");
        self.intent(&payment)
    }

    /// Settles the order's payment from a provider callback.
    ///
    /// A payment that is already PAID or FAILED is answered from the stored
    /// record. If its outcome never reached the order, it is pushed again.
    #[tracing::instrument(skip(self, request), fields(order_id = %request.order_id))]
    pub async fn verify_payment(&self, request: VerifyPayment) -> Result<VerificationResult> {
        let order_id = request.order_id;
        let _guard = self.locks.lock(order_id).await;

        let payment = self
            .payments
            .find_by_order(order_id)
            .await?
            .ok_or(VerifierError::PaymentNotFound(order_id))?;

        if payment.is_terminal() {
            if !payment.order_synced() {
                tracing::info!(state = %payment.state(), "re-driving unsynced payment outcome");
                self.sync_order(order_id, payment.state()).await?;
            }
            metrics::counter!("payment_verifications_total", "outcome" => "replayed").increment(1);
            return Ok(VerificationResult {
                order_id,
                payment_status: order_payment_status(payment.state()),
                replayed: true,
            });
        }

        match self.settle(&payment, &request).await {
            Ok(result) => Ok(result),
            Err(e @ (VerifierError::SignatureMismatch | VerifierError::OrderClosed { .. })) => {
                Err(e)
            }
            Err(e) => {
                tracing::error!(error = %e, "payment verification failed");
                self.fail_open_payment(order_id, &e.to_string()).await;
                metrics::counter!("payment_verifications_total", "outcome" => "error")
                    .increment(1);
                Err(e)
            }
        }
    }

    async fn settle(&self, payment: &Payment, request: &VerifyPayment) -> Result<VerificationResult> {
        let order_id = request.order_id;
        let signed = request.provider_order_ref == payment.provider_order_ref()
            && self.signatures.verify(
                &request.provider_order_ref,
                &request.provider_payment_ref,
                &request.signature,
            );

        if !signed {
            tracing::warn!(
                provider_order_ref = %request.provider_order_ref,
                "payment signature mismatch"
            );
            self.payments
                .mark_declined(
                    order_id,
                    Some(request.provider_payment_ref.clone()),
                    "signature mismatch",
                )
                .await?;
            metrics::counter!("payment_verifications_total", "outcome" => "signature_mismatch")
                .increment(1);
            if let Err(e) = self.sync_order(order_id, PaymentState::Failed).await {
                tracing::warn!(error = %e, "order not updated after signature mismatch");
            }
            return Err(VerifierError::SignatureMismatch);
        }

        // Checked before marking PAID: a closed order declines the payment.
        let order = self.orders.get_order(order_id).await?;
        let payable = match order.payment_status {
            PaymentStatus::Pending => order.order_status.can_confirm(),
            PaymentStatus::Paid => true,
            PaymentStatus::Failed => false,
        };
        if !payable {
            tracing::warn!(order_status = %order.order_status, "payment arrived for a closed order");
            self.payments
                .mark_declined(
                    order_id,
                    Some(request.provider_payment_ref.clone()),
                    &format!("order is {}", order.order_status),
                )
                .await?;
            self.payments.mark_order_synced(order_id).await?;
            metrics::counter!("payment_verifications_total", "outcome" => "order_closed")
                .increment(1);
            return Err(VerifierError::OrderClosed {
                status: order.order_status,
            });
        }

        self.payments
            .mark_succeeded(
                order_id,
                &request.provider_payment_ref,
                &request.signature,
            )
            .await?;
        self.sync_order(order_id, PaymentState::Paid).await?;

        metrics::counter!("payment_verifications_total", "outcome" => "paid").increment(1);
        tracing::info!("payment verified");
        Ok(VerificationResult {
            order_id,
            payment_status: PaymentStatus::Paid,
            replayed: false,
        })
    }

    /// Pushes a terminal payment outcome to the order and marks it synced.
    async fn sync_order(&self, order_id: AggregateId, state: PaymentState) -> Result<()> {
        let status = order_payment_status(state);
        match self.orders.update_payment_status(order_id, status).await {
            Ok(_) => {}
            // Applied before a crash that lost the synced mark.
            Err(SagaError::PaymentAlreadyProcessed { status: applied }) if applied == status => {}
            Err(e) => return Err(e.into()),
        }
        self.payments.mark_order_synced(order_id).await?;
        Ok(())
    }

    /// Drives a still-open payment to FAILED after an unexpected error.
    async fn fail_open_payment(&self, order_id: AggregateId, reason: &str) {
        let open = match self.payments.find_by_order(order_id).await {
            Ok(Some(payment)) => !payment.is_terminal(),
            Ok(None) => false,
            Err(e) => {
                tracing::error!(error = %e, "could not reload payment");
                false
            }
        };
        if !open {
            return;
        }
        if let Err(e) = self.payments.mark_declined(order_id, None, reason).await {
            tracing::error!(error = %e, "could not mark payment failed");
            return;
        }
        if let Err(e) = self.sync_order(order_id, PaymentState::Failed).await {
            tracing::warn!(error = %e, "order not updated after payment failure");
        }
    }

    fn intent(&self, payment: &Payment) -> Result<PaymentIntent> {
        let (Some(payment_id), Some(order_id), Some(user_id)) =
            (payment.id(), payment.order_id(), payment.user_id())
        else {
            return Err(VerifierError::Domain(DomainError::Payment(
                PaymentError::NotCreated,
            )));
        };
        Ok(PaymentIntent {
            payment_id,
            order_id,
            user_id,
            provider_order_ref: payment.provider_order_ref().to_owned(),
            amount: payment.amount(),
            currency: payment.currency().to_owned(),
            key_id: self.config.key_id.clone(),
        })
    }

    /// The stored payment for an order, if any.
    pub async fn payment_for_order(&self, order_id: AggregateId) -> Result<Option<Payment>> {
        Ok(self.payments.find_by_order(order_id).await?)
    }
}
