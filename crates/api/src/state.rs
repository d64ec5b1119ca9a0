//! Shared application state.

use event_store::EventStore;
use payment::{
    InMemoryPaymentGateway, PaymentVerifier, SignatureVerifier, VerifierConfig, VerifierError,
};
use saga::{
    InMemoryCartProvider, InMemoryProductCatalog, InMemoryStockLedger, OrchestratorConfig,
    OrderOrchestrator, RetryPolicy,
};

use crate::config::Config;

pub type AppOrchestrator<S> =
    OrderOrchestrator<S, InMemoryStockLedger, InMemoryCartProvider, InMemoryProductCatalog>;

pub type AppVerifier<S> = PaymentVerifier<S, AppOrchestrator<S>, InMemoryPaymentGateway>;

/// Everything the handlers reach. The stock ledger, cart and catalog are the
/// in-process implementations; the event store is chosen at startup.
pub struct AppState<S: EventStore> {
    pub orchestrator: AppOrchestrator<S>,
    pub verifier: AppVerifier<S>,
    pub ledger: InMemoryStockLedger,
    pub carts: InMemoryCartProvider,
    pub catalog: InMemoryProductCatalog,
}

impl<S: EventStore + Clone + 'static> AppState<S> {
    pub fn new(store: S, config: &Config) -> Result<Self, VerifierError> {
        let ledger = InMemoryStockLedger::new();
        let carts = InMemoryCartProvider::new();
        let catalog = InMemoryProductCatalog::new();

        let orchestrator = OrderOrchestrator::with_config(
            store.clone(),
            ledger.clone(),
            carts.clone(),
            catalog.clone(),
            OrchestratorConfig {
                call_timeout: config.call_timeout,
                compensation_retry: RetryPolicy::new(
                    config.compensation_max_attempts,
                    config.compensation_backoff,
                ),
            },
        );

        let verifier = PaymentVerifier::new(
            store,
            orchestrator.clone(),
            InMemoryPaymentGateway::new(),
            SignatureVerifier::new(&config.payment_key_secret)?,
            VerifierConfig {
                key_id: config.payment_key_id.clone(),
                currency: config.payment_currency.clone(),
                gateway_timeout: config.call_timeout,
            },
        );

        Ok(Self {
            orchestrator,
            verifier,
            ledger,
            carts,
            catalog,
        })
    }
}
