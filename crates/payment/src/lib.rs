//! Payment verification for placed orders.
//!
//! A client first asks for a payment intent, which opens a payment order at
//! the provider and records a local payment in CREATED. The provider's
//! signed callback is then checked with HMAC-SHA256; the outcome settles the
//! local payment and is pushed to the order through [`OrderPort`], which
//! confirms or releases the order's stock reservations.
//!
//! Settled payments are never re-applied: repeated callbacks are answered
//! from the stored record.

pub mod error;
pub mod gateway;
pub mod port;
pub mod signature;
pub mod verifier;

pub use error::{Result, VerifierError};
pub use gateway::{InMemoryPaymentGateway, PaymentGateway, ProviderOrder};
pub use port::OrderPort;
pub use signature::SignatureVerifier;
pub use verifier::{
    PaymentIntent, PaymentVerifier, VerificationResult, VerifierConfig, VerifyPayment,
};
