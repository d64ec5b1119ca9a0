//! Provider callback signatures.
//!
//! The provider signs `"{provider_order_ref}|{provider_payment_ref}"` with
//! HMAC-SHA256 under the shared key secret and sends the lowercase hex digest.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::error::{Result, VerifierError};

type HmacSha256 = Hmac<Sha256>;

#[derive(Clone)]
pub struct SignatureVerifier {
    mac: HmacSha256,
}

impl std::fmt::Debug for SignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SignatureVerifier").finish_non_exhaustive()
    }
}

impl SignatureVerifier {
    pub fn new(secret: impl AsRef<[u8]>) -> Result<Self> {
        let secret = secret.as_ref();
        if secret.is_empty() {
            return Err(VerifierError::Validation(
                "payment key secret must not be empty".into(),
            ));
        }
        let mac = HmacSha256::new_from_slice(secret)
            .map_err(|e| VerifierError::Validation(format!("invalid payment key secret: {e}")))?;
        Ok(Self { mac })
    }

    fn keyed(&self, provider_order_ref: &str, provider_payment_ref: &str) -> HmacSha256 {
        let mut mac = self.mac.clone();
        mac.update(provider_order_ref.as_bytes());
        mac.update(b"|");
        mac.update(provider_payment_ref.as_bytes());
        mac
    }

    /// Hex signature the provider would send for this pair.
    pub fn sign(&self, provider_order_ref: &str, provider_payment_ref: &str) -> String {
        hex::encode(
            self.keyed(provider_order_ref, provider_payment_ref)
                .finalize()
                .into_bytes(),
        )
    }

    /// Constant-time check of a hex signature. Malformed hex never matches.
    pub fn verify(&self, provider_order_ref: &str, provider_payment_ref: &str, signature: &str) -> bool {
        let Ok(bytes) = hex::decode(signature.trim()) else {
            return false;
        };
        self.keyed(provider_order_ref, provider_payment_ref)
            .verify_slice(&bytes)
            .is_ok()
    }
}
