use crate::core::errors::DConnectError;
use hmac::{Hmac, Mac};
use rand::RngCore;
use secrecy::{ExposeSecret, Secret};
use sha2::Sha256;

/// Random bytes rendered as lower-case hex.
pub fn generate_random(byte_size: usize) -> String {
    let mut bytes = vec![0u8; byte_size];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Verifies that responses come from the manager that was handed our key.
///
/// The gateway answers a request carrying `nonce` with
/// `hmac = HMAC-SHA256(key, nonce)`, both operands hex-decoded.
pub struct ResponseVerifier {
    key: Secret<String>,
}

impl std::fmt::Debug for ResponseVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResponseVerifier").finish_non_exhaustive()
    }
}

impl ResponseVerifier {
    pub fn new(hex_key: impl Into<String>) -> Self {
        Self {
            key: Secret::new(hex_key.into()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.key.expose_secret().is_empty()
    }

    pub fn expected_hmac(&self, nonce: &str) -> Result<String, DConnectError> {
        let key = hex::decode(self.key.expose_secret())
            .map_err(|e| DConnectError::InvalidParameters(format!("HMAC key is not hex: {}", e)))?;
        let message = hex::decode(nonce)
            .map_err(|e| DConnectError::InvalidParameters(format!("Nonce is not hex: {}", e)))?;

        let mut mac = Hmac::<Sha256>::new_from_slice(&key)
            .map_err(|e| DConnectError::InvalidParameters(format!("Invalid HMAC key: {}", e)))?;
        mac.update(&message);
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    /// An empty key accepts everything; a missing `hmac` is always rejected otherwise.
    pub fn check(&self, nonce: &str, hmac: Option<&str>) -> bool {
        if self.is_empty() {
            return true;
        }
        let Some(hmac) = hmac else {
            return false;
        };
        self.expected_hmac(nonce)
            .is_ok_and(|expected| expected.eq_ignore_ascii_case(hmac))
    }
}
