//! Request signing for the exchange API.
//!
//! Every authenticated request carries three headers: the API key id, the
//! millisecond timestamp used in the signature, and a base64 RSA-PSS
//! signature over `timestamp + METHOD + path` (SHA-256, 32-byte salt).

use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use rsa::pkcs1::DecodeRsaPrivateKey;
use rsa::pkcs8::DecodePrivateKey;
use rsa::pss::SigningKey;
use rsa::signature::{RandomizedSigner, SignatureEncoding};
use rsa::RsaPrivateKey;
use sha2::Sha256;

use super::error::ExchangeError;

pub const HEADER_KEY: &str = "KALSHI-ACCESS-KEY";
pub const HEADER_TIMESTAMP: &str = "KALSHI-ACCESS-TIMESTAMP";
pub const HEADER_SIGNATURE: &str = "KALSHI-ACCESS-SIGNATURE";

/// API credentials: key id plus the parsed RSA private key.
#[derive(Clone)]
pub struct Credentials {
    api_key: String,
    private_key: RsaPrivateKey,
}

impl Credentials {
    /// Parse a PEM private key. Both PKCS#1 ("BEGIN RSA PRIVATE KEY") and
    /// PKCS#8 ("BEGIN PRIVATE KEY") encodings are accepted.
    pub fn from_pem(api_key: impl Into<String>, pem: &str) -> Result<Self, ExchangeError> {
        let private_key = if pem.contains("BEGIN RSA PRIVATE KEY") {
            RsaPrivateKey::from_pkcs1_pem(pem)
                .map_err(|e| ExchangeError::Auth(format!("pkcs1 parse: {}", e)))?
        } else {
            RsaPrivateKey::from_pkcs8_pem(pem)
                .map_err(|e| ExchangeError::Auth(format!("pkcs8 parse: {}", e)))?
        };
        Ok(Self { api_key: api_key.into(), private_key })
    }

    pub fn from_pem_file(api_key: impl Into<String>, path: &str) -> Result<Self, ExchangeError> {
        let pem = std::fs::read_to_string(path)?;
        Self::from_pem(api_key, &pem)
    }

    pub fn api_key(&self) -> &str {
        &self.api_key
    }

    /// Base64 RSA-PSS signature over `{timestamp_ms}{method}{path}`.
    /// The path is the URL path only — query strings are not signed.
    pub fn sign(&self, method: &str, path: &str, timestamp_ms: i64) -> Result<String, ExchangeError> {
        let message = format!("{}{}{}", timestamp_ms, method, path);
        let signing_key = SigningKey::<Sha256>::new_with_salt_len(self.private_key.clone(), 32);
        let mut rng = rand::thread_rng();
        let signature = signing_key.sign_with_rng(&mut rng, message.as_bytes());
        Ok(BASE64.encode(signature.to_bytes()))
    }

    /// (key, timestamp, signature) header values for one request.
    pub fn auth_headers(
        &self,
        method: &str,
        path: &str,
    ) -> Result<(String, String, String), ExchangeError> {
        let timestamp_ms = chrono::Utc::now().timestamp_millis();
        let signature = self.sign(method, path, timestamp_ms)?;
        Ok((self.api_key.clone(), timestamp_ms.to_string(), signature))
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print key material
        f.debug_struct("Credentials").field("api_key", &self.api_key).finish()
    }
}
