use crate::payments::error::{PaymentError, PaymentResult};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::warn;

/// Thin JSON client for the aggregator. One attempt per call; failures go straight back
/// to the caller.
#[derive(Clone)]
pub struct PaymentHttpClient {
    client: Client,
    timeout: Duration,
    provider: String,
}

impl PaymentHttpClient {
    pub fn new(provider: impl Into<String>, timeout: Duration) -> PaymentResult<Self> {
        let client =
            Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| PaymentError::NetworkError {
                    message: format!("failed to initialize HTTP client: {}", e),
                })?;

        Ok(Self {
            client,
            timeout,
            provider: provider.into(),
        })
    }

    pub async fn post_json<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        url: &str,
        bearer_token: Option<&str>,
        body: &B,
    ) -> PaymentResult<T> {
        let mut request = self.client.post(url).timeout(self.timeout).json(body);
        if let Some(token) = bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                PaymentError::TimeoutError {
                    timeout_secs: self.timeout.as_secs(),
                }
            } else {
                PaymentError::NetworkError {
                    message: format!("provider request failed: {}", e),
                }
            }
        })?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();

        if status.is_success() {
            return serde_json::from_str::<T>(&text).map_err(|e| PaymentError::ProviderError {
                provider: self.provider.clone(),
                message: format!("invalid provider JSON response: {}", e),
                provider_code: None,
                retryable: false,
            });
        }

        if status.as_u16() == 429 {
            return Err(PaymentError::RateLimitError {
                message: "provider rate limit exceeded".to_string(),
                retry_after_seconds: None,
            });
        }

        warn!(
            provider = %self.provider,
            status = %status,
            "provider returned an error status"
        );

        Err(PaymentError::ProviderError {
            provider: self.provider.clone(),
            message: format!("HTTP {}: {}", status, text),
            provider_code: Some(status.as_u16().to_string()),
            retryable: status.is_server_error(),
        })
    }
}

type HmacSha256 = hmac::Hmac<sha2::Sha256>;

/// Hex-encoded HMAC-SHA256 of `payload`
pub fn sign_hmac_sha256_hex(payload: &[u8], secret: &str) -> Option<String> {
    use hmac::Mac;

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(payload);
    Some(hex::encode(mac.finalize().into_bytes()))
}

pub fn verify_hmac_sha256_hex(payload: &[u8], secret: &str, signature: &str) -> bool {
    let computed = match sign_hmac_sha256_hex(payload, secret) {
        Some(v) => v,
        None => return false,
    };
    secure_eq(
        computed.as_bytes(),
        signature.trim().to_lowercase().as_bytes(),
    )
}

pub fn secure_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0_u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secure_eq_behaves_correctly() {
        assert!(secure_eq(b"abc", b"abc"));
        assert!(!secure_eq(b"abc", b"abd"));
        assert!(!secure_eq(b"abc", b"ab"));
    }

    #[test]
    fn webhook_hmac_verification_accepts_matching_signature() {
        let payload = br#"{"order_info":{"order_id":"C1"}}"#;
        let signature = sign_hmac_sha256_hex(payload, "secret").unwrap();

        assert!(verify_hmac_sha256_hex(payload, "secret", &signature));
        assert!(verify_hmac_sha256_hex(
            payload,
            "secret",
            &signature.to_uppercase()
        ));
    }

    #[test]
    fn webhook_hmac_verification_detects_invalid_signature() {
        let payload = br#"{"order_info":{"order_id":"C1"}}"#;
        let signature = sign_hmac_sha256_hex(payload, "secret").unwrap();

        assert!(!verify_hmac_sha256_hex(payload, "other-secret", &signature));
        assert!(!verify_hmac_sha256_hex(payload, "secret", "not-a-valid-signature"));
        assert!(!verify_hmac_sha256_hex(b"{}", "secret", &signature));
    }
}
