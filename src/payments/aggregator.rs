//! Client for the payment aggregator's collect-request API

use crate::config::PaymentGatewayConfig;
use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::provider::PaymentGateway;
use crate::payments::types::{CollectRequest, CollectRequestResponse};
use crate::payments::utils::PaymentHttpClient;
use async_trait::async_trait;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::info;

const PROVIDER: &str = "edviron";

/// Claims signed with the aggregator key and sent alongside the request as `sign`
#[derive(Debug, Serialize, Deserialize)]
struct CollectRequestClaims {
    school_id: String,
    amount: String,
    callback_url: String,
    iat: i64,
}

#[derive(Debug, Serialize)]
struct SignedCollectRequest<'a> {
    #[serde(flatten)]
    request: &'a CollectRequest,
    sign: String,
}

/// The aggregator is inconsistent about the casing of the URL field
#[derive(Debug, Deserialize)]
struct CollectRequestEnvelope {
    collect_request_id: Option<String>,
    collect_request_url: Option<String>,
    #[serde(rename = "Collect_request_url")]
    legacy_collect_request_url: Option<String>,
    sign: Option<String>,
}

impl CollectRequestEnvelope {
    fn resolve(self) -> PaymentResult<CollectRequestResponse> {
        let collect_request_id = self
            .collect_request_id
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| PaymentError::ProviderError {
                provider: PROVIDER.to_string(),
                message: "response is missing collect_request_id".to_string(),
                provider_code: None,
                retryable: false,
            })?;

        let collect_request_url = self
            .collect_request_url
            .filter(|v| !v.trim().is_empty())
            .or(self.legacy_collect_request_url)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| PaymentError::ProviderError {
                provider: PROVIDER.to_string(),
                message: "response is missing collect_request_url".to_string(),
                provider_code: None,
                retryable: false,
            })?;

        Ok(CollectRequestResponse {
            collect_request_id,
            collect_request_url,
            sign: self.sign,
        })
    }
}

pub struct AggregatorClient {
    config: PaymentGatewayConfig,
    http: PaymentHttpClient,
}

impl AggregatorClient {
    pub fn new(config: PaymentGatewayConfig) -> PaymentResult<Self> {
        let http = PaymentHttpClient::new(PROVIDER, Duration::from_secs(config.timeout_secs))?;
        Ok(Self { config, http })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn build_request(&self, school_id: &str, amount: &str) -> CollectRequest {
        CollectRequest {
            school_id: school_id.to_string(),
            amount: amount.to_string(),
            callback_url: self.config.callback_url.clone(),
        }
    }

    /// HS256 token over the request fields, keyed with the aggregator's PG key
    fn sign(&self, request: &CollectRequest) -> PaymentResult<String> {
        let claims = CollectRequestClaims {
            school_id: request.school_id.clone(),
            amount: request.amount.clone(),
            callback_url: request.callback_url.clone(),
            iat: chrono::Utc::now().timestamp(),
        };

        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.config.pg_key.as_bytes()),
        )
        .map_err(|e| PaymentError::SigningError {
            message: e.to_string(),
        })
    }
}

#[async_trait]
impl PaymentGateway for AggregatorClient {
    async fn create_collect_request(
        &self,
        school_id: &str,
        amount: &str,
    ) -> PaymentResult<CollectRequestResponse> {
        let request = self.build_request(school_id, amount);
        let sign = self.sign(&request)?;
        let body = SignedCollectRequest {
            request: &request,
            sign,
        };

        let envelope: CollectRequestEnvelope = self
            .http
            .post_json(
                &self.endpoint("/create-collect-request"),
                Some(&self.config.api_key),
                &body,
            )
            .await?;

        let response = envelope.resolve()?;
        info!(
            collect_request_id = %response.collect_request_id,
            school_id = %school_id,
            "collect request created"
        );

        Ok(response)
    }

    fn name(&self) -> &'static str {
        PROVIDER
    }
}
