use crate::payments::error::PaymentResult;
use crate::payments::types::CollectRequestResponse;
use async_trait::async_trait;

/// Aggregator capable of opening a collect request for a school fee
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_collect_request(
        &self,
        school_id: &str,
        amount: &str,
    ) -> PaymentResult<CollectRequestResponse>;

    fn name(&self) -> &'static str;
}
