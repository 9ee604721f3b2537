use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::value_objects::payment_intents::{CreateIntentRequest, ProcessorIntent};

/// Card processor boundary. Every call is one blocking round trip bounded by the client
/// timeout; a timeout is reported as an error. Implementations forward `idempotency_key`
/// so that retries never move money twice.
#[automock]
#[async_trait]
pub trait PaymentGateway {
    async fn create_intent(&self, request: CreateIntentRequest) -> Result<ProcessorIntent>;

    async fn confirm_intent(&self, intent_id: &str, idempotency_key: &str) -> Result<ProcessorIntent>;

    async fn capture_intent(&self, intent_id: &str, idempotency_key: &str) -> Result<ProcessorIntent>;

    /// Refunds the full charge, or `amount_minor` of it. Returns the amount the processor
    /// actually refunded.
    async fn refund_intent(
        &self,
        intent_id: &str,
        amount_minor: Option<i64>,
        idempotency_key: &str,
    ) -> Result<i64>;

    /// Releases an uncaptured authorization.
    async fn cancel_intent(&self, intent_id: &str, idempotency_key: &str) -> Result<ProcessorIntent>;
}
