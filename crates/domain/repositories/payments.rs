use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::payments::{InsertPaymentEntity, PaymentEntity, PaymentTransition},
    value_objects::enums::{payment_statuses::PaymentStatus, payment_types::PaymentType},
};

#[automock]
#[async_trait]
pub trait PaymentRepository {
    /// Inserts a pending payment. Returns `None` when a row with the same
    /// `(appointment_id, payment_type, idempotency_key)` already exists, or when another
    /// `pending`, `authorized` or `charged` row of the same type is open for the appointment.
    async fn insert_pending(&self, payment: InsertPaymentEntity) -> Result<Option<PaymentEntity>>;

    async fn list_by_appointment(&self, appointment_id: Uuid) -> Result<Vec<PaymentEntity>>;

    /// Number of `failed` rows of `payment_type` for the appointment. Callers observing the
    /// same count derive the same claim key, so only one attempt can be open at a time.
    async fn count_failed_attempts(&self, appointment_id: Uuid, payment_type: PaymentType) -> Result<i64>;

    async fn attach_intent(&self, payment_id: Uuid, provider_intent_id: String) -> Result<()>;

    /// Applies `transition` only if the row is still in `from`. Returns whether it changed.
    async fn apply_transition(
        &self,
        payment_id: Uuid,
        from: PaymentStatus,
        transition: PaymentTransition,
    ) -> Result<bool>;
}
