use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::payment_methods::{InsertPaymentMethodEntity, PaymentMethodEntity};

#[automock]
#[async_trait]
pub trait PaymentMethodRepository {
    /// Default method first, then by creation time and id.
    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<PaymentMethodEntity>>;

    async fn find_default(&self, user_id: Uuid) -> Result<Option<PaymentMethodEntity>>;

    /// Inserts a method. It becomes the default when `make_default` is set or when it is the
    /// user's first method; any previous default is unset in the same transaction.
    async fn insert(
        &self,
        payment_method: InsertPaymentMethodEntity,
        make_default: bool,
    ) -> Result<PaymentMethodEntity>;

    /// Makes `method_id` the only default for the user, atomically. Returns `false` when the
    /// method does not belong to the user.
    async fn set_default(&self, user_id: Uuid, method_id: Uuid) -> Result<bool>;
}
