use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::value_objects::enums::notification_events::NotificationEvent;

/// Outbound user notifications (email). Callers treat failures as non-fatal.
#[automock]
#[async_trait]
pub trait NotificationDispatcher {
    async fn notify(
        &self,
        user_id: Uuid,
        event: NotificationEvent,
        payload: serde_json::Value,
    ) -> Result<()>;
}
