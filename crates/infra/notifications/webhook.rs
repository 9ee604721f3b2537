use std::time::Duration;

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Serialize;
use tracing::{debug, info};
use url::Url;
use uuid::Uuid;

use crate::domain::{
    repositories::notifications::NotificationDispatcher,
    value_objects::enums::notification_events::NotificationEvent,
};

/// Posts notification events as JSON to the mailer service webhook.
pub struct WebhookNotificationDispatcher {
    client: Client,
    webhook_url: Url,
}

#[derive(Debug, Serialize)]
struct NotificationBody<'a> {
    user_id: Uuid,
    event: NotificationEvent,
    occurred_at: DateTime<Utc>,
    payload: &'a serde_json::Value,
}

impl WebhookNotificationDispatcher {
    pub fn new(webhook_url: Url, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            webhook_url,
        })
    }
}

#[async_trait]
impl NotificationDispatcher for WebhookNotificationDispatcher {
    async fn notify(
        &self,
        user_id: Uuid,
        event: NotificationEvent,
        payload: serde_json::Value,
    ) -> Result<()> {
        let body = NotificationBody {
            user_id,
            event,
            occurred_at: Utc::now(),
            payload: &payload,
        };

        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(&body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    anyhow!("notification webhook timed out")
                } else {
                    anyhow!("notification webhook request failed: {err}")
                }
            })?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "notification webhook returned non-success status: {}",
                response.status()
            ));
        }

        debug!(%user_id, event = %event, "notifications: delivered");
        Ok(())
    }
}

/// Used when no webhook is configured: events are only logged.
pub struct LogOnlyNotificationDispatcher;

#[async_trait]
impl NotificationDispatcher for LogOnlyNotificationDispatcher {
    async fn notify(
        &self,
        user_id: Uuid,
        event: NotificationEvent,
        payload: serde_json::Value,
    ) -> Result<()> {
        info!(%user_id, event = %event, payload = %payload, "notifications: webhook disabled; event logged only");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn body_serializes_event_in_snake_case() {
        let payload = json!({ "appointment_id": "a1" });
        let body = NotificationBody {
            user_id: Uuid::nil(),
            event: NotificationEvent::NoShowRecorded,
            occurred_at: Utc::now(),
            payload: &payload,
        };

        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["event"], "no_show_recorded");
        assert_eq!(value["payload"]["appointment_id"], "a1");
        assert_eq!(value["user_id"], Uuid::nil().to_string());
    }
}
