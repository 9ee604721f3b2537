use super::notifier::{AlertEvent, AlertProvider};
use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::Client;
use serde_json::{Value, json};
use std::time::Duration;
use url::Url;

/// Posts alerts as JSON to a generic ops webhook (Slack-compatible `text` plus structured data).
pub(crate) struct OpsWebhookProvider {
    webhook_url: Url,
    client: Client,
}

impl OpsWebhookProvider {
    pub(crate) fn new(webhook_url: Url) -> Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(3)).build()?;

        Ok(Self {
            webhook_url,
            client,
        })
    }
}

fn summary_line(event: &AlertEvent) -> String {
    let tag = if event.reconciliation {
        "RECONCILIATION"
    } else {
        event.level.as_str()
    };
    let message = event
        .message
        .as_deref()
        .map(str::trim)
        .filter(|m| !m.is_empty())
        .unwrap_or("(no message)");

    format!(
        "[{tag}] {}/{} {}: {message}",
        event.service_name, event.environment, event.component
    )
}

fn alert_body(event: &AlertEvent) -> Value {
    json!({
        "text": summary_line(event),
        "level": event.level.as_str(),
        "reconciliation": event.reconciliation,
        "timestamp": event.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        "service": event.service_name,
        "environment": event.environment,
        "component": event.component,
        "target": event.target,
        "spans": event.span_chain,
        "fields": event.fields,
    })
}

#[async_trait]
impl AlertProvider for OpsWebhookProvider {
    async fn send(&self, event: &AlertEvent) -> Result<()> {
        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(&alert_body(event))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            bail!("ops webhook returned {status}");
        }
        Ok(())
    }

    fn provider_name(&self) -> &'static str {
        "ops_webhook"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::BTreeMap;
    use tracing::Level;

    fn event(reconciliation: bool) -> AlertEvent {
        let mut fields = BTreeMap::new();
        fields.insert("intent_id".to_string(), "pi_123".to_string());
        AlertEvent {
            level: Level::ERROR,
            reconciliation,
            timestamp: Utc::now(),
            service_name: "practice-payments".to_string(),
            environment: "prod".to_string(),
            component: "backend".to_string(),
            target: "backend::usecases::payment_lifecycle".to_string(),
            message: Some("capture persisted failed".to_string()),
            fields,
            span_chain: vec!["request".to_string()],
        }
    }

    #[test]
    fn reconciliation_items_are_tagged() {
        let body = alert_body(&event(true));
        assert_eq!(body["reconciliation"], true);
        assert!(body["text"].as_str().unwrap_or_default().starts_with("[RECONCILIATION]"));
        assert_eq!(body["fields"]["intent_id"], "pi_123");
    }

    #[test]
    fn plain_errors_use_level_tag() {
        let body = alert_body(&event(false));
        assert!(body["text"].as_str().unwrap_or_default().starts_with("[ERROR]"));
    }
}
