mod config;
mod layer;
mod notifier;
mod ops_webhook;

use anyhow::Result;
use config::ObservabilityConfig;
use layer::AlertLayer;
use notifier::AlertNotifier;
use ops_webhook::OpsWebhookProvider;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

/// Field name that marks an event as a reconciliation item: money moved at the processor
/// but the local record could not be updated. Such events are always forwarded to the ops
/// webhook, whatever their level.
pub const RECONCILIATION_FIELD: &str = "reconciliation";

pub fn init_observability(component: &str) -> Result<()> {
    let config = ObservabilityConfig::from_env(component);

    let alert_layer = match config.ops_alert.as_ref() {
        Some(alert) => {
            let provider = OpsWebhookProvider::new(alert.webhook_url.clone())?;
            let notifier = AlertNotifier::new(vec![Arc::new(provider)]);
            Some(AlertLayer::new(
                notifier,
                config.service_context.clone(),
                alert.min_level,
            ))
        }
        None => None,
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    // Local time so `TZ=America/New_York` shows the practice's offset in logs.
    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_timer(tracing_subscriber::fmt::time::ChronoLocal::rfc_3339());

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(alert_layer)
        .with(env_filter)
        .try_init()?;

    for warning in &config.warnings {
        warn!(
            service = %config.service_context.service_name,
            environment = %config.service_context.environment,
            component = %config.service_context.component,
            warning = %warning,
            "observability: config warning"
        );
    }

    info!(
        service = %config.service_context.service_name,
        environment = %config.service_context.environment,
        component = %config.service_context.component,
        ops_alerts = config.ops_alert.is_some(),
        "observability: initialized"
    );

    Ok(())
}
