use std::env;
use tracing::Level;
use url::Url;

#[derive(Clone)]
pub(crate) struct ServiceContext {
    pub(crate) service_name: String,
    pub(crate) environment: String,
    pub(crate) component: String,
}

#[derive(Clone)]
pub(crate) struct OpsAlertConfig {
    pub(crate) webhook_url: Url,
    /// Events at or above this level are forwarded in addition to reconciliation items.
    pub(crate) min_level: Level,
}

#[derive(Clone)]
pub(crate) struct ObservabilityConfig {
    pub(crate) service_context: ServiceContext,
    pub(crate) ops_alert: Option<OpsAlertConfig>,
    /// Parsing problems, logged once tracing is up.
    pub(crate) warnings: Vec<String>,
}

impl ObservabilityConfig {
    pub(crate) fn from_env(component: &str) -> Self {
        let component = component.trim().to_string();

        let service_name = env_string("SERVICE_NAME")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| component.clone());

        let environment = env_string("STAGE")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "unknown".to_string());

        let (ops_alert, warnings) = ops_alert_from_values(
            env_string("OPS_ALERT_ENABLED").as_deref(),
            env_string("OPS_ALERT_WEBHOOK_URL").as_deref(),
            env_string("OPS_ALERT_LEVEL").as_deref(),
        );

        Self {
            service_context: ServiceContext {
                service_name,
                environment,
                component,
            },
            ops_alert,
            warnings,
        }
    }
}

fn ops_alert_from_values(
    enabled: Option<&str>,
    webhook_url: Option<&str>,
    level: Option<&str>,
) -> (Option<OpsAlertConfig>, Vec<String>) {
    let mut warnings = Vec::new();

    let enabled = match enabled.map(parse_bool) {
        Some(Some(value)) => value,
        Some(None) => {
            warnings.push("OPS_ALERT_ENABLED is not a boolean; treating as enabled".to_string());
            true
        }
        None => true,
    };
    if !enabled {
        return (None, warnings);
    }

    let Some(raw_url) = webhook_url.map(str::trim).filter(|v| !v.is_empty()) else {
        warnings.push(
            "OPS_ALERT_WEBHOOK_URL is not set; reconciliation items are only written to logs"
                .to_string(),
        );
        return (None, warnings);
    };

    let webhook_url = match Url::parse(raw_url) {
        Ok(url) => url,
        Err(err) => {
            // The URL embeds a secret, so only the parse error is reported.
            warnings.push(format!(
                "OPS_ALERT_WEBHOOK_URL is invalid; ops alerts disabled (parse error: {err})"
            ));
            return (None, warnings);
        }
    };

    let min_level = match level.map(str::trim).filter(|v| !v.is_empty()) {
        Some(raw) => parse_level(raw).unwrap_or_else(|| {
            warnings.push(format!(
                "OPS_ALERT_LEVEL is invalid (value: {raw}); defaulting to ERROR"
            ));
            Level::ERROR
        }),
        None => Level::ERROR,
    };

    (
        Some(OpsAlertConfig {
            webhook_url,
            min_level,
        }),
        warnings,
    )
}

fn parse_level(input: &str) -> Option<Level> {
    match input.trim().to_ascii_lowercase().as_str() {
        "error" => Some(Level::ERROR),
        "warn" | "warning" => Some(Level::WARN),
        "info" => Some(Level::INFO),
        _ => None,
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_string(key: &str) -> Option<String> {
    env::var(key).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_flag_wins_over_url() {
        let (alert, warnings) =
            ops_alert_from_values(Some("off"), Some("https://hooks.example.com/x"), None);
        assert!(alert.is_none());
        assert!(warnings.is_empty());
    }

    #[test]
    fn missing_url_is_reported_not_fatal() {
        let (alert, warnings) = ops_alert_from_values(None, None, None);
        assert!(alert.is_none());
        assert_eq!(warnings.len(), 1);
    }

    #[test]
    fn invalid_level_falls_back_to_error() {
        let (alert, warnings) =
            ops_alert_from_values(Some("true"), Some("https://hooks.example.com/x"), Some("loud"));
        let alert = alert.expect("alerts should be enabled");
        assert_eq!(alert.min_level, Level::ERROR);
        assert!(warnings[0].contains("OPS_ALERT_LEVEL"));
    }

    #[test]
    fn invalid_url_disables_alerts_without_echoing_it() {
        let (alert, warnings) = ops_alert_from_values(None, Some("not a url/secret"), None);
        assert!(alert.is_none());
        assert!(!warnings[0].contains("secret"));
    }
}
