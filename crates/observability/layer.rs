use super::RECONCILIATION_FIELD;
use super::config::ServiceContext;
use super::notifier::{AlertEvent, AlertNotifier};
use chrono::Utc;
use std::collections::BTreeMap;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::Layer;
use tracing_subscriber::layer::Context;
use tracing_subscriber::registry::LookupSpan;

/// Forwards reconciliation items, and anything at least as severe as `min_level`,
/// to the ops alert queue.
#[derive(Clone)]
pub(crate) struct AlertLayer {
    notifier: AlertNotifier,
    service_context: ServiceContext,
    min_level: Level,
}

impl AlertLayer {
    pub(crate) fn new(
        notifier: AlertNotifier,
        service_context: ServiceContext,
        min_level: Level,
    ) -> Self {
        Self {
            notifier,
            service_context,
            min_level,
        }
    }
}

#[derive(Default)]
struct EventFields {
    values: BTreeMap<String, String>,
}

impl EventFields {
    fn insert(&mut self, field: &Field, value: String) {
        self.values
            .insert(field.name().to_string(), redact(field.name(), value));
    }

    fn is_reconciliation(&self) -> bool {
        self.values
            .get(RECONCILIATION_FIELD)
            .is_some_and(|v| v == "true")
    }
}

impl Visit for EventFields {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.insert(field, format!("{value:?}"));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, value.to_string());
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, value.to_string());
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, value.to_string());
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, value.to_string());
    }
}

impl<S> Layer<S> for AlertLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let level = *event.metadata().level();

        let mut fields = EventFields::default();
        event.record(&mut fields);

        let reconciliation = fields.is_reconciliation();
        // tracing orders levels by verbosity, so "more severe" is "less than".
        if !reconciliation && level > self.min_level {
            return;
        }

        let message = fields
            .values
            .remove("message")
            .map(|raw| unquote_debug_string(&raw));

        let span_chain = ctx
            .event_span(event)
            .map(|span| {
                span.scope()
                    .from_root()
                    .map(|s| s.metadata().name().to_string())
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        self.notifier.try_notify(AlertEvent {
            level,
            reconciliation,
            timestamp: Utc::now(),
            service_name: self.service_context.service_name.clone(),
            environment: self.service_context.environment.clone(),
            component: self.service_context.component.clone(),
            target: event.metadata().target().to_string(),
            message,
            fields: fields.values,
            span_chain,
        });
    }
}

fn unquote_debug_string(input: &str) -> String {
    let trimmed = input.trim();
    trimmed
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(trimmed)
        .to_string()
}

fn redact(field_name: &str, value: String) -> String {
    if is_sensitive_key(field_name) {
        return "[REDACTED]".to_string();
    }
    value
}

fn is_sensitive_key(field_name: &str) -> bool {
    let field = field_name.to_ascii_lowercase();
    ["webhook", "secret", "token", "authorization", "api_key", "card"]
        .iter()
        .any(|needle| field.contains(needle))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sensitive_fields_are_redacted() {
        assert_eq!(redact("stripe_secret_key", "sk_live_1".into()), "[REDACTED]");
        assert_eq!(redact("Authorization", "Bearer x".into()), "[REDACTED]");
        assert_eq!(redact("intent_id", "pi_123".into()), "pi_123");
    }

    #[test]
    fn debug_quotes_are_stripped_from_messages() {
        assert_eq!(unquote_debug_string("\"capture failed\""), "capture failed");
        assert_eq!(unquote_debug_string("plain"), "plain");
        assert_eq!(unquote_debug_string("\""), "\"");
    }

    #[test]
    fn error_is_more_severe_than_warn() {
        assert!(Level::ERROR < Level::WARN);
    }
}
