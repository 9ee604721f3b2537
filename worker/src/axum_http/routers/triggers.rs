use std::sync::Arc;

use axum::{
    Json, Router,
    extract::State,
    http::{HeaderMap, StatusCode, header::AUTHORIZATION},
    response::{IntoResponse, Response},
    routing::post,
};
use backend::usecases::{
    no_show::NoShowUseCase,
    payment_lifecycle::{MAX_CAPTURE_LEAD_HOURS, PaymentLifecycleUseCase, capture_lead_time},
};
use chrono::Duration;
use practice_payments::domain::value_objects::no_show::{MAX_WINDOW_MINUTES, NoShowPolicy};
use serde::Deserialize;
use tracing::{error, warn};

use crate::config::config_model::DotEnvyConfig;

// Run example
//   curl -X POST "http://localhost:$SERVER_PORT_WORKER/internal/v1/no-shows/scan" \
//     -H "Authorization: Bearer $INTERNAL_TRIGGER_TOKEN" \
//     -H "Content-Type: application/json" \
//     -d '{"window_minutes":15,"auto_process":false}'

#[derive(Clone)]
pub struct TriggerRouteState {
    config: Arc<DotEnvyConfig>,
    no_shows: Arc<NoShowUseCase>,
    payments: Arc<PaymentLifecycleUseCase>,
}

pub fn routes(
    config: Arc<DotEnvyConfig>,
    no_shows: Arc<NoShowUseCase>,
    payments: Arc<PaymentLifecycleUseCase>,
) -> Router {
    Router::new()
        .route("/no-shows/scan", post(run_no_show_scan))
        .route("/captures/run", post(run_capture_sweep))
        .with_state(TriggerRouteState {
            config,
            no_shows,
            payments,
        })
}

#[derive(Debug, Default, Deserialize)]
pub struct NoShowScanRequest {
    pub window_minutes: Option<i64>,
    pub fee_amount: Option<f64>,
    pub auto_process: Option<bool>,
}

impl NoShowScanRequest {
    fn policy(self, base: NoShowPolicy) -> Result<NoShowPolicy, String> {
        let policy = NoShowPolicy {
            window_minutes: self.window_minutes.unwrap_or(base.window_minutes),
            fee_amount: self.fee_amount.unwrap_or(base.fee_amount),
            auto_process: self.auto_process.unwrap_or(base.auto_process),
        };
        if !policy.window_in_range() {
            return Err(format!(
                "window_minutes must be between 0 and {MAX_WINDOW_MINUTES}"
            ));
        }
        Ok(policy)
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct CaptureRunRequest {
    pub lead_hours: Option<i64>,
}

impl CaptureRunRequest {
    fn lead_time(&self, default_hours: i64) -> Result<Duration, String> {
        capture_lead_time(self.lead_hours.unwrap_or(default_hours))
            .ok_or_else(|| format!("lead_hours must be between 0 and {MAX_CAPTURE_LEAD_HOURS}"))
    }
}

pub async fn run_no_show_scan(
    State(state): State<TriggerRouteState>,
    headers: HeaderMap,
    payload: Option<Json<NoShowScanRequest>>,
) -> Response {
    if let Err(rejection) = check_trigger_token(&state.config, &headers) {
        return rejection;
    }

    let Json(payload) = payload.unwrap_or_default();
    let policy = match payload.policy(state.config.policies.no_show) {
        Ok(policy) => policy,
        Err(reason) => return (StatusCode::BAD_REQUEST, reason).into_response(),
    };

    match state.no_shows.scan_and_process(policy).await {
        Ok(result) => Json(result).into_response(),
        Err(err) => {
            error!(error = ?err, "triggers: no-show scan failed");
            (err.status_code(), err.public_message()).into_response()
        }
    }
}

pub async fn run_capture_sweep(
    State(state): State<TriggerRouteState>,
    headers: HeaderMap,
    payload: Option<Json<CaptureRunRequest>>,
) -> Response {
    if let Err(rejection) = check_trigger_token(&state.config, &headers) {
        return rejection;
    }

    let Json(payload) = payload.unwrap_or_default();
    let lead_time = match payload.lead_time(state.config.policies.capture_lead_hours) {
        Ok(lead_time) => lead_time,
        Err(reason) => return (StatusCode::BAD_REQUEST, reason).into_response(),
    };

    match state.payments.capture_due(lead_time).await {
        Ok(result) => Json(result).into_response(),
        Err(err) => {
            error!(error = ?err, "triggers: capture sweep failed");
            (err.status_code(), err.public_message()).into_response()
        }
    }
}

fn check_trigger_token(config: &DotEnvyConfig, headers: &HeaderMap) -> Result<(), Response> {
    let Some(expected) = config.triggers.internal_token.as_deref() else {
        return Err((
            StatusCode::SERVICE_UNAVAILABLE,
            "trigger token is not configured",
        )
            .into_response());
    };

    authorize_bearer(headers, expected).map_err(|status| {
        warn!("triggers: rejected request with missing or wrong token");
        (status, "unauthorized").into_response()
    })
}

fn authorize_bearer(headers: &HeaderMap, expected_token: &str) -> Result<(), StatusCode> {
    let token = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .ok_or(StatusCode::UNAUTHORIZED)?;

    if token == expected_token {
        Ok(())
    } else {
        Err(StatusCode::UNAUTHORIZED)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn bearer_token_must_match() {
        assert!(authorize_bearer(&headers("Bearer s3cret"), "s3cret").is_ok());
        assert_eq!(
            authorize_bearer(&headers("Bearer other"), "s3cret"),
            Err(StatusCode::UNAUTHORIZED)
        );
        assert_eq!(
            authorize_bearer(&headers("s3cret"), "s3cret"),
            Err(StatusCode::UNAUTHORIZED)
        );
        assert_eq!(
            authorize_bearer(&HeaderMap::new(), "s3cret"),
            Err(StatusCode::UNAUTHORIZED)
        );
    }

    #[test]
    fn scan_request_keeps_configured_policy_when_empty() {
        let policy = NoShowScanRequest::default()
            .policy(NoShowPolicy::default())
            .unwrap();
        assert_eq!(policy, NoShowPolicy::default());
    }

    #[test]
    fn scan_request_rejects_windows_out_of_range() {
        for window_minutes in [-5, MAX_WINDOW_MINUTES + 1, i64::MAX] {
            let request = NoShowScanRequest {
                window_minutes: Some(window_minutes),
                ..Default::default()
            };
            assert!(request.policy(NoShowPolicy::default()).is_err(), "{window_minutes}");
        }
    }

    #[test]
    fn capture_request_bounds_lead_hours() {
        let request = CaptureRunRequest::default();
        assert_eq!(request.lead_time(24), Ok(Duration::hours(24)));

        for lead_hours in [-1, MAX_CAPTURE_LEAD_HOURS + 1, i64::MAX] {
            let request = CaptureRunRequest {
                lead_hours: Some(lead_hours),
            };
            assert!(request.lead_time(24).is_err(), "{lead_hours}");
        }
    }
}
