use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::post,
};
use practice_payments::domain::value_objects::no_show::{MAX_WINDOW_MINUTES, NoShowPolicy};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::OperatorUser,
    usecases::{no_show::NoShowUseCase, payment_errors::PaymentError},
};

#[derive(Clone)]
pub struct NoShowRouteState {
    usecase: Arc<NoShowUseCase>,
    policy: NoShowPolicy,
}

pub fn routes(usecase: Arc<NoShowUseCase>, policy: NoShowPolicy) -> Router {
    Router::new()
        .route("/scan", post(scan))
        .route("/:appointment_id", post(mark_no_show))
        .with_state(NoShowRouteState { usecase, policy })
}

/// Per-request overrides of the configured no-show policy.
#[derive(Debug, Default, Deserialize)]
pub struct ScanRequest {
    pub window_minutes: Option<i64>,
    pub fee_amount: Option<f64>,
    pub auto_process: Option<bool>,
}

impl ScanRequest {
    pub fn apply(self, base: NoShowPolicy) -> Result<NoShowPolicy, PaymentError> {
        let policy = NoShowPolicy {
            window_minutes: self.window_minutes.unwrap_or(base.window_minutes),
            fee_amount: self.fee_amount.unwrap_or(base.fee_amount),
            auto_process: self.auto_process.unwrap_or(base.auto_process),
        };
        if !policy.window_in_range() {
            return Err(PaymentError::InvalidInput(format!(
                "window_minutes must be between 0 and {MAX_WINDOW_MINUTES}"
            )));
        }
        Ok(policy)
    }
}

#[derive(Debug, Deserialize)]
pub struct MarkNoShowRequest {
    #[serde(default = "default_charge_fee")]
    pub charge_fee: bool,
    pub fee_amount: Option<f64>,
}

impl Default for MarkNoShowRequest {
    fn default() -> Self {
        Self {
            charge_fee: default_charge_fee(),
            fee_amount: None,
        }
    }
}

fn default_charge_fee() -> bool {
    true
}

pub async fn scan(
    State(state): State<NoShowRouteState>,
    _operator: OperatorUser,
    payload: Option<Json<ScanRequest>>,
) -> Result<impl IntoResponse, PaymentError> {
    let Json(overrides) = payload.unwrap_or_default();
    let policy = overrides.apply(state.policy)?;

    let result = state.usecase.scan_and_process(policy).await?;
    Ok(Json(result))
}

pub async fn mark_no_show(
    State(state): State<NoShowRouteState>,
    _operator: OperatorUser,
    Path(appointment_id): Path<Uuid>,
    payload: Option<Json<MarkNoShowRequest>>,
) -> Result<impl IntoResponse, PaymentError> {
    let Json(payload) = payload.unwrap_or_default();
    let fee_amount = payload.fee_amount.unwrap_or(state.policy.fee_amount);

    let outcome = state
        .usecase
        .mark_manually(appointment_id, payload.charge_fee, fee_amount)
        .await?;
    Ok(Json(outcome))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_overrides_only_replace_given_fields() {
        let overrides: ScanRequest = serde_json::from_str(r#"{"window_minutes":30}"#).unwrap();
        let policy = overrides.apply(NoShowPolicy::default()).unwrap();

        assert_eq!(policy.window_minutes, 30);
        assert_eq!(policy.fee_amount, 50.0);
        assert!(policy.auto_process);
    }

    #[test]
    fn manual_marking_charges_by_default() {
        let payload: MarkNoShowRequest = serde_json::from_str("{}").unwrap();
        assert!(payload.charge_fee);
        assert!(payload.fee_amount.is_none());
        assert!(MarkNoShowRequest::default().charge_fee);
    }

    #[test]
    fn scan_overrides_reject_windows_out_of_range() {
        for body in [
            r#"{"window_minutes":-1}"#,
            r#"{"window_minutes":9223372036854775807}"#,
            r#"{"window_minutes":10081}"#,
        ] {
            let overrides: ScanRequest = serde_json::from_str(body).unwrap();
            let result = overrides.apply(NoShowPolicy::default());
            assert!(matches!(result, Err(PaymentError::InvalidInput(_))), "{body}");
        }
    }
}
