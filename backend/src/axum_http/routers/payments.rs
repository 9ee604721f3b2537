use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::post,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    auth::{AuthUser, OperatorUser},
    usecases::{payment_errors::PaymentError, payment_lifecycle::PaymentLifecycleUseCase},
};

#[derive(Clone)]
pub struct PaymentRouteState {
    usecase: Arc<PaymentLifecycleUseCase>,
    default_fee_amount: f64,
}

pub fn routes(usecase: Arc<PaymentLifecycleUseCase>, default_fee_amount: f64) -> Router {
    Router::new()
        .route("/:appointment_id/authorize", post(authorize))
        .route("/:appointment_id/capture", post(capture))
        .route("/:appointment_id/refund", post(refund))
        .route("/:appointment_id/no-show-fee", post(charge_no_show_fee))
        .with_state(PaymentRouteState {
            usecase,
            default_fee_amount,
        })
}

#[derive(Debug, Deserialize)]
pub struct AuthorizeRequest {
    pub amount: f64,
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RefundRequest {
    /// Omitted for a full refund.
    pub amount: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
pub struct NoShowFeeRequest {
    pub amount: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct RefundResponse {
    pub appointment_id: Uuid,
    pub refunded_minor: i64,
}

pub async fn authorize(
    State(state): State<PaymentRouteState>,
    auth: AuthUser,
    Path(appointment_id): Path<Uuid>,
    Json(payload): Json<AuthorizeRequest>,
) -> Result<impl IntoResponse, PaymentError> {
    let authorized = state
        .usecase
        .authorize(
            auth.user_id,
            appointment_id,
            payload.amount,
            payload.description,
        )
        .await?;
    Ok(Json(authorized))
}

pub async fn capture(
    State(state): State<PaymentRouteState>,
    _operator: OperatorUser,
    Path(appointment_id): Path<Uuid>,
) -> Result<impl IntoResponse, PaymentError> {
    let payment = state.usecase.capture(appointment_id).await?;
    Ok(Json(payment))
}

pub async fn refund(
    State(state): State<PaymentRouteState>,
    _operator: OperatorUser,
    Path(appointment_id): Path<Uuid>,
    payload: Option<Json<RefundRequest>>,
) -> Result<impl IntoResponse, PaymentError> {
    let Json(payload) = payload.unwrap_or_default();
    let refunded_minor = state.usecase.refund(appointment_id, payload.amount).await?;
    Ok(Json(RefundResponse {
        appointment_id,
        refunded_minor,
    }))
}

pub async fn charge_no_show_fee(
    State(state): State<PaymentRouteState>,
    _operator: OperatorUser,
    Path(appointment_id): Path<Uuid>,
    payload: Option<Json<NoShowFeeRequest>>,
) -> Result<impl IntoResponse, PaymentError> {
    let Json(payload) = payload.unwrap_or_default();
    let amount = payload.amount.unwrap_or(state.default_fee_amount);
    let payment = state.usecase.charge_fee(appointment_id, amount).await?;
    Ok(Json(payment))
}
