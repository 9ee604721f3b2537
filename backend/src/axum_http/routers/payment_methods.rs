use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, put},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    usecases::{
        payment_errors::PaymentError,
        payment_methods::{NewPaymentMethod, PaymentMethodUseCase},
    },
};

pub fn routes(usecase: Arc<PaymentMethodUseCase>) -> Router {
    Router::new()
        .route("/", get(list_methods).post(add_method))
        .route("/:id/default", put(set_default))
        .with_state(usecase)
}

#[derive(Debug, Deserialize)]
pub struct AddPaymentMethodRequest {
    #[serde(flatten)]
    pub method: NewPaymentMethod,
    #[serde(default)]
    pub make_default: bool,
}

pub async fn list_methods(
    State(usecase): State<Arc<PaymentMethodUseCase>>,
    auth: AuthUser,
) -> Result<impl IntoResponse, PaymentError> {
    Ok(Json(usecase.list(auth.user_id).await?))
}

pub async fn add_method(
    State(usecase): State<Arc<PaymentMethodUseCase>>,
    auth: AuthUser,
    Json(payload): Json<AddPaymentMethodRequest>,
) -> Result<impl IntoResponse, PaymentError> {
    let method = usecase
        .add(auth.user_id, payload.method, payload.make_default)
        .await?;
    Ok((StatusCode::CREATED, Json(method)))
}

pub async fn set_default(
    State(usecase): State<Arc<PaymentMethodUseCase>>,
    auth: AuthUser,
    Path(method_id): Path<Uuid>,
) -> Result<impl IntoResponse, PaymentError> {
    usecase.set_default(auth.user_id, method_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
