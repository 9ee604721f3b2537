use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    usecases::{
        payment_errors::PaymentError,
        payment_lifecycle::{NewAppointment, PaymentLifecycleUseCase},
    },
};

// Run example
//   curl -X POST "http://localhost:$SERVER_PORT_BACKEND/api/v1/appointments" \
//     -H "Authorization: Bearer $USER_JWT" \
//     -H "Content-Type: application/json" \
//     -d '{"appointment_type":"therapy","scheduled_at":"2026-11-02T14:00:00Z","amount":150.0}'

pub fn routes(usecase: Arc<PaymentLifecycleUseCase>) -> Router {
    Router::new()
        .route("/", post(book_appointment))
        .route("/:id/cancel", post(cancel_appointment))
        .route("/:id/payments", get(list_payments))
        .with_state(usecase)
}

#[derive(Debug, Deserialize)]
pub struct BookAppointmentRequest {
    #[serde(flatten)]
    pub appointment: NewAppointment,
    pub amount: f64,
    pub description: Option<String>,
}

pub async fn book_appointment(
    State(usecase): State<Arc<PaymentLifecycleUseCase>>,
    auth: AuthUser,
    Json(payload): Json<BookAppointmentRequest>,
) -> Result<impl IntoResponse, PaymentError> {
    let outcome = usecase
        .book_appointment(
            auth.user_id,
            payload.appointment,
            payload.amount,
            payload.description,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(outcome)))
}

pub async fn cancel_appointment(
    State(usecase): State<Arc<PaymentLifecycleUseCase>>,
    auth: AuthUser,
    Path(appointment_id): Path<Uuid>,
) -> Result<impl IntoResponse, PaymentError> {
    let outcome = usecase
        .cancel_appointment(auth.user_id, appointment_id)
        .await?;
    Ok(Json(outcome))
}

pub async fn list_payments(
    State(usecase): State<Arc<PaymentLifecycleUseCase>>,
    auth: AuthUser,
    Path(appointment_id): Path<Uuid>,
) -> Result<impl IntoResponse, PaymentError> {
    let requester = (!auth.is_operator()).then_some(auth.user_id);
    let payments = usecase
        .list_appointment_payments(requester, appointment_id)
        .await?;
    Ok(Json(payments))
}

#[cfg(test)]
mod tests {
    use super::*;
    use practice_payments::domain::value_objects::enums::appointment_types::AppointmentType;

    #[test]
    fn booking_request_flattens_appointment_fields() {
        let payload: BookAppointmentRequest = serde_json::from_str(
            r#"{"appointment_type":"therapy","scheduled_at":"2026-11-02T14:00:00Z","amount":150.0}"#,
        )
        .unwrap();

        assert_eq!(payload.appointment.appointment_type, AppointmentType::Therapy);
        assert!(payload.appointment.end_at.is_none());
        assert_eq!(payload.amount, 150.0);
        assert!(payload.description.is_none());
    }
}
