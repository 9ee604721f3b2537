use axum::http::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PaymentError {
    #[error("amount must be a positive, finite number of dollars")]
    InvalidAmount,
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("{0} not found")]
    NotFound(&'static str),
    #[error("no authorized payment found for appointment")]
    RecordNotFound,
    #[error("no charged payment found for appointment")]
    NoChargeFound,
    #[error("precondition failed: {0}")]
    PreconditionFailed(String),
    #[error("no default payment method on file")]
    NoPaymentMethod,
    #[error("payment processor error: {0}")]
    ExternalProcessor(String),
    /// The processor accepted the operation but the local record could not be updated.
    #[error("failed to persist {context} (intent {intent_id})")]
    Persistence {
        context: &'static str,
        intent_id: String,
    },
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl PaymentError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            PaymentError::InvalidAmount => StatusCode::UNPROCESSABLE_ENTITY,
            PaymentError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            PaymentError::NotFound(_)
            | PaymentError::RecordNotFound
            | PaymentError::NoChargeFound => StatusCode::NOT_FOUND,
            PaymentError::PreconditionFailed(_) => StatusCode::CONFLICT,
            PaymentError::NoPaymentMethod => StatusCode::UNPROCESSABLE_ENTITY,
            PaymentError::ExternalProcessor(_) => StatusCode::BAD_GATEWAY,
            PaymentError::Persistence { .. } | PaymentError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Message safe to return to API clients.
    pub fn public_message(&self) -> String {
        match self {
            PaymentError::Persistence { .. } | PaymentError::Internal(_) => {
                "Internal server error".to_string()
            }
            other => other.to_string(),
        }
    }
}

pub type PaymentResult<T> = std::result::Result<T, PaymentError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_variants_to_http_statuses() {
        assert_eq!(PaymentError::InvalidAmount.status_code(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(PaymentError::NoChargeFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(
            PaymentError::PreconditionFailed("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            PaymentError::ExternalProcessor("card_declined".into()).status_code(),
            StatusCode::BAD_GATEWAY
        );
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let err = PaymentError::Persistence {
            context: "capture",
            intent_id: "pi_secret".into(),
        };
        assert_eq!(err.public_message(), "Internal server error");
        assert_eq!(
            PaymentError::Internal(anyhow::anyhow!("db down")).public_message(),
            "Internal server error"
        );
    }
}
