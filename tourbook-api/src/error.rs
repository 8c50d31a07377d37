use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use tourbook_core::{LedgerError, TransitionError};

#[derive(Debug)]
pub enum AppError {
    AuthenticationError(String),
    AuthorizationError(String),
    ValidationError(String),
    NotFoundError(String),
    /// A business rule refused the request; `code` is machine readable.
    ConflictError { code: &'static str, message: String },
    CapacityExceeded { available: i32 },
    ConcurrencyConflict,
    InternalServerError(String),
    Anyhow(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            AppError::AuthenticationError(msg) => (StatusCode::UNAUTHORIZED, error_body(&msg)),
            AppError::AuthorizationError(msg) => (StatusCode::FORBIDDEN, error_body(&msg)),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, error_body(&msg)),
            AppError::NotFoundError(msg) => (StatusCode::NOT_FOUND, error_body(&msg)),
            AppError::ConflictError { code, message } => (
                StatusCode::CONFLICT,
                json!({ "error": message, "code": code }),
            ),
            AppError::CapacityExceeded { available } => (
                StatusCode::CONFLICT,
                json!({
                    "error": "Not enough seats left on this tour date",
                    "code": "CAPACITY_EXCEEDED",
                    "available": available,
                }),
            ),
            AppError::ConcurrencyConflict => (
                StatusCode::CONFLICT,
                json!({
                    "error": "The tour date was updated concurrently, please retry",
                    "code": "CONCURRENCY_CONFLICT",
                    "retryable": true,
                }),
            ),
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, error_body("Internal Server Error"))
            }
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {:#}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, error_body("Internal Server Error"))
            }
        };

        (status, Json(body)).into_response()
    }
}

fn error_body(message: &str) -> Value {
    json!({ "error": message })
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Anyhow(err)
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        let message = err.to_string();
        match err {
            LedgerError::TourNotFound(_)
            | LedgerError::TourDateNotFound(_)
            | LedgerError::BookingNotFound(_) => AppError::NotFoundError(message),
            LedgerError::CapacityExceeded { available } => AppError::CapacityExceeded { available },
            LedgerError::ConcurrencyConflict => AppError::ConcurrencyConflict,
            LedgerError::TourDateInactive(_) => AppError::ConflictError {
                code: "TOUR_DATE_INACTIVE",
                message,
            },
            LedgerError::Transition(TransitionError::InvalidTransition { .. }) => {
                AppError::ConflictError {
                    code: "INVALID_TRANSITION",
                    message,
                }
            }
            LedgerError::Transition(TransitionError::UnknownStatus(_)) => {
                AppError::ValidationError(message)
            }
            LedgerError::BookingNotModifiable { .. } => AppError::ConflictError {
                code: "BOOKING_NOT_MODIFIABLE",
                message,
            },
            LedgerError::CapacityBelowBooked { .. } => AppError::ConflictError {
                code: "CAPACITY_BELOW_BOOKED",
                message,
            },
            LedgerError::PaidBookingDeletion(_) => AppError::ConflictError {
                code: "PAID_BOOKING_DELETION",
                message,
            },
            LedgerError::Validation(msg) => AppError::ValidationError(msg),
            LedgerError::Storage(_) => AppError::InternalServerError(message),
        }
    }
}
