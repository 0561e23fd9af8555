//! API error types with HTTP response mapping.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use checkout::CheckoutError;
use store::StoreError;

/// API-level error type that maps to HTTP responses.
#[derive(Debug)]
pub enum ApiError {
    /// A checkout service error.
    Checkout(CheckoutError),
    /// Bad request from the client.
    BadRequest(String),
    /// Internal server error.
    Internal(String),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Checkout(err) => checkout_error_to_response(err),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal server error");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({ "error": message });
        (status, axum::Json(body)).into_response()
    }
}

fn checkout_error_to_response(err: CheckoutError) -> (StatusCode, String) {
    match &err {
        // User-correctable: pick a smaller quantity or another SKU.
        CheckoutError::OutOfStock { .. } => (StatusCode::CONFLICT, err.to_string()),

        // "Please refresh": the shopper restarts checkout, no retry.
        CheckoutError::SessionExpired
        | CheckoutError::NotFound(_)
        | CheckoutError::EmptyCart => (StatusCode::NOT_FOUND, err.to_string()),

        CheckoutError::InvalidQuantity { .. } => (StatusCode::BAD_REQUEST, err.to_string()),

        // Not synchronously correctable; acknowledged and queued for manual
        // reconciliation so the provider stops retrying.
        CheckoutError::ReservationExpiredDuringPayment { .. } => {
            (StatusCode::ACCEPTED, err.to_string())
        }

        // Infrastructure: the caller retries with backoff.
        CheckoutError::Store(StoreError::Timeout) | CheckoutError::Store(StoreError::Unavailable(_)) => {
            (StatusCode::SERVICE_UNAVAILABLE, err.to_string())
        }
        CheckoutError::Store(_) => {
            tracing::error!(error = %err, "store failure");
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

impl From<CheckoutError> for ApiError {
    fn from(err: CheckoutError) -> Self {
        ApiError::Checkout(err)
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Checkout(CheckoutError::Store(err))
    }
}
