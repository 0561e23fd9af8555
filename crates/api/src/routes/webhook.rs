//! Payment provider webhook endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use chrono::Utc;
use serde_json::json;

use checkout::{CheckoutError, ConfirmOutcome, PaymentNotice};
use store::CommerceStore;

use crate::AppState;
use crate::error::ApiError;

/// POST /webhooks/payment — consume the provider's charge-outcome callback.
///
/// Idempotent on the provider reference: redelivery returns 200 without
/// touching state. A confirmation that lost the expiry race is acknowledged
/// with 202 so the provider stops retrying; the charge is queued for
/// manual reconciliation and refund.
#[tracing::instrument(skip(state, notice), fields(reference = %notice.reference))]
pub async fn payment<S: CommerceStore>(
    State(state): State<Arc<AppState<S>>>,
    Json(notice): Json<PaymentNotice>,
) -> Result<(StatusCode, Json<serde_json::Value>), ApiError> {
    let now = Utc::now();

    match state.confirmation.confirm(&notice, now).await {
        Ok(ConfirmOutcome::Confirmed(confirmation)) => Ok((
            StatusCode::OK,
            Json(json!({
                "status": "confirmed",
                "payment_ref": confirmation.payment_ref,
                "items": confirmation.details.len(),
            })),
        )),
        Ok(ConfirmOutcome::AlreadyProcessed) => Ok((
            StatusCode::OK,
            Json(json!({ "status": "already_processed" })),
        )),
        Err(err @ CheckoutError::ReservationExpiredDuringPayment { .. }) => Ok((
            StatusCode::ACCEPTED,
            Json(json!({
                "status": "reconciliation_required",
                "detail": err.to_string(),
            })),
        )),
        Err(err) => Err(err.into()),
    }
}
