//! Checkout quote endpoint.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::HeaderMap;
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use common::{Currency, Money};
use store::CommerceStore;

use crate::AppState;
use crate::error::ApiError;
use crate::routes::cart_cookie_token;

#[derive(Deserialize)]
pub struct QuoteRequest {
    pub country: String,
    pub currency: String,
}

#[derive(Serialize)]
pub struct QuoteResponse {
    pub shipping_cost: Money,
    pub tax_name: String,
    pub tax_rate: Decimal,
    pub subtotal: Money,
    pub total: Money,
    pub total_minor: i64,
    pub currency: Currency,
}

/// POST /checkout/quote — price the cart for a declared country and currency.
#[tracing::instrument(skip(state, headers, req))]
pub async fn quote<S: CommerceStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(req): Json<QuoteRequest>,
) -> Result<Json<QuoteResponse>, ApiError> {
    let now = Utc::now();
    let token = cart_cookie_token(&headers)
        .ok_or_else(|| checkout::CheckoutError::NotFound("shopping session".to_string()))?;

    let currency: Currency = req
        .currency
        .parse()
        .map_err(|e: common::UnknownCurrency| ApiError::BadRequest(e.to_string()))?;

    let quote = state
        .pricer
        .quote(&token, &req.country, currency, now)
        .await?;

    Ok(Json(QuoteResponse {
        shipping_cost: quote.shipping_cost,
        tax_name: quote.tax_name,
        tax_rate: quote.tax_rate,
        subtotal: quote.subtotal,
        total: quote.total,
        total_minor: quote.total_minor,
        currency: quote.currency,
    }))
}
