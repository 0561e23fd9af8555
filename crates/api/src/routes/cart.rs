//! Cart mutation endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{AppendHeaders, IntoResponse};
use chrono::Utc;
use serde::{Deserialize, Serialize};

use common::Sku;
use store::CommerceStore;

use crate::AppState;
use crate::error::ApiError;
use crate::routes::{cart_cookie_header, cart_cookie_token};

// -- Request types --

#[derive(Deserialize)]
pub struct AddItemRequest {
    pub sku: String,
    pub qty: u32,
}

// -- Response types --

#[derive(Serialize)]
pub struct CartLineResponse {
    pub sku: String,
    pub qty: u32,
}

// -- Handlers --

/// POST /cart/items — add a SKU to the cart, holding its stock.
///
/// A request without a cart cookie transparently starts a new anonymous
/// session; a cookie whose session is gone is a 404 and the shopper starts
/// over. Every success refreshes the cookie's trailing expiry.
#[tracing::instrument(skip(state, headers, req))]
pub async fn add_item<S: CommerceStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Json(req): Json<AddItemRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let now = Utc::now();

    let token = match cart_cookie_token(&headers) {
        Some(token) => token,
        None => state
            .manager
            .start_session(now, None)
            .await?
            .cookie()
            .to_token(),
    };

    let sku = Sku::new(req.sku);
    let cookie = state
        .manager
        .add_to_cart(&token, sku.clone(), req.qty, now)
        .await?;

    Ok((
        StatusCode::CREATED,
        AppendHeaders([(header::SET_COOKIE, cart_cookie_header(&cookie))]),
        Json(CartLineResponse {
            sku: sku.to_string(),
            qty: req.qty,
        }),
    ))
}

/// DELETE /cart/items/{sku} — remove a SKU, releasing its hold.
#[tracing::instrument(skip(state, headers))]
pub async fn remove_item<S: CommerceStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    Path(sku): Path<String>,
) -> Result<StatusCode, ApiError> {
    let now = Utc::now();
    let token = cart_cookie_token(&headers).ok_or(checkout::CheckoutError::SessionExpired)?;

    state
        .manager
        .cancel_hold(&token, &Sku::new(sku), now)
        .await?;

    Ok(StatusCode::NO_CONTENT)
}

/// GET /cart — the session's current line items.
#[tracing::instrument(skip(state, headers))]
pub async fn get_cart<S: CommerceStore>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
) -> Result<Json<Vec<CartLineResponse>>, ApiError> {
    let now = Utc::now();
    let token = cart_cookie_token(&headers).ok_or(checkout::CheckoutError::SessionExpired)?;

    let items = state.manager.cart(&token, now).await?;
    let lines = items
        .into_iter()
        .map(|item| CartLineResponse {
            sku: item.sku.to_string(),
            qty: item.quantity,
        })
        .collect();

    Ok(Json(lines))
}
