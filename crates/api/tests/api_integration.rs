//! Integration tests for the API server.

use std::sync::{Arc, OnceLock};

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use metrics_exporter_prometheus::PrometheusHandle;
use rust_decimal::Decimal;
use tower::ServiceExt;

use api::config::Config;
use common::{Currency, Money, Sku};
use store::{MemoryStore, ShippingSetting, SkuLedger, TaxSetting};

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

fn get_metrics_handle() -> PrometheusHandle {
    METRICS_HANDLE
        .get_or_init(|| {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            builder
                .install_recorder()
                .expect("failed to install Prometheus recorder")
        })
        .clone()
}

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

async fn seed_catalog(store: &MemoryStore) {
    store.seed_sku(Sku::new("TSHIRT-M"), 5).await;
    store
        .seed_price(Sku::new("TSHIRT-M"), Currency::Usd, Money::new(dec("19.99")))
        .await;
    store
        .seed_price(Sku::new("TSHIRT-M"), Currency::Ngn, Money::new(dec("2500.00")))
        .await;
    store.seed_weight(Sku::new("TSHIRT-M"), dec("0.25")).await;

    store
        .seed_shipping(ShippingSetting {
            country: "NG".to_string(),
            base_price: Money::new(dec("1000.00")),
            price_per_kg: Money::new(dec("0")),
        })
        .await;
    store
        .seed_shipping(ShippingSetting {
            country: "default".to_string(),
            base_price: Money::new(dec("10.00")),
            price_per_kg: Money::new(dec("1.50")),
        })
        .await;
    store
        .set_active_tax(TaxSetting {
            name: "VAT".to_string(),
            rate: dec("0.075"),
        })
        .await;
}

async fn setup() -> (axum::Router, MemoryStore) {
    let store = MemoryStore::new();
    seed_catalog(&store).await;
    let state = api::create_state(store.clone(), &Config::default());
    let app = api::create_app(state, get_metrics_handle());
    (app, store)
}

fn add_item_request(cookie: Option<&str>, sku: &str, qty: u32) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/cart/items")
        .header("content-type", "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, format!("cart={cookie}"));
    }
    builder
        .body(Body::from(
            serde_json::json!({ "sku": sku, "qty": qty }).to_string(),
        ))
        .unwrap()
}

fn cookie_from(response: &axum::http::Response<Body>) -> String {
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .expect("set-cookie header")
        .to_str()
        .unwrap();
    set_cookie
        .strip_prefix("cart=")
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string()
}

async fn body_json(response: axum::http::Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let (app, _) = setup().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn test_add_item_starts_session_and_sets_cookie() {
    let (app, store) = setup().await;

    let response = app
        .oneshot(add_item_request(None, "TSHIRT-M", 2))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let token = cookie_from(&response);
    assert!(token.contains(':'));

    let json = body_json(response).await;
    assert_eq!(json["sku"], "TSHIRT-M");
    assert_eq!(json["qty"], 2);

    assert_eq!(store.on_hand(&Sku::new("TSHIRT-M")).await.unwrap(), Some(3));
}

#[tokio::test]
async fn test_add_item_beyond_stock_is_conflict() {
    let (app, store) = setup().await;

    let response = app
        .oneshot(add_item_request(None, "TSHIRT-M", 9))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CONFLICT);
    assert_eq!(store.on_hand(&Sku::new("TSHIRT-M")).await.unwrap(), Some(5));
}

#[tokio::test]
async fn test_add_item_zero_quantity_is_bad_request() {
    let (app, _) = setup().await;

    let response = app
        .oneshot(add_item_request(None, "TSHIRT-M", 0))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_add_item_with_dead_cookie_is_not_found() {
    let (app, _) = setup().await;

    let response = app
        .oneshot(add_item_request(
            Some("00000000-0000-4000-8000-000000000000:123"),
            "TSHIRT-M",
            1,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_remove_item_releases_hold() {
    let (app, store) = setup().await;

    let response = app
        .clone()
        .oneshot(add_item_request(None, "TSHIRT-M", 2))
        .await
        .unwrap();
    let token = cookie_from(&response);

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/cart/items/TSHIRT-M")
                .header(header::COOKIE, format!("cart={token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    assert_eq!(store.on_hand(&Sku::new("TSHIRT-M")).await.unwrap(), Some(5));
}

#[tokio::test]
async fn test_remove_item_without_cookie_is_not_found() {
    let (app, _) = setup().await;

    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri("/cart/items/TSHIRT-M")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_cart_lists_lines() {
    let (app, _) = setup().await;

    let response = app
        .clone()
        .oneshot(add_item_request(None, "TSHIRT-M", 2))
        .await
        .unwrap();
    let token = cookie_from(&response);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/cart")
                .header(header::COOKIE, format!("cart={token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json[0]["sku"], "TSHIRT-M");
    assert_eq!(json[0]["qty"], 2);
}

#[tokio::test]
async fn test_quote_includes_shipping_and_tax() {
    let (app, _) = setup().await;

    let response = app
        .clone()
        .oneshot(add_item_request(None, "TSHIRT-M", 2))
        .await
        .unwrap();
    let token = cookie_from(&response);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/checkout/quote")
                .header("content-type", "application/json")
                .header(header::COOKIE, format!("cart={token}"))
                .body(Body::from(
                    serde_json::json!({ "country": "NG", "currency": "NGN" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["tax_name"], "VAT");
    assert_eq!(json["shipping_cost"], "1000.00");
    assert_eq!(json["subtotal"], "5000.00");
    assert_eq!(json["total"], "6375.00");
    assert_eq!(json["total_minor"], 637_500);
    assert_eq!(json["currency"], "NGN");
}

#[tokio::test]
async fn test_quote_without_session_is_not_found() {
    let (app, _) = setup().await;

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/checkout/quote")
                .header("content-type", "application/json")
                .body(Body::from(
                    serde_json::json!({ "country": "NG", "currency": "NGN" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_quote_unknown_currency_is_bad_request() {
    let (app, _) = setup().await;

    let response = app
        .clone()
        .oneshot(add_item_request(None, "TSHIRT-M", 1))
        .await
        .unwrap();
    let token = cookie_from(&response);

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/checkout/quote")
                .header("content-type", "application/json")
                .header(header::COOKIE, format!("cart={token}"))
                .body(Body::from(
                    serde_json::json!({ "country": "NG", "currency": "EUR" }).to_string(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

fn webhook_request(token: &str, reference: &str, qty: u32) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/webhooks/payment")
        .header("content-type", "application/json")
        .body(Body::from(
            serde_json::json!({
                "reference": reference,
                "cart_token": token,
                "amount_minor": 637_500,
                "currency": "NGN",
                "provider_status": "success",
                "items": [{ "sku": "TSHIRT-M", "quantity": qty }],
                "authorization": {
                    "authorization_code": "AUTH-001",
                    "card_type": "visa",
                    "last4": "4242",
                    "bank": "Test Bank"
                },
                "shipping_address": {
                    "street": "12 Marina Rd",
                    "city": "Lagos",
                    "state": "LA",
                    "country": "NG"
                }
            })
            .to_string(),
        ))
        .unwrap()
}

#[tokio::test]
async fn test_webhook_confirms_and_is_idempotent() {
    let (app, store) = setup().await;

    let response = app
        .clone()
        .oneshot(add_item_request(None, "TSHIRT-M", 2))
        .await
        .unwrap();
    let token = cookie_from(&response);

    let response = app
        .clone()
        .oneshot(webhook_request(&token, "PSK-API-1", 2))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "confirmed");
    assert_eq!(json["items"], 1);

    // Stock stays decremented; the units are sold.
    assert_eq!(store.on_hand(&Sku::new("TSHIRT-M")).await.unwrap(), Some(3));

    // Redelivery of the same reference is a no-op.
    let response = app
        .oneshot(webhook_request(&token, "PSK-API-1", 2))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "already_processed");
    assert_eq!(store.on_hand(&Sku::new("TSHIRT-M")).await.unwrap(), Some(3));
}
