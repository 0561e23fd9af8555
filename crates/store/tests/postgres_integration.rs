//! PostgreSQL integration tests
//!
//! These tests use a shared PostgreSQL container for efficiency.
//! Run with:
//!
//! ```bash
//! cargo test -p store --test postgres_integration -- --test-threads=1
//! ```

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

use common::{Currency, Money, PaymentRef, ReservationId, SessionId, Sku};
use domain::{
    Address, CardAuthorization, CartItem, ConfirmedOrder, OrderDetail, OrderReservation,
    PaymentDetail,
};
use store::{
    OrderStore, PostgresStore, ReferenceStore, ReservationStore, SessionStore, SkuLedger,
    StoreError,
};

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

/// Global shared container
static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            // Create a temporary pool just for migrations
            let temp_pool = PgPool::connect(&connection_string).await.unwrap();

            // Run migrations using raw_sql to execute multiple statements
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_commerce_tables.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();

            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and cleared tables
async fn get_test_store() -> PostgresStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    // Clear tables for test isolation; referencing tables first.
    sqlx::query(
        "TRUNCATE TABLE order_details, addresses, card_authorizations, payment_details, \
         order_reservations, cart_items, shopping_sessions, sku_pricing, sku_weights, \
         shipping_settings, tax_settings, skus",
    )
    .execute(&pool)
    .await
    .unwrap();

    PostgresStore::new(pool)
}

async fn seed_sku(store: &PostgresStore, sku: &str, inventory: i32) {
    sqlx::query("INSERT INTO skus (id, size, inventory) VALUES ($1, 'M', $2)")
        .bind(sku)
        .bind(inventory)
        .execute(store.pool())
        .await
        .unwrap();
}

fn now() -> DateTime<Utc> {
    Utc::now()
}

fn sample_order(session_id: SessionId, reservations: Vec<ReservationId>) -> ConfirmedOrder {
    let payment_ref = PaymentRef::new("PSK-PG-1");
    ConfirmedOrder {
        session_id,
        reservations,
        payment: PaymentDetail {
            payment_ref: payment_ref.clone(),
            amount_minor: 350_000,
            currency: Currency::Ngn,
            provider_status: "success".to_string(),
            created_at: now(),
        },
        address: Address {
            payment_ref: payment_ref.clone(),
            street: "12 Marina Rd".to_string(),
            city: "Lagos".to_string(),
            state: "LA".to_string(),
            country: "NG".to_string(),
        },
        authorization: CardAuthorization {
            payment_ref: payment_ref.clone(),
            authorization_code: "AUTH-PG".to_string(),
            card_type: "visa".to_string(),
            last4: "4242".to_string(),
            bank: "Test Bank".to_string(),
        },
        details: vec![OrderDetail::new(payment_ref, Sku::new("TSHIRT-M"), 2)],
    }
}

#[tokio::test]
#[serial]
async fn test_reserve_is_conditional_on_stock() {
    let store = get_test_store().await;
    seed_sku(&store, "TSHIRT-M", 3).await;
    let sku = Sku::new("TSHIRT-M");

    store.reserve(&sku, 2).await.unwrap();
    assert_eq!(store.on_hand(&sku).await.unwrap(), Some(1));

    assert!(store.reserve(&sku, 2).await.is_err());
    assert_eq!(store.on_hand(&sku).await.unwrap(), Some(1));

    store.release(&sku, 2).await.unwrap();
    assert_eq!(store.on_hand(&sku).await.unwrap(), Some(3));
}

#[tokio::test]
#[serial]
async fn test_concurrent_reserves_never_oversell() {
    let store = get_test_store().await;
    seed_sku(&store, "TSHIRT-M", 5).await;

    let mut handles = Vec::new();
    for _ in 0..20 {
        let store = store.clone();
        handles.push(tokio::spawn(async move {
            store.reserve(&Sku::new("TSHIRT-M"), 1).await.is_ok()
        }));
    }

    let mut successes = 0;
    for handle in handles {
        if handle.await.unwrap() {
            successes += 1;
        }
    }

    assert_eq!(successes, 5);
    assert_eq!(store.on_hand(&Sku::new("TSHIRT-M")).await.unwrap(), Some(0));
}

#[tokio::test]
#[serial]
async fn test_delete_pending_reports_the_race_loser() {
    let store = get_test_store().await;
    seed_sku(&store, "TSHIRT-M", 5).await;

    let session = store
        .create_session(now(), Duration::hours(1), None)
        .await
        .unwrap();
    let hold = OrderReservation::hold(session.id, Sku::new("TSHIRT-M"), 2, now());
    store.put(&hold).await.unwrap();

    assert!(store.delete_pending(hold.id).await.unwrap());
    assert!(!store.delete_pending(hold.id).await.unwrap());
}

#[tokio::test]
#[serial]
async fn test_reservation_put_refreshes_in_place() {
    let store = get_test_store().await;
    seed_sku(&store, "TSHIRT-M", 5).await;

    let session = store
        .create_session(now(), Duration::hours(1), None)
        .await
        .unwrap();
    let mut hold = OrderReservation::hold(session.id, Sku::new("TSHIRT-M"), 2, now());
    store.put(&hold).await.unwrap();

    hold.refresh(4, now() + Duration::hours(24));
    store.put(&hold).await.unwrap();

    let found = store
        .find_pending(session.id, &Sku::new("TSHIRT-M"))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.id, hold.id);
    assert_eq!(found.quantity, 4);
    assert_eq!(store.pending_total(&Sku::new("TSHIRT-M")).await.unwrap(), 4);
}

#[tokio::test]
#[serial]
async fn test_record_order_transitions_and_cleans_up() {
    let store = get_test_store().await;
    seed_sku(&store, "TSHIRT-M", 5).await;

    let session = store
        .create_session(now(), Duration::hours(1), None)
        .await
        .unwrap();
    store
        .upsert_cart_item(&CartItem::new(session.id, Sku::new("TSHIRT-M"), 2))
        .await
        .unwrap();
    let hold = OrderReservation::hold(
        session.id,
        Sku::new("TSHIRT-M"),
        2,
        now() + Duration::hours(24),
    );
    store.put(&hold).await.unwrap();

    let order = sample_order(session.id, vec![hold.id]);
    store.record_order(&order).await.unwrap();

    assert!(store.payment_exists(&order.payment.payment_ref).await.unwrap());
    assert_eq!(
        store
            .order_details(&order.payment.payment_ref)
            .await
            .unwrap()
            .len(),
        1
    );
    assert!(store.find_session(session.id).await.unwrap().is_none());
    assert!(store.cart_items(session.id).await.unwrap().is_empty());
    // The hold is consumed, not deletable.
    assert!(!store.delete_pending(hold.id).await.unwrap());
}

#[tokio::test]
#[serial]
async fn test_record_order_rolls_back_on_missing_reservation() {
    let store = get_test_store().await;
    seed_sku(&store, "TSHIRT-M", 5).await;

    let session = store
        .create_session(now(), Duration::hours(1), None)
        .await
        .unwrap();
    let hold = OrderReservation::hold(
        session.id,
        Sku::new("TSHIRT-M"),
        2,
        now() + Duration::hours(24),
    );
    store.put(&hold).await.unwrap();

    // A reservation the scheduler already reaped.
    let order = sample_order(session.id, vec![hold.id, ReservationId::new()]);
    let err = store.record_order(&order).await.unwrap_err();
    assert!(matches!(err, StoreError::Conflict(_)));

    // Nothing was published: payment absent, hold still pending, session alive.
    assert!(!store.payment_exists(&order.payment.payment_ref).await.unwrap());
    let untouched = store
        .find_pending(session.id, &Sku::new("TSHIRT-M"))
        .await
        .unwrap();
    assert!(untouched.is_some());
    assert!(store.find_session(session.id).await.unwrap().is_some());
}

#[tokio::test]
#[serial]
async fn test_reference_reads() {
    let store = get_test_store().await;
    seed_sku(&store, "TSHIRT-M", 5).await;

    sqlx::query("INSERT INTO sku_pricing (sku, currency, unit_price) VALUES ('TSHIRT-M', 'USD', 19.99)")
        .execute(store.pool())
        .await
        .unwrap();
    sqlx::query("INSERT INTO sku_weights (sku, weight_kg) VALUES ('TSHIRT-M', 0.25)")
        .execute(store.pool())
        .await
        .unwrap();
    sqlx::query(
        "INSERT INTO shipping_settings (country, base_price, price_per_kg) VALUES ('default', 10.00, 1.50)",
    )
    .execute(store.pool())
    .await
    .unwrap();
    sqlx::query("INSERT INTO tax_settings (name, rate, active) VALUES ('VAT', 0.075, TRUE)")
        .execute(store.pool())
        .await
        .unwrap();

    let price = store
        .unit_price(&Sku::new("TSHIRT-M"), Currency::Usd)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(price, Money::new("19.99".parse().unwrap()));

    assert!(store.unit_weight(&Sku::new("TSHIRT-M")).await.unwrap().is_some());
    assert!(store.shipping_for("default").await.unwrap().is_some());
    assert!(store.shipping_for("Atlantis").await.unwrap().is_none());

    let tax = store.active_tax().await.unwrap().unwrap();
    assert_eq!(tax.name, "VAT");
}
