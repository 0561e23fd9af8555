//! PostgreSQL-backed store implementation.

use std::future::Future;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Row, postgres::PgRow};
use uuid::Uuid;

use common::{Currency, Money, PaymentRef, ReservationId, SessionId, Sku};
use domain::{CartItem, ConfirmedOrder, OrderDetail, OrderReservation, ReservationStatus, ShoppingSession};

use crate::error::{Result, StoreError};
use crate::ledger::{LedgerError, SkuLedger};
use crate::orders::OrderStore;
use crate::reference::{ReferenceStore, ShippingSetting, TaxSetting};
use crate::reservations::ReservationStore;
use crate::sessions::SessionStore;

const DEFAULT_CALL_TIMEOUT: StdDuration = StdDuration::from_secs(5);

/// PostgreSQL store implementing every storage trait.
///
/// Inventory changes ride on conditional single-statement updates; the
/// confirmation write and the cascading session delete run in explicit
/// transactions. Every call is bounded by a request-scoped timeout.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
    call_timeout: StdDuration,
}

impl PostgresStore {
    /// Creates a store over an existing pool with the default call timeout.
    pub fn new(pool: PgPool) -> Self {
        Self::with_timeout(pool, DEFAULT_CALL_TIMEOUT)
    }

    /// Creates a store with an explicit per-call timeout.
    pub fn with_timeout(pool: PgPool, call_timeout: StdDuration) -> Self {
        Self { pool, call_timeout }
    }

    /// Connects to the given database URL.
    pub async fn connect(url: &str, call_timeout: StdDuration) -> Result<Self> {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(call_timeout)
            .connect(url)
            .await
            .map_err(|e| StoreError::Unavailable(e.to_string()))?;
        Ok(Self::with_timeout(pool, call_timeout))
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    /// Bounds a store call with the request-scoped timeout.
    async fn timed<T>(&self, fut: impl Future<Output = Result<T>>) -> Result<T> {
        tokio::time::timeout(self.call_timeout, fut)
            .await
            .map_err(|_| StoreError::Timeout)?
    }

    fn row_to_session(row: &PgRow) -> Result<ShoppingSession> {
        Ok(ShoppingSession {
            id: SessionId::from_uuid(row.try_get::<Uuid, _>("id")?),
            created_at: row.try_get("created_at")?,
            expires_at: row.try_get("expires_at")?,
            owner: row.try_get("owner")?,
        })
    }

    fn row_to_reservation(row: &PgRow) -> Result<OrderReservation> {
        let status_raw: String = row.try_get("status")?;
        let status = ReservationStatus::from_str_opt(&status_raw)
            .ok_or_else(|| StoreError::Decode(format!("reservation status {status_raw:?}")))?;
        let payment_ref: Option<String> = row.try_get("payment_ref")?;

        Ok(OrderReservation {
            id: ReservationId::from_uuid(row.try_get::<Uuid, _>("id")?),
            sku: Sku::new(row.try_get::<String, _>("sku")?),
            session_id: SessionId::from_uuid(row.try_get::<Uuid, _>("session_id")?),
            quantity: row.try_get::<i32, _>("quantity")? as u32,
            status,
            expires_at: row.try_get("expires_at")?,
            payment_ref: payment_ref.map(PaymentRef::new),
        })
    }
}

#[async_trait]
impl SkuLedger for PostgresStore {
    async fn reserve(&self, sku: &Sku, quantity: u32) -> std::result::Result<(), LedgerError> {
        let result = self
            .timed(async {
                let result = sqlx::query(
                    "UPDATE skus SET inventory = inventory - $2 WHERE id = $1 AND inventory >= $2",
                )
                .bind(sku.as_str())
                .bind(quantity as i32)
                .execute(&self.pool)
                .await?;
                Ok(result.rows_affected())
            })
            .await?;

        if result == 0 {
            return Err(LedgerError::OutOfStock { sku: sku.clone() });
        }
        Ok(())
    }

    async fn release(&self, sku: &Sku, quantity: u32) -> std::result::Result<(), LedgerError> {
        self.timed(async {
            sqlx::query("UPDATE skus SET inventory = inventory + $2 WHERE id = $1")
                .bind(sku.as_str())
                .bind(quantity as i32)
                .execute(&self.pool)
                .await?;
            Ok(())
        })
        .await?;
        Ok(())
    }

    async fn on_hand(&self, sku: &Sku) -> std::result::Result<Option<u32>, LedgerError> {
        let inventory = self
            .timed(async {
                let inventory: Option<i32> =
                    sqlx::query_scalar("SELECT inventory FROM skus WHERE id = $1")
                        .bind(sku.as_str())
                        .fetch_optional(&self.pool)
                        .await?;
                Ok(inventory)
            })
            .await?;
        Ok(inventory.map(|qty| qty as u32))
    }
}

#[async_trait]
impl SessionStore for PostgresStore {
    async fn create_session(
        &self,
        now: DateTime<Utc>,
        ttl: Duration,
        owner: Option<Uuid>,
    ) -> Result<ShoppingSession> {
        let session = ShoppingSession::start(now, ttl, owner);
        self.timed(async {
            sqlx::query(
                r#"
                INSERT INTO shopping_sessions (id, created_at, expires_at, owner)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(session.id.as_uuid())
            .bind(session.created_at)
            .bind(session.expires_at)
            .bind(session.owner)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
        .await?;
        Ok(session)
    }

    async fn find_session(&self, id: SessionId) -> Result<Option<ShoppingSession>> {
        self.timed(async {
            let row = sqlx::query(
                "SELECT id, created_at, expires_at, owner FROM shopping_sessions WHERE id = $1",
            )
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await?;

            row.as_ref().map(Self::row_to_session).transpose()
        })
        .await
    }

    async fn touch_session(
        &self,
        id: SessionId,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<bool> {
        self.timed(async {
            let result =
                sqlx::query("UPDATE shopping_sessions SET expires_at = $2 WHERE id = $1")
                    .bind(id.as_uuid())
                    .bind(now + ttl)
                    .execute(&self.pool)
                    .await?;
            Ok(result.rows_affected() > 0)
        })
        .await
    }

    async fn upsert_cart_item(&self, item: &CartItem) -> Result<()> {
        self.timed(async {
            sqlx::query(
                r#"
                INSERT INTO cart_items (session_id, sku, quantity)
                VALUES ($1, $2, $3)
                ON CONFLICT (session_id, sku) DO UPDATE SET quantity = EXCLUDED.quantity
                "#,
            )
            .bind(item.session_id.as_uuid())
            .bind(item.sku.as_str())
            .bind(item.quantity as i32)
            .execute(&self.pool)
            .await?;
            Ok(())
        })
        .await
    }

    async fn delete_cart_item(&self, session_id: SessionId, sku: &Sku) -> Result<()> {
        self.timed(async {
            sqlx::query("DELETE FROM cart_items WHERE session_id = $1 AND sku = $2")
                .bind(session_id.as_uuid())
                .bind(sku.as_str())
                .execute(&self.pool)
                .await?;
            Ok(())
        })
        .await
    }

    async fn cart_items(&self, session_id: SessionId) -> Result<Vec<CartItem>> {
        self.timed(async {
            let rows = sqlx::query(
                "SELECT session_id, sku, quantity FROM cart_items WHERE session_id = $1 ORDER BY sku",
            )
            .bind(session_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;

            rows.iter()
                .map(|row| {
                    Ok(CartItem {
                        session_id: SessionId::from_uuid(row.try_get::<Uuid, _>("session_id")?),
                        sku: Sku::new(row.try_get::<String, _>("sku")?),
                        quantity: row.try_get::<i32, _>("quantity")? as u32,
                    })
                })
                .collect()
        })
        .await
    }

    async fn expired_sessions(&self, now: DateTime<Utc>) -> Result<Vec<SessionId>> {
        self.timed(async {
            let ids: Vec<Uuid> =
                sqlx::query_scalar("SELECT id FROM shopping_sessions WHERE expires_at <= $1")
                    .bind(now)
                    .fetch_all(&self.pool)
                    .await?;
            Ok(ids.into_iter().map(SessionId::from_uuid).collect())
        })
        .await
    }

    async fn delete_session(&self, id: SessionId) -> Result<()> {
        // Cascade made explicit: cart items first, then the session row.
        self.timed(async {
            let mut tx = self.pool.begin().await?;
            sqlx::query("DELETE FROM cart_items WHERE session_id = $1")
                .bind(id.as_uuid())
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM shopping_sessions WHERE id = $1")
                .bind(id.as_uuid())
                .execute(&mut *tx)
                .await?;
            tx.commit().await?;
            Ok(())
        })
        .await
    }
}

#[async_trait]
impl ReservationStore for PostgresStore {
    async fn find_pending(
        &self,
        session_id: SessionId,
        sku: &Sku,
    ) -> Result<Option<OrderReservation>> {
        self.timed(async {
            let row = sqlx::query(
                r#"
                SELECT id, sku, session_id, quantity, status, expires_at, payment_ref
                FROM order_reservations
                WHERE session_id = $1 AND sku = $2 AND status = 'PENDING'
                "#,
            )
            .bind(session_id.as_uuid())
            .bind(sku.as_str())
            .fetch_optional(&self.pool)
            .await?;

            row.as_ref().map(Self::row_to_reservation).transpose()
        })
        .await
    }

    async fn put(&self, reservation: &OrderReservation) -> Result<()> {
        self.timed(async {
            sqlx::query(
                r#"
                INSERT INTO order_reservations
                    (id, sku, session_id, quantity, status, expires_at, payment_ref)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                ON CONFLICT (id) DO UPDATE SET
                    quantity = EXCLUDED.quantity,
                    status = EXCLUDED.status,
                    expires_at = EXCLUDED.expires_at,
                    payment_ref = EXCLUDED.payment_ref
                "#,
            )
            .bind(reservation.id.as_uuid())
            .bind(reservation.sku.as_str())
            .bind(reservation.session_id.as_uuid())
            .bind(reservation.quantity as i32)
            .bind(reservation.status.as_str())
            .bind(reservation.expires_at)
            .bind(reservation.payment_ref.as_ref().map(|r| r.as_str()))
            .execute(&self.pool)
            .await?;
            Ok(())
        })
        .await
    }

    async fn delete_pending(&self, id: ReservationId) -> Result<bool> {
        self.timed(async {
            let result = sqlx::query(
                "DELETE FROM order_reservations WHERE id = $1 AND status = 'PENDING'",
            )
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await?;
            Ok(result.rows_affected() > 0)
        })
        .await
    }

    async fn expired_pending(&self, now: DateTime<Utc>) -> Result<Vec<OrderReservation>> {
        self.timed(async {
            let rows = sqlx::query(
                r#"
                SELECT id, sku, session_id, quantity, status, expires_at, payment_ref
                FROM order_reservations
                WHERE status = 'PENDING' AND expires_at <= $1
                "#,
            )
            .bind(now)
            .fetch_all(&self.pool)
            .await?;

            rows.iter().map(Self::row_to_reservation).collect()
        })
        .await
    }

    async fn pending_for_session(&self, session_id: SessionId) -> Result<Vec<OrderReservation>> {
        self.timed(async {
            let rows = sqlx::query(
                r#"
                SELECT id, sku, session_id, quantity, status, expires_at, payment_ref
                FROM order_reservations
                WHERE session_id = $1 AND status = 'PENDING'
                "#,
            )
            .bind(session_id.as_uuid())
            .fetch_all(&self.pool)
            .await?;

            rows.iter().map(Self::row_to_reservation).collect()
        })
        .await
    }

    async fn pending_total(&self, sku: &Sku) -> Result<u32> {
        self.timed(async {
            let total: Option<i64> = sqlx::query_scalar(
                "SELECT SUM(quantity) FROM order_reservations WHERE sku = $1 AND status = 'PENDING'",
            )
            .bind(sku.as_str())
            .fetch_one(&self.pool)
            .await?;
            Ok(total.unwrap_or(0) as u32)
        })
        .await
    }
}

#[async_trait]
impl ReferenceStore for PostgresStore {
    async fn unit_price(&self, sku: &Sku, currency: Currency) -> Result<Option<Money>> {
        self.timed(async {
            let price: Option<Decimal> = sqlx::query_scalar(
                "SELECT unit_price FROM sku_pricing WHERE sku = $1 AND currency = $2",
            )
            .bind(sku.as_str())
            .bind(currency.as_str())
            .fetch_optional(&self.pool)
            .await?;
            Ok(price.map(Money::new))
        })
        .await
    }

    async fn unit_weight(&self, sku: &Sku) -> Result<Option<Decimal>> {
        self.timed(async {
            let weight: Option<Decimal> =
                sqlx::query_scalar("SELECT weight_kg FROM sku_weights WHERE sku = $1")
                    .bind(sku.as_str())
                    .fetch_optional(&self.pool)
                    .await?;
            Ok(weight)
        })
        .await
    }

    async fn shipping_for(&self, country: &str) -> Result<Option<ShippingSetting>> {
        self.timed(async {
            let row = sqlx::query(
                "SELECT country, base_price, price_per_kg FROM shipping_settings WHERE country = $1",
            )
            .bind(country)
            .fetch_optional(&self.pool)
            .await?;

            row.map(|row| {
                Ok(ShippingSetting {
                    country: row.try_get("country")?,
                    base_price: Money::new(row.try_get::<Decimal, _>("base_price")?),
                    price_per_kg: Money::new(row.try_get::<Decimal, _>("price_per_kg")?),
                })
            })
            .transpose()
        })
        .await
    }

    async fn active_tax(&self) -> Result<Option<TaxSetting>> {
        self.timed(async {
            let row =
                sqlx::query("SELECT name, rate FROM tax_settings WHERE active = TRUE LIMIT 1")
                    .fetch_optional(&self.pool)
                    .await?;

            row.map(|row| {
                Ok(TaxSetting {
                    name: row.try_get("name")?,
                    rate: row.try_get("rate")?,
                })
            })
            .transpose()
        })
        .await
    }
}

#[async_trait]
impl OrderStore for PostgresStore {
    async fn payment_exists(&self, payment_ref: &PaymentRef) -> Result<bool> {
        self.timed(async {
            let exists: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM payment_details WHERE provider_ref = $1)",
            )
            .bind(payment_ref.as_str())
            .fetch_one(&self.pool)
            .await?;
            Ok(exists)
        })
        .await
    }

    async fn record_order(&self, order: &ConfirmedOrder) -> Result<()> {
        self.timed(async {
            let mut tx = self.pool.begin().await?;

            // Conditional status transitions first: each UPDATE takes the row
            // lock and checks the row is still PENDING. Zero affected rows
            // means the scheduler (or another webhook delivery) got there
            // first; the early return rolls the transaction back.
            for id in &order.reservations {
                let result = sqlx::query(
                    r#"
                    UPDATE order_reservations
                    SET status = 'CONFIRMED', payment_ref = $2
                    WHERE id = $1 AND status = 'PENDING'
                    "#,
                )
                .bind(id.as_uuid())
                .bind(order.payment.payment_ref.as_str())
                .execute(&mut *tx)
                .await?;

                if result.rows_affected() == 0 {
                    return Err(StoreError::Conflict(format!(
                        "reservation {id} is no longer pending"
                    )));
                }
            }

            sqlx::query(
                r#"
                INSERT INTO payment_details
                    (provider_ref, amount_minor, currency, provider_status, created_at)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(order.payment.payment_ref.as_str())
            .bind(order.payment.amount_minor)
            .bind(order.payment.currency.as_str())
            .bind(&order.payment.provider_status)
            .bind(order.payment.created_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| {
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some("payment_details_pkey")
                {
                    return StoreError::Conflict(format!(
                        "payment {} already recorded",
                        order.payment.payment_ref
                    ));
                }
                StoreError::Database(e)
            })?;

            sqlx::query(
                r#"
                INSERT INTO addresses (payment_ref, street, city, state, country)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(order.address.payment_ref.as_str())
            .bind(&order.address.street)
            .bind(&order.address.city)
            .bind(&order.address.state)
            .bind(&order.address.country)
            .execute(&mut *tx)
            .await?;

            sqlx::query(
                r#"
                INSERT INTO card_authorizations
                    (payment_ref, authorization_code, card_type, last4, bank)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(order.authorization.payment_ref.as_str())
            .bind(&order.authorization.authorization_code)
            .bind(&order.authorization.card_type)
            .bind(&order.authorization.last4)
            .bind(&order.authorization.bank)
            .execute(&mut *tx)
            .await?;

            for detail in &order.details {
                sqlx::query(
                    r#"
                    INSERT INTO order_details (id, payment_ref, sku, quantity)
                    VALUES ($1, $2, $3, $4)
                    "#,
                )
                .bind(detail.id)
                .bind(detail.payment_ref.as_str())
                .bind(detail.sku.as_str())
                .bind(detail.quantity as i32)
                .execute(&mut *tx)
                .await?;
            }

            sqlx::query("DELETE FROM cart_items WHERE session_id = $1")
                .bind(order.session_id.as_uuid())
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM shopping_sessions WHERE id = $1")
                .bind(order.session_id.as_uuid())
                .execute(&mut *tx)
                .await?;

            tx.commit().await?;
            Ok(())
        })
        .await
    }

    async fn order_details(&self, payment_ref: &PaymentRef) -> Result<Vec<OrderDetail>> {
        self.timed(async {
            let rows = sqlx::query(
                "SELECT id, payment_ref, sku, quantity FROM order_details WHERE payment_ref = $1",
            )
            .bind(payment_ref.as_str())
            .fetch_all(&self.pool)
            .await?;

            rows.iter()
                .map(|row| {
                    Ok(OrderDetail {
                        id: row.try_get("id")?,
                        payment_ref: PaymentRef::new(row.try_get::<String, _>("payment_ref")?),
                        sku: Sku::new(row.try_get::<String, _>("sku")?),
                        quantity: row.try_get::<i32, _>("quantity")? as u32,
                    })
                })
                .collect()
        })
        .await
    }
}
