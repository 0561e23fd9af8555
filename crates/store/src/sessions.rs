//! Shopping session and cart item storage.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use common::{SessionId, Sku};
use domain::{CartItem, ShoppingSession};

use crate::error::Result;

/// Storage for shopping sessions and their cart line items.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Creates a new session expiring at `now + ttl`.
    async fn create_session(
        &self,
        now: DateTime<Utc>,
        ttl: Duration,
        owner: Option<Uuid>,
    ) -> Result<ShoppingSession>;

    /// Looks up a session by ID.
    async fn find_session(&self, id: SessionId) -> Result<Option<ShoppingSession>>;

    /// Pushes a session's rolling expiry to `now + ttl`.
    ///
    /// Returns false if the session no longer exists.
    async fn touch_session(
        &self,
        id: SessionId,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<bool>;

    /// Inserts or replaces the cart line for (session, SKU).
    async fn upsert_cart_item(&self, item: &CartItem) -> Result<()>;

    /// Removes the cart line for (session, SKU), if present.
    async fn delete_cart_item(&self, session_id: SessionId, sku: &Sku) -> Result<()>;

    /// Returns all cart lines for a session.
    async fn cart_items(&self, session_id: SessionId) -> Result<Vec<CartItem>>;

    /// Returns the IDs of sessions whose expiry is at or before `now`.
    async fn expired_sessions(&self, now: DateTime<Utc>) -> Result<Vec<SessionId>>;

    /// Deletes a session and, cascading, its cart items.
    async fn delete_session(&self, id: SessionId) -> Result<()>;
}
