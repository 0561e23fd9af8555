//! Shopping sessions and cart line items.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use common::{CartCookie, SessionId, Sku};

/// A shopping session, addressed by the opaque cart cookie.
///
/// Expiry is rolling: any cart activity inside the grace window pushes it
/// forward. Deletion (on expiry or successful checkout) cascades to the
/// session's cart items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShoppingSession {
    /// Session identifier, carried in the cart cookie.
    pub id: SessionId,
    /// When the session was first created.
    pub created_at: DateTime<Utc>,
    /// When the session lapses unless extended.
    pub expires_at: DateTime<Utc>,
    /// Authenticated owner, if any; `None` for anonymous shoppers.
    pub owner: Option<Uuid>,
}

impl ShoppingSession {
    /// Creates a session starting at `now` with the given time-to-live.
    pub fn start(now: DateTime<Utc>, ttl: Duration, owner: Option<Uuid>) -> Self {
        Self {
            id: SessionId::new(),
            created_at: now,
            expires_at: now + ttl,
            owner,
        }
    }

    /// Returns true if the session has lapsed at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }

    /// Pushes the rolling expiry forward to `now + ttl`.
    pub fn extend(&mut self, now: DateTime<Utc>, ttl: Duration) {
        self.expires_at = now + ttl;
    }

    /// Returns the cookie for this session's current expiry.
    pub fn cookie(&self) -> CartCookie {
        CartCookie::new(self.id, self.expires_at)
    }
}

/// One cart line: a SKU and quantity inside a session.
///
/// Unique per (session, SKU). The quantity is re-validated against live
/// inventory at reservation time, not trusted from insert time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    /// Owning session.
    pub session_id: SessionId,
    /// The SKU in the cart.
    pub sku: Sku,
    /// Desired quantity.
    pub quantity: u32,
}

impl CartItem {
    /// Creates a cart line.
    pub fn new(session_id: SessionId, sku: Sku, quantity: u32) -> Self {
        Self {
            session_id,
            sku,
            quantity,
        }
    }
}
