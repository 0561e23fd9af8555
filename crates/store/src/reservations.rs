//! Reservation row storage.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use common::{ReservationId, SessionId, Sku};
use domain::OrderReservation;

use crate::error::Result;

/// Storage for inventory holds.
///
/// The cancel/expire race is resolved here: [`delete_pending`] deletes a row
/// only while it is still `PENDING` and reports whether it did, so whichever
/// caller loses the race sees `false` and must treat its release as a no-op.
///
/// [`delete_pending`]: ReservationStore::delete_pending
#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Finds the pending hold for (session, SKU), if one exists.
    async fn find_pending(
        &self,
        session_id: SessionId,
        sku: &Sku,
    ) -> Result<Option<OrderReservation>>;

    /// Inserts a new hold or replaces an existing row with the same ID
    /// (extension refreshes quantity and expiry; it never duplicates).
    async fn put(&self, reservation: &OrderReservation) -> Result<()>;

    /// Deletes a hold if it is still pending. Returns whether a row was
    /// deleted; `false` means another actor already consumed or removed it.
    async fn delete_pending(&self, id: ReservationId) -> Result<bool>;

    /// Returns all pending holds whose expiry is at or before `now`.
    async fn expired_pending(&self, now: DateTime<Utc>) -> Result<Vec<OrderReservation>>;

    /// Returns all pending holds for a session.
    async fn pending_for_session(&self, session_id: SessionId) -> Result<Vec<OrderReservation>>;

    /// Total quantity currently held pending for a SKU.
    async fn pending_total(&self, sku: &Sku) -> Result<u32>;
}
