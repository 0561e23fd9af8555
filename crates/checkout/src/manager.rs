//! Reservation manager: cart mutations and their inventory holds.

use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

use common::{CartCookie, Sku};
use domain::{CartItem, OrderReservation, ShoppingSession};
use store::{ReservationStore, SessionStore, SkuLedger};

use crate::error::{CheckoutError, Result};

/// Coordinates the SKU ledger, session store, and reservation rows so that
/// holds and inventory always reconcile.
///
/// Every held unit is accounted for exactly once: extension of an existing
/// hold releases the old quantity before reserving the new one, and the
/// cancel path releases only when it wins the delete against a concurrent
/// scheduler expiry.
pub struct ReservationManager<S> {
    store: S,
    hold_window: Duration,
    session_ttl: Duration,
}

impl<S> ReservationManager<S>
where
    S: SkuLedger + SessionStore + ReservationStore,
{
    /// Creates a manager with the given hold window and session TTL.
    pub fn new(store: S, hold_window: Duration, session_ttl: Duration) -> Self {
        Self {
            store,
            hold_window,
            session_ttl,
        }
    }

    /// Starts a fresh shopping session (no cookie presented yet).
    #[tracing::instrument(skip(self))]
    pub async fn start_session(
        &self,
        now: DateTime<Utc>,
        owner: Option<Uuid>,
    ) -> Result<ShoppingSession> {
        let session = self.store.create_session(now, self.session_ttl, owner).await?;
        tracing::debug!(session_id = %session.id, "started shopping session");
        Ok(session)
    }

    /// Resolves a cart cookie token to a live session.
    ///
    /// A malformed token, an unknown session, or a lapsed expiry all surface
    /// as [`CheckoutError::SessionExpired`]: the caller starts over.
    pub async fn resolve_session(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<ShoppingSession> {
        let cookie = CartCookie::parse(token).map_err(|_| CheckoutError::SessionExpired)?;
        let session = self
            .store
            .find_session(cookie.session_id)
            .await?
            .ok_or(CheckoutError::SessionExpired)?;
        if session.is_expired(now) {
            return Err(CheckoutError::SessionExpired);
        }
        Ok(session)
    }

    /// Adds a SKU to the cart, holding its units in the ledger.
    ///
    /// Re-adding a SKU already in the cart refreshes the existing hold
    /// (quantity replaced, expiry pushed forward) rather than duplicating
    /// it. Returns the refreshed cart cookie.
    #[tracing::instrument(skip(self, token))]
    pub async fn add_to_cart(
        &self,
        token: &str,
        sku: Sku,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> Result<CartCookie> {
        if quantity == 0 {
            return Err(CheckoutError::InvalidQuantity { quantity });
        }

        let mut session = self.resolve_session(token, now).await?;

        match self.store.find_pending(session.id, &sku).await? {
            Some(mut held) => {
                // Extension: give the old quantity back before taking the
                // new one, so the ledger only ever reflects the net hold.
                self.store.release(&sku, held.quantity).await?;
                if let Err(err) = self.store.reserve(&sku, quantity).await {
                    self.restore_prior_hold(&held, &err).await?;
                    return Err(err.into());
                }
                held.refresh(quantity, now + self.hold_window);
                self.store.put(&held).await?;
            }
            None => {
                self.store.reserve(&sku, quantity).await?;
                let hold =
                    OrderReservation::hold(session.id, sku.clone(), quantity, now + self.hold_window);
                self.store.put(&hold).await?;
            }
        }

        self.store
            .upsert_cart_item(&CartItem::new(session.id, sku, quantity))
            .await?;

        session.extend(now, self.session_ttl);
        self.store
            .touch_session(session.id, now, self.session_ttl)
            .await?;

        metrics::counter!("cart_adds_total").increment(1);
        Ok(session.cookie())
    }

    /// Removes a SKU from the cart, returning its held units to the ledger.
    ///
    /// Mutually exclusive with a concurrent scheduler expiry of the same
    /// hold: only the caller that wins the conditional delete releases the
    /// quantity, so inventory is restored exactly once.
    #[tracing::instrument(skip(self, token))]
    pub async fn cancel_hold(&self, token: &str, sku: &Sku, now: DateTime<Utc>) -> Result<()> {
        let session = self.resolve_session(token, now).await?;

        if let Some(held) = self.store.find_pending(session.id, sku).await?
            && self.store.delete_pending(held.id).await?
        {
            self.store.release(sku, held.quantity).await?;
            metrics::counter!("cart_removes_total").increment(1);
        }

        self.store.delete_cart_item(session.id, sku).await?;
        Ok(())
    }

    /// Returns the session's current cart lines.
    pub async fn cart(&self, token: &str, now: DateTime<Utc>) -> Result<Vec<CartItem>> {
        let session = self.resolve_session(token, now).await?;
        Ok(self.store.cart_items(session.id).await?)
    }

    /// Puts a failed extension back the way it was.
    ///
    /// The old quantity was already released when the fresh reserve failed.
    /// Re-reserving it normally succeeds; if a concurrent shopper grabbed
    /// the units in the gap, the hold can no longer be honored and its row
    /// and cart line are dropped.
    async fn restore_prior_hold(
        &self,
        held: &OrderReservation,
        cause: &store::LedgerError,
    ) -> Result<()> {
        if self.store.reserve(&held.sku, held.quantity).await.is_ok() {
            return Ok(());
        }

        tracing::warn!(
            reservation_id = %held.id,
            sku = %held.sku,
            %cause,
            "prior hold lost while extending; dropping reservation"
        );
        self.store.delete_pending(held.id).await?;
        self.store
            .delete_cart_item(held.session_id, &held.sku)
            .await?;
        Ok(())
    }
}
