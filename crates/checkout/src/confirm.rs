//! Payment confirmation: reconciles a provider callback against held stock.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use common::{CartCookie, Currency, PaymentRef, ReservationId, SessionId, Sku};
use domain::{
    Address, CardAuthorization, ConfirmedOrder, OrderConfirmation, OrderDetail, OrderReservation,
    PaymentDetail,
};
use store::{OrderStore, ReservationStore, SessionStore, SkuLedger, StoreError};

use crate::error::{CheckoutError, Result};

/// One charged line from the provider payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChargedItem {
    pub sku: Sku,
    pub quantity: u32,
}

/// Card authorization block from the provider payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationPayload {
    pub authorization_code: String,
    pub card_type: String,
    pub last4: String,
    pub bank: String,
}

/// Shipping address block from the provider payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressPayload {
    pub street: String,
    pub city: String,
    pub state: String,
    pub country: String,
}

/// The provider's charge-outcome callback, as posted to the webhook.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentNotice {
    /// Provider charge reference; dedupe key.
    pub reference: PaymentRef,
    /// The cart cookie token the charge was initiated with.
    pub cart_token: String,
    /// Charged amount in the provider's minor unit.
    pub amount_minor: i64,
    /// Settlement currency.
    pub currency: Currency,
    /// Provider status string, e.g. `"success"`.
    pub provider_status: String,
    /// The charged SKUs and quantities.
    pub items: Vec<ChargedItem>,
    /// Card authorization detail.
    pub authorization: AuthorizationPayload,
    /// Shipping address collected by the provider page.
    pub shipping_address: AddressPayload,
}

/// Outcome of processing a payment notice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// Reservations transitioned and the order was recorded.
    Confirmed(OrderConfirmation),
    /// This provider reference was already recorded; nothing was done.
    AlreadyProcessed,
}

/// Consumes provider callbacks, transitioning matching holds to `CONFIRMED`
/// and writing the order artifacts in one transaction.
pub struct PaymentConfirmation<S> {
    store: S,
    hold_window: chrono::Duration,
}

impl<S> PaymentConfirmation<S>
where
    S: SkuLedger + SessionStore + ReservationStore + OrderStore,
{
    /// Creates a confirmation handler. `hold_window` bounds the life of any
    /// replacement hold taken on the conflict path.
    pub fn new(store: S, hold_window: chrono::Duration) -> Self {
        Self { store, hold_window }
    }

    /// Processes one provider callback.
    ///
    /// Idempotent on the provider reference: a duplicate delivery returns
    /// [`ConfirmOutcome::AlreadyProcessed`] without touching state.
    ///
    /// A charged item whose hold the scheduler already released is never
    /// re-decremented blindly. The handler attempts a fresh reserve; if the
    /// stock is gone, it surfaces
    /// [`CheckoutError::ReservationExpiredDuringPayment`] so the charge can
    /// be refunded instead of oversold.
    #[tracing::instrument(skip(self, notice), fields(reference = %notice.reference))]
    pub async fn confirm(&self, notice: &PaymentNotice, now: DateTime<Utc>) -> Result<ConfirmOutcome> {
        if notice.items.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }
        if self.store.payment_exists(&notice.reference).await? {
            tracing::info!("duplicate payment notice ignored");
            return Ok(ConfirmOutcome::AlreadyProcessed);
        }

        let cookie = CartCookie::parse(&notice.cart_token)
            .map_err(|_| CheckoutError::SessionExpired)?;
        let session_id = cookie.session_id;

        // Match every charged line against a pending hold, re-securing stock
        // for whatever the scheduler already reclaimed.
        let mut reservation_ids = Vec::with_capacity(notice.items.len());
        let mut replacement_holds: Vec<OrderReservation> = Vec::new();
        for item in &notice.items {
            let existing = self.store.find_pending(session_id, &item.sku).await?;
            match existing {
                Some(held) if held.quantity == item.quantity => {
                    reservation_ids.push(held.id);
                }
                other => {
                    match self
                        .resecure(session_id, item, other.as_ref(), now)
                        .await
                    {
                        Ok(hold) => {
                            reservation_ids.push(hold.id);
                            replacement_holds.push(hold);
                        }
                        Err(CheckoutError::OutOfStock { sku }) => {
                            self.unwind_replacements(&replacement_holds).await;
                            metrics::counter!("payment_conflicts_total").increment(1);
                            tracing::warn!(
                                %sku,
                                "charged item could not be matched to held stock; flagging for refund"
                            );
                            return Err(CheckoutError::ReservationExpiredDuringPayment {
                                reference: notice.reference.to_string(),
                            });
                        }
                        Err(err) => {
                            // Infrastructure failure: release what we took and
                            // let the provider retry the delivery.
                            self.unwind_replacements(&replacement_holds).await;
                            return Err(err);
                        }
                    }
                }
            }
        }

        let order = self.build_order(session_id, &reservation_ids, notice, now);
        match self.store.record_order(&order).await {
            Ok(()) => {
                metrics::counter!("orders_confirmed_total").increment(1);
                Ok(ConfirmOutcome::Confirmed(OrderConfirmation {
                    payment_ref: notice.reference.clone(),
                    details: order.details,
                }))
            }
            Err(StoreError::Conflict(reason)) => {
                // A scheduler sweep consumed one of the holds between the
                // match above and the transaction. Everything rolled back;
                // replacement holds will lapse on their own.
                metrics::counter!("payment_conflicts_total").increment(1);
                tracing::warn!(%reason, "confirmation lost the expiry race");
                Err(CheckoutError::ReservationExpiredDuringPayment {
                    reference: notice.reference.to_string(),
                })
            }
            Err(err) => Err(err.into()),
        }
    }

    /// Re-secures stock for a charged item whose hold is missing or holds
    /// the wrong quantity.
    async fn resecure(
        &self,
        session_id: SessionId,
        item: &ChargedItem,
        stale: Option<&OrderReservation>,
        now: DateTime<Utc>,
    ) -> Result<OrderReservation> {
        // A stale hold with the wrong quantity still owns its units; retire
        // it first so they are not counted twice.
        if let Some(stale) = stale
            && self.store.delete_pending(stale.id).await?
        {
            self.store.release(&stale.sku, stale.quantity).await?;
        }

        self.store.reserve(&item.sku, item.quantity).await?;
        let hold = OrderReservation::hold(
            session_id,
            item.sku.clone(),
            item.quantity,
            now + self.hold_window,
        );
        self.store.put(&hold).await?;
        Ok(hold)
    }

    /// Best-effort release of replacement holds taken before a conflict.
    async fn unwind_replacements(&self, holds: &[OrderReservation]) {
        for hold in holds {
            match self.store.delete_pending(hold.id).await {
                Ok(true) => {
                    if let Err(err) = self.store.release(&hold.sku, hold.quantity).await {
                        tracing::warn!(sku = %hold.sku, error = %err, "failed to release replacement hold");
                    }
                }
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(sku = %hold.sku, error = %err, "failed to retire replacement hold");
                }
            }
        }
    }

    fn build_order(
        &self,
        session_id: SessionId,
        reservation_ids: &[ReservationId],
        notice: &PaymentNotice,
        now: DateTime<Utc>,
    ) -> ConfirmedOrder {
        let payment_ref = notice.reference.clone();
        let details = notice
            .items
            .iter()
            .map(|item| OrderDetail::new(payment_ref.clone(), item.sku.clone(), item.quantity))
            .collect();

        ConfirmedOrder {
            session_id,
            reservations: reservation_ids.to_vec(),
            payment: PaymentDetail {
                payment_ref: payment_ref.clone(),
                amount_minor: notice.amount_minor,
                currency: notice.currency,
                provider_status: notice.provider_status.clone(),
                created_at: now,
            },
            address: Address {
                payment_ref: payment_ref.clone(),
                street: notice.shipping_address.street.clone(),
                city: notice.shipping_address.city.clone(),
                state: notice.shipping_address.state.clone(),
                country: notice.shipping_address.country.clone(),
            },
            authorization: CardAuthorization {
                payment_ref,
                authorization_code: notice.authorization.authorization_code.clone(),
                card_type: notice.authorization.card_type.clone(),
                last4: notice.authorization.last4.clone(),
                bank: notice.authorization.bank.clone(),
            },
            details,
        }
    }
}
