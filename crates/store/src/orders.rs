//! The confirmation write side.

use async_trait::async_trait;

use common::PaymentRef;
use domain::{ConfirmedOrder, OrderDetail};

use crate::error::Result;

/// Storage for finalized orders and their payment artifacts.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Returns true if a payment with this provider reference was already
    /// recorded. Webhook handlers dedupe on this before transitioning state.
    async fn payment_exists(&self, payment_ref: &PaymentRef) -> Result<bool>;

    /// Records a confirmed checkout in one all-or-nothing transaction:
    /// every listed reservation transitions `PENDING → CONFIRMED`, the
    /// payment detail with its 1:1 address and card authorization rows and
    /// the per-item order details are inserted, and the consumed cart items
    /// and session are deleted.
    ///
    /// Fails with [`StoreError::Conflict`] when any listed reservation is no
    /// longer pending or the payment reference was already recorded; the
    /// whole write rolls back and the reservations stay `PENDING`.
    ///
    /// [`StoreError::Conflict`]: crate::StoreError::Conflict
    async fn record_order(&self, order: &ConfirmedOrder) -> Result<()>;

    /// Returns the order lines recorded under a payment reference.
    async fn order_details(&self, payment_ref: &PaymentRef) -> Result<Vec<OrderDetail>>;
}
