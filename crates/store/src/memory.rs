//! In-memory store implementation.
//!
//! Backs the test suites and single-process runs with the same interface as
//! the PostgreSQL implementation. All state sits behind one async mutex, so
//! every operation, including the multi-row confirmation write, is atomic
//! with respect to every other.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use uuid::Uuid;

use common::{Currency, Money, PaymentRef, ReservationId, SessionId, Sku};
use domain::{
    Address, CardAuthorization, CartItem, ConfirmedOrder, OrderDetail, OrderReservation,
    PaymentDetail, ReservationStatus, ShoppingSession,
};

use crate::error::{Result, StoreError};
use crate::ledger::{LedgerError, SkuLedger};
use crate::orders::OrderStore;
use crate::reference::{ReferenceStore, ShippingSetting, TaxSetting};
use crate::reservations::ReservationStore;
use crate::sessions::SessionStore;

#[derive(Debug, Default)]
struct MemoryState {
    inventory: HashMap<Sku, u32>,
    pricing: HashMap<(Sku, Currency), Money>,
    weights: HashMap<Sku, Decimal>,
    shipping: HashMap<String, ShippingSetting>,
    tax: Option<TaxSetting>,
    sessions: HashMap<SessionId, ShoppingSession>,
    cart_items: HashMap<(SessionId, Sku), CartItem>,
    reservations: HashMap<ReservationId, OrderReservation>,
    payments: HashMap<PaymentRef, PaymentDetail>,
    addresses: HashMap<PaymentRef, Address>,
    authorizations: HashMap<PaymentRef, CardAuthorization>,
    order_details: Vec<OrderDetail>,
}

/// In-memory backend implementing every storage trait.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a SKU with the given sellable quantity.
    pub async fn seed_sku(&self, sku: Sku, quantity: u32) {
        self.state.lock().await.inventory.insert(sku, quantity);
    }

    /// Sets the unit price of a SKU in one currency.
    pub async fn seed_price(&self, sku: Sku, currency: Currency, price: Money) {
        self.state.lock().await.pricing.insert((sku, currency), price);
    }

    /// Sets the unit weight of a SKU in kilograms.
    pub async fn seed_weight(&self, sku: Sku, weight_kg: Decimal) {
        self.state.lock().await.weights.insert(sku, weight_kg);
    }

    /// Inserts or replaces a shipping setting row.
    pub async fn seed_shipping(&self, setting: ShippingSetting) {
        self.state
            .lock()
            .await
            .shipping
            .insert(setting.country.clone(), setting);
    }

    /// Sets the active tax record.
    pub async fn set_active_tax(&self, tax: TaxSetting) {
        self.state.lock().await.tax = Some(tax);
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        self.state.lock().await.sessions.len()
    }

    /// Number of reservation rows, across all statuses.
    pub async fn reservation_count(&self) -> usize {
        self.state.lock().await.reservations.len()
    }
}

#[async_trait]
impl SkuLedger for MemoryStore {
    async fn reserve(&self, sku: &Sku, quantity: u32) -> std::result::Result<(), LedgerError> {
        let mut state = self.state.lock().await;
        match state.inventory.get_mut(sku) {
            Some(on_hand) if *on_hand >= quantity => {
                *on_hand -= quantity;
                Ok(())
            }
            _ => Err(LedgerError::OutOfStock { sku: sku.clone() }),
        }
    }

    async fn release(&self, sku: &Sku, quantity: u32) -> std::result::Result<(), LedgerError> {
        let mut state = self.state.lock().await;
        if let Some(on_hand) = state.inventory.get_mut(sku) {
            *on_hand += quantity;
        }
        Ok(())
    }

    async fn on_hand(&self, sku: &Sku) -> std::result::Result<Option<u32>, LedgerError> {
        Ok(self.state.lock().await.inventory.get(sku).copied())
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn create_session(
        &self,
        now: DateTime<Utc>,
        ttl: Duration,
        owner: Option<Uuid>,
    ) -> Result<ShoppingSession> {
        let session = ShoppingSession::start(now, ttl, owner);
        self.state
            .lock()
            .await
            .sessions
            .insert(session.id, session.clone());
        Ok(session)
    }

    async fn find_session(&self, id: SessionId) -> Result<Option<ShoppingSession>> {
        Ok(self.state.lock().await.sessions.get(&id).cloned())
    }

    async fn touch_session(
        &self,
        id: SessionId,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Result<bool> {
        let mut state = self.state.lock().await;
        match state.sessions.get_mut(&id) {
            Some(session) => {
                session.extend(now, ttl);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn upsert_cart_item(&self, item: &CartItem) -> Result<()> {
        self.state
            .lock()
            .await
            .cart_items
            .insert((item.session_id, item.sku.clone()), item.clone());
        Ok(())
    }

    async fn delete_cart_item(&self, session_id: SessionId, sku: &Sku) -> Result<()> {
        self.state
            .lock()
            .await
            .cart_items
            .remove(&(session_id, sku.clone()));
        Ok(())
    }

    async fn cart_items(&self, session_id: SessionId) -> Result<Vec<CartItem>> {
        let state = self.state.lock().await;
        let mut items: Vec<CartItem> = state
            .cart_items
            .values()
            .filter(|item| item.session_id == session_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| a.sku.as_str().cmp(b.sku.as_str()));
        Ok(items)
    }

    async fn expired_sessions(&self, now: DateTime<Utc>) -> Result<Vec<SessionId>> {
        let state = self.state.lock().await;
        Ok(state
            .sessions
            .values()
            .filter(|session| session.is_expired(now))
            .map(|session| session.id)
            .collect())
    }

    async fn delete_session(&self, id: SessionId) -> Result<()> {
        let mut state = self.state.lock().await;
        state.cart_items.retain(|(session_id, _), _| *session_id != id);
        state.sessions.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl ReservationStore for MemoryStore {
    async fn find_pending(
        &self,
        session_id: SessionId,
        sku: &Sku,
    ) -> Result<Option<OrderReservation>> {
        let state = self.state.lock().await;
        Ok(state
            .reservations
            .values()
            .find(|r| {
                r.session_id == session_id
                    && &r.sku == sku
                    && r.status == ReservationStatus::Pending
            })
            .cloned())
    }

    async fn put(&self, reservation: &OrderReservation) -> Result<()> {
        self.state
            .lock()
            .await
            .reservations
            .insert(reservation.id, reservation.clone());
        Ok(())
    }

    async fn delete_pending(&self, id: ReservationId) -> Result<bool> {
        let mut state = self.state.lock().await;
        match state.reservations.get(&id) {
            Some(r) if r.status == ReservationStatus::Pending => {
                state.reservations.remove(&id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn expired_pending(&self, now: DateTime<Utc>) -> Result<Vec<OrderReservation>> {
        let state = self.state.lock().await;
        Ok(state
            .reservations
            .values()
            .filter(|r| r.is_expired(now))
            .cloned()
            .collect())
    }

    async fn pending_for_session(&self, session_id: SessionId) -> Result<Vec<OrderReservation>> {
        let state = self.state.lock().await;
        Ok(state
            .reservations
            .values()
            .filter(|r| r.session_id == session_id && r.status == ReservationStatus::Pending)
            .cloned()
            .collect())
    }

    async fn pending_total(&self, sku: &Sku) -> Result<u32> {
        let state = self.state.lock().await;
        Ok(state
            .reservations
            .values()
            .filter(|r| &r.sku == sku && r.status == ReservationStatus::Pending)
            .map(|r| r.quantity)
            .sum())
    }
}

#[async_trait]
impl ReferenceStore for MemoryStore {
    async fn unit_price(&self, sku: &Sku, currency: Currency) -> Result<Option<Money>> {
        let state = self.state.lock().await;
        Ok(state.pricing.get(&(sku.clone(), currency)).copied())
    }

    async fn unit_weight(&self, sku: &Sku) -> Result<Option<Decimal>> {
        Ok(self.state.lock().await.weights.get(sku).copied())
    }

    async fn shipping_for(&self, country: &str) -> Result<Option<ShippingSetting>> {
        Ok(self.state.lock().await.shipping.get(country).cloned())
    }

    async fn active_tax(&self) -> Result<Option<TaxSetting>> {
        Ok(self.state.lock().await.tax.clone())
    }
}

#[async_trait]
impl OrderStore for MemoryStore {
    async fn payment_exists(&self, payment_ref: &PaymentRef) -> Result<bool> {
        Ok(self.state.lock().await.payments.contains_key(payment_ref))
    }

    async fn record_order(&self, order: &ConfirmedOrder) -> Result<()> {
        let mut state = self.state.lock().await;

        // Validate the whole write-set before touching anything, so a
        // mid-write failure cannot publish partial state.
        if state.payments.contains_key(&order.payment.payment_ref) {
            return Err(StoreError::Conflict(format!(
                "payment {} already recorded",
                order.payment.payment_ref
            )));
        }
        for id in &order.reservations {
            match state.reservations.get(id) {
                Some(r) if r.status == ReservationStatus::Pending => {}
                _ => {
                    return Err(StoreError::Conflict(format!(
                        "reservation {id} is no longer pending"
                    )));
                }
            }
        }

        for id in &order.reservations {
            if let Some(r) = state.reservations.get_mut(id) {
                r.status = ReservationStatus::Confirmed;
                r.payment_ref = Some(order.payment.payment_ref.clone());
            }
        }
        state
            .payments
            .insert(order.payment.payment_ref.clone(), order.payment.clone());
        state
            .addresses
            .insert(order.payment.payment_ref.clone(), order.address.clone());
        state.authorizations.insert(
            order.payment.payment_ref.clone(),
            order.authorization.clone(),
        );
        state.order_details.extend(order.details.iter().cloned());

        let session_id = order.session_id;
        state
            .cart_items
            .retain(|(owner, _), _| *owner != session_id);
        state.sessions.remove(&session_id);

        Ok(())
    }

    async fn order_details(&self, payment_ref: &PaymentRef) -> Result<Vec<OrderDetail>> {
        let state = self.state.lock().await;
        Ok(state
            .order_details
            .iter()
            .filter(|d| &d.payment_ref == payment_ref)
            .cloned()
            .collect())
    }
}
