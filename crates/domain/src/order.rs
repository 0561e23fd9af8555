//! Confirmation artifacts: payment, order lines, address, authorization.
//!
//! None of these rows exist until a provider callback confirms a charge;
//! they are created together in one transaction or not at all.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use common::{Currency, PaymentRef, ReservationId, SessionId, Sku};

/// A settled charge from the payment provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetail {
    /// Provider charge reference; unique, used for webhook dedupe.
    pub payment_ref: PaymentRef,
    /// Charged amount in the provider's minor unit.
    pub amount_minor: i64,
    /// Settlement currency.
    pub currency: Currency,
    /// Status string as reported by the provider.
    pub provider_status: String,
    /// When the confirmation was recorded.
    pub created_at: DateTime<Utc>,
}

/// One purchased line, bound to its payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDetail {
    /// Row identifier.
    pub id: Uuid,
    /// Owning payment.
    pub payment_ref: PaymentRef,
    /// Purchased SKU.
    pub sku: Sku,
    /// Purchased quantity.
    pub quantity: u32,
}

impl OrderDetail {
    /// Creates an order line for a payment.
    pub fn new(payment_ref: PaymentRef, sku: Sku, quantity: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            payment_ref,
            sku,
            quantity,
        }
    }
}

/// Shipping address attached 1:1 to a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub payment_ref: PaymentRef,
    pub street: String,
    pub city: String,
    pub state: String,
    pub country: String,
}

/// Card authorization detail attached 1:1 to a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CardAuthorization {
    pub payment_ref: PaymentRef,
    pub authorization_code: String,
    pub card_type: String,
    pub last4: String,
    pub bank: String,
}

/// The full write-set for one confirmed checkout.
///
/// Input to the order store's all-or-nothing transaction: every listed
/// reservation transitions `PENDING → CONFIRMED`, the payment rows are
/// inserted, and the consumed session is deleted, or none of it happens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmedOrder {
    /// The session being consumed by this checkout.
    pub session_id: SessionId,
    /// Reservations to transition, with the quantity each must still hold.
    pub reservations: Vec<ReservationId>,
    /// The settled charge.
    pub payment: PaymentDetail,
    /// Shipping address from the provider payload.
    pub address: Address,
    /// Card authorization from the provider payload.
    pub authorization: CardAuthorization,
    /// Purchased lines.
    pub details: Vec<OrderDetail>,
}

/// Result handed back to the webhook caller after a successful confirm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderConfirmation {
    /// The provider reference the order is filed under.
    pub payment_ref: PaymentRef,
    /// Purchased lines.
    pub details: Vec<OrderDetail>,
}
