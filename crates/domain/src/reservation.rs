//! Inventory reservation and its state machine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use common::{PaymentRef, ReservationId, SessionId, Sku};

use crate::error::DomainError;

/// The state of an inventory hold.
///
/// State transitions:
/// ```text
/// Pending ──┬──► Confirmed
///           └──► Expired
/// ```
///
/// Both `Confirmed` and `Expired` are terminal; nothing ever leaves
/// `Confirmed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum ReservationStatus {
    /// Inventory is held, awaiting payment.
    #[default]
    Pending,

    /// Payment confirmed; the held units are sold (terminal state).
    Confirmed,

    /// The hold timed out or was cancelled; stock was released (terminal state).
    Expired,
}

impl ReservationStatus {
    /// Returns true if the hold can transition to `Confirmed`.
    pub fn can_confirm(&self) -> bool {
        matches!(self, ReservationStatus::Pending)
    }

    /// Returns true if the hold can transition to `Expired`.
    pub fn can_expire(&self) -> bool {
        matches!(self, ReservationStatus::Pending)
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ReservationStatus::Confirmed | ReservationStatus::Expired
        )
    }

    /// Returns the status name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            ReservationStatus::Pending => "PENDING",
            ReservationStatus::Confirmed => "CONFIRMED",
            ReservationStatus::Expired => "EXPIRED",
        }
    }

    /// Parses a status from its storage representation.
    pub fn from_str_opt(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(ReservationStatus::Pending),
            "CONFIRMED" => Some(ReservationStatus::Confirmed),
            "EXPIRED" => Some(ReservationStatus::Expired),
            _ => None,
        }
    }
}

impl std::fmt::Display for ReservationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// An inventory hold tied to one (session, SKU) cart line.
///
/// A pending reservation represents units removed from the SKU ledger's
/// sellable pool but not yet paid for. Repeated adds of the same SKU within
/// the same session refresh this row; they never create a second one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderReservation {
    /// Reservation identifier.
    pub id: ReservationId,
    /// The SKU whose units are held.
    pub sku: Sku,
    /// The session that owns the hold until payment.
    pub session_id: SessionId,
    /// Units held.
    pub quantity: u32,
    /// Lifecycle state.
    pub status: ReservationStatus,
    /// When a pending hold lapses and its units return to the pool.
    pub expires_at: DateTime<Utc>,
    /// Set on confirmation; ownership moves from the session to the payment.
    pub payment_ref: Option<PaymentRef>,
}

impl OrderReservation {
    /// Creates a fresh pending hold.
    pub fn hold(
        session_id: SessionId,
        sku: Sku,
        quantity: u32,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: ReservationId::new(),
            sku,
            session_id,
            quantity,
            status: ReservationStatus::Pending,
            expires_at,
            payment_ref: None,
        }
    }

    /// Returns true if this pending hold has lapsed at `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.status == ReservationStatus::Pending && self.expires_at <= now
    }

    /// Refreshes the hold in place: quantity replaced, expiry pushed forward.
    pub fn refresh(&mut self, quantity: u32, expires_at: DateTime<Utc>) {
        self.quantity = quantity;
        self.expires_at = expires_at;
    }

    /// Transitions `Pending → Confirmed`, binding the payment reference.
    pub fn confirm(&mut self, payment_ref: PaymentRef) -> Result<(), DomainError> {
        if !self.status.can_confirm() {
            return Err(DomainError::InvalidTransition {
                from: self.status,
                to: ReservationStatus::Confirmed,
            });
        }
        self.status = ReservationStatus::Confirmed;
        self.payment_ref = Some(payment_ref);
        Ok(())
    }

    /// Transitions `Pending → Expired`.
    pub fn expire(&mut self) -> Result<(), DomainError> {
        if !self.status.can_expire() {
            return Err(DomainError::InvalidTransition {
                from: self.status,
                to: ReservationStatus::Expired,
            });
        }
        self.status = ReservationStatus::Expired;
        Ok(())
    }
}
