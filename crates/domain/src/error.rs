//! Domain error types.

use thiserror::Error;

use crate::reservation::ReservationStatus;

/// Errors that can occur in domain-level operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A reservation transition was attempted out of order.
    #[error("invalid reservation transition: {from} -> {to}")]
    InvalidTransition {
        from: ReservationStatus,
        to: ReservationStatus,
    },
}
