//! Checkout error taxonomy.

use thiserror::Error;

use common::Sku;
use store::{LedgerError, StoreError};

/// Errors surfaced by the checkout services.
///
/// The transport layer maps these to status codes: `OutOfStock` is
/// user-correctable (409), the session/cart variants mean "restart checkout"
/// (404), and store failures are retryable infrastructure errors.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The ledger could not hold the requested units.
    #[error("out of stock: {sku}")]
    OutOfStock { sku: Sku },

    /// The cart cookie is missing, malformed, or its session is gone.
    #[error("shopping session expired or missing")]
    SessionExpired,

    /// A referenced resource does not resolve.
    #[error("not found: {0}")]
    NotFound(String),

    /// Checkout was attempted with no cart items.
    #[error("cart is empty")]
    EmptyCart,

    /// A quantity was zero.
    #[error("invalid quantity: {quantity}")]
    InvalidQuantity { quantity: u32 },

    /// A provider callback arrived for holds the scheduler already released,
    /// and the stock could not be re-secured. Queued for manual
    /// reconciliation; the charge must be refunded rather than oversold.
    #[error("reservation expired during payment: {reference}")]
    ReservationExpiredDuringPayment { reference: String },

    /// Underlying store failure; retryable.
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl From<LedgerError> for CheckoutError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::OutOfStock { sku } => CheckoutError::OutOfStock { sku },
            LedgerError::Store(e) => CheckoutError::Store(e),
        }
    }
}

/// Convenience type alias for checkout results.
pub type Result<T> = std::result::Result<T, CheckoutError>;
