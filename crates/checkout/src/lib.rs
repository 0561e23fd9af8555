//! The cart → inventory-reservation → checkout-pricing → payment-confirmation
//! pipeline.
//!
//! Holds inventory against concurrent shoppers, expires abandoned holds
//! without leaking stock, prices a cart in the shopper's currency including
//! tax and weight-based shipping, and reconciles provider webhooks against
//! holds that may have already expired.

pub mod confirm;
pub mod error;
pub mod manager;
pub mod pricer;
pub mod reconciler;

pub use confirm::{
    AddressPayload, AuthorizationPayload, ChargedItem, ConfirmOutcome, PaymentConfirmation,
    PaymentNotice,
};
pub use error::{CheckoutError, Result};
pub use manager::ReservationManager;
pub use pricer::{CheckoutPricer, PriceQuote};
pub use reconciler::{ReconcileReport, Reconciler};
