//! Domain entities for the cart → reservation → checkout → payment pipeline.
//!
//! Plain structs with explicit foreign-key identifiers; relations are opaque
//! IDs plus narrow read interfaces, never a live object graph. The one state
//! machine lives on [`OrderReservation`].

pub mod error;
pub mod order;
pub mod reservation;
pub mod session;

pub use error::DomainError;
pub use order::{
    Address, CardAuthorization, ConfirmedOrder, OrderConfirmation, OrderDetail, PaymentDetail,
};
pub use reservation::{OrderReservation, ReservationStatus};
pub use session::{CartItem, ShoppingSession};
