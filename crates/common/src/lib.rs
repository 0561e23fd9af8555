//! Shared types for the cart/checkout core.
//!
//! Identifier newtypes, the money/unit converter, and the cart cookie codec.
//! Everything here is pure: no I/O, no store access.

pub mod cookie;
pub mod money;
pub mod types;

pub use cookie::{CART_COOKIE_NAME, CartCookie, CookieError};
pub use money::{
    Currency, CurrencyConfig, Money, UnknownCurrency, cart_subtotal, cart_weight, grand_total,
    shipping_cost,
};
pub use types::{PaymentRef, ReservationId, SessionId, Sku};
