//! Storage layer for the checkout core.
//!
//! Trait contracts for the five storage concerns (the SKU ledger, shopping
//! sessions, reservation rows, reference data, and the confirmation write
//! side) with two interchangeable backends: [`PostgresStore`] for
//! production and [`MemoryStore`] for tests and single-process runs.
//!
//! All backend calls carry a request-scoped timeout and surface
//! [`StoreError::Timeout`] instead of blocking indefinitely.

pub mod error;
pub mod ledger;
pub mod memory;
pub mod orders;
pub mod postgres;
pub mod reference;
pub mod reservations;
pub mod sessions;

pub use error::{Result, StoreError};
pub use ledger::{LedgerError, SkuLedger};
pub use memory::MemoryStore;
pub use orders::OrderStore;
pub use postgres::PostgresStore;
pub use reference::{ReferenceStore, ShippingSetting, TaxSetting};
pub use reservations::ReservationStore;
pub use sessions::SessionStore;

/// Blanket alias for a backend implementing every storage concern, as both
/// [`PostgresStore`] and [`MemoryStore`] do. The transport layer is generic
/// over this; individual services keep their narrower bounds.
pub trait CommerceStore:
    SkuLedger + SessionStore + ReservationStore + ReferenceStore + OrderStore + Clone + Send + Sync + 'static
{
}

impl<T> CommerceStore for T where
    T: SkuLedger
        + SessionStore
        + ReservationStore
        + ReferenceStore
        + OrderStore
        + Clone
        + Send
        + Sync
        + 'static
{
}
