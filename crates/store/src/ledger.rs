//! The SKU ledger: the only place stock quantities change.

use async_trait::async_trait;
use thiserror::Error;

use common::Sku;

use crate::error::StoreError;

/// Errors from ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The conditional decrement matched no row: the SKU is unknown or has
    /// fewer sellable units than requested.
    #[error("out of stock: {sku}")]
    OutOfStock { sku: Sku },

    /// Underlying store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Atomic inventory operations keyed by SKU.
///
/// `reserve` and `release` are single conditional updates, never a read
/// followed by a write, so two shoppers racing for the last units can never
/// both win. The backing row's atomicity is the only synchronization
/// primitive; it stays correct across multiple service instances.
#[async_trait]
pub trait SkuLedger: Send + Sync {
    /// Removes `quantity` units from the sellable pool.
    ///
    /// Fails with [`LedgerError::OutOfStock`] when fewer units are available.
    async fn reserve(&self, sku: &Sku, quantity: u32) -> Result<(), LedgerError>;

    /// Returns `quantity` units to the sellable pool.
    async fn release(&self, sku: &Sku, quantity: u32) -> Result<(), LedgerError>;

    /// Reads the current sellable quantity, or `None` for an unknown SKU.
    async fn on_hand(&self, sku: &Sku) -> Result<Option<u32>, LedgerError>;
}
