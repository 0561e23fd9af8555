//! Pricing, shipping, and tax reference data.

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use common::{Currency, Money, Sku};

use crate::error::Result;

/// Shipping price row for a destination country.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingSetting {
    /// Destination country, or the configured fallback key.
    pub country: String,
    /// Flat component of the shipping price.
    pub base_price: Money,
    /// Weight-based component, per kilogram of cart weight.
    pub price_per_kg: Money,
}

/// The single active tax rate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaxSetting {
    /// Display name, e.g. `"VAT"`.
    pub name: String,
    /// Fractional rate, e.g. `0.075`.
    pub rate: Decimal,
}

/// Read-only reference data consumed by the checkout pricer.
#[async_trait]
pub trait ReferenceStore: Send + Sync {
    /// Unit price of a SKU in the given currency, in major units.
    async fn unit_price(&self, sku: &Sku, currency: Currency) -> Result<Option<Money>>;

    /// Unit weight of a SKU in kilograms.
    async fn unit_weight(&self, sku: &Sku) -> Result<Option<Decimal>>;

    /// Shipping setting for a country. Callers fall back to the configured
    /// default row for unrecognized countries; checkout never fails on one.
    async fn shipping_for(&self, country: &str) -> Result<Option<ShippingSetting>>;

    /// The currently active tax record, if any.
    async fn active_tax(&self) -> Result<Option<TaxSetting>>;
}
