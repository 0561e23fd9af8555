//! Checkout pricer: quotes a cart total in the shopper's currency.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use common::{
    CartCookie, Currency, CurrencyConfig, Money, cart_subtotal, cart_weight, grand_total,
    shipping_cost,
};
use store::{ReferenceStore, SessionStore};

use crate::error::{CheckoutError, Result};

/// A priced cart: shipping, tax, and the grand total.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    /// Resolved shipping cost, including the weight-based component.
    pub shipping_cost: Money,
    /// Display name of the active tax.
    pub tax_name: String,
    /// Fractional tax rate applied to the subtotal.
    pub tax_rate: Decimal,
    /// Sum of `unit_price * quantity` over the cart.
    pub subtotal: Money,
    /// `floor2(subtotal + shipping + subtotal * tax_rate)`.
    pub total: Money,
    /// The total in the provider's integer minor unit.
    pub total_minor: i64,
    /// Quoted currency.
    pub currency: Currency,
}

/// Prices a session's cart for a declared country and currency.
pub struct CheckoutPricer<S> {
    store: S,
    currency_config: CurrencyConfig,
    default_shipping_key: String,
}

impl<S> CheckoutPricer<S>
where
    S: SessionStore + ReferenceStore,
{
    /// Creates a pricer. `default_shipping_key` names the shipping row used
    /// for countries with no row of their own.
    pub fn new(store: S, currency_config: CurrencyConfig, default_shipping_key: String) -> Self {
        Self {
            store,
            currency_config,
            default_shipping_key,
        }
    }

    /// Quotes the cart behind `token` for delivery to `country`.
    ///
    /// An unrecognized country falls back to the configured default
    /// shipping row; checkout never fails on one. A dead session or an
    /// empty cart is a "please refresh" failure, not a retryable one.
    #[tracing::instrument(skip(self, token))]
    pub async fn quote(
        &self,
        token: &str,
        country: &str,
        currency: Currency,
        now: DateTime<Utc>,
    ) -> Result<PriceQuote> {
        let start = std::time::Instant::now();

        let cookie = CartCookie::parse(token)
            .map_err(|_| CheckoutError::NotFound("shopping session".to_string()))?;
        let session = self
            .store
            .find_session(cookie.session_id)
            .await?
            .filter(|s| !s.is_expired(now))
            .ok_or_else(|| CheckoutError::NotFound("shopping session".to_string()))?;

        let items = self.store.cart_items(session.id).await?;
        if items.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let shipping = match self.store.shipping_for(country).await? {
            Some(setting) => setting,
            None => self
                .store
                .shipping_for(&self.default_shipping_key)
                .await?
                .ok_or_else(|| CheckoutError::NotFound("shipping settings".to_string()))?,
        };
        let tax = self
            .store
            .active_tax()
            .await?
            .ok_or_else(|| CheckoutError::NotFound("active tax rate".to_string()))?;

        let mut priced_lines = Vec::with_capacity(items.len());
        let mut weighed_lines = Vec::with_capacity(items.len());
        for item in &items {
            let price = self
                .store
                .unit_price(&item.sku, currency)
                .await?
                .ok_or_else(|| CheckoutError::NotFound(format!("price for {}", item.sku)))?;
            let weight = self
                .store
                .unit_weight(&item.sku)
                .await?
                .ok_or_else(|| CheckoutError::NotFound(format!("weight for {}", item.sku)))?;
            priced_lines.push((price, item.quantity));
            weighed_lines.push((weight, item.quantity));
        }

        let subtotal = cart_subtotal(priced_lines);
        let total_weight = cart_weight(weighed_lines);
        let shipping_total = shipping_cost(shipping.base_price, shipping.price_per_kg, total_weight);
        let total = grand_total(subtotal, shipping_total, tax.rate);
        let total_minor = total.to_minor_units(currency, &self.currency_config);

        metrics::histogram!("checkout_quote_duration_seconds")
            .record(start.elapsed().as_secs_f64());

        Ok(PriceQuote {
            shipping_cost: shipping_total,
            tax_name: tax.name,
            tax_rate: tax.rate,
            subtotal,
            total,
            total_minor,
            currency,
        })
    }
}
