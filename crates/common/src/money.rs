//! Money and unit conversion.
//!
//! Prices are carried as major-unit decimals (`12.34` naira or dollars) and
//! converted to the payment provider's integer minor unit only at the edge.
//! Totals are floored to two decimal places so fractional cents are never
//! charged to the shopper.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Currencies the checkout pipeline settles in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// United States dollar.
    Usd,
    /// Nigerian naira.
    Ngn,
}

impl Currency {
    /// Returns the ISO code for this currency.
    pub fn as_str(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Ngn => "NGN",
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for Currency {
    type Err = UnknownCurrency;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "USD" => Ok(Currency::Usd),
            "NGN" => Ok(Currency::Ngn),
            other => Err(UnknownCurrency(other.to_string())),
        }
    }
}

/// Error returned when parsing an unsupported currency code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown currency: {0}")]
pub struct UnknownCurrency(pub String);

/// Per-currency smallest settlement units.
///
/// The USD smallest unit is the cent. The NGN unit is whatever the payment
/// gateway settles in (historically the kobo, but gateway-dependent), so it
/// is injected from configuration rather than fixed here.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrencyConfig {
    ngn_smallest_unit: Decimal,
}

impl CurrencyConfig {
    /// Creates a config with the given NGN smallest settlement unit.
    pub fn new(ngn_smallest_unit: Decimal) -> Self {
        Self { ngn_smallest_unit }
    }

    /// Returns the smallest settlement unit for a currency, in major units.
    pub fn smallest_unit(&self, currency: Currency) -> Decimal {
        match currency {
            Currency::Usd => Decimal::new(1, 2),
            Currency::Ngn => self.ngn_smallest_unit,
        }
    }
}

impl Default for CurrencyConfig {
    fn default() -> Self {
        // Kobo: 0.01 NGN.
        Self {
            ngn_smallest_unit: Decimal::new(1, 2),
        }
    }
}

/// A major-unit money amount.
///
/// Backed by a fixed-point decimal so tax-rate multiplication and per-kg
/// shipping math never pick up binary floating point error.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Creates a money amount from a decimal value in major units.
    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }

    /// Creates a money amount from whole major units.
    pub fn from_major(units: i64) -> Self {
        Self(Decimal::from(units))
    }

    /// Returns zero money.
    pub fn zero() -> Self {
        Self(Decimal::ZERO)
    }

    /// Returns the underlying decimal amount in major units.
    pub fn amount(&self) -> Decimal {
        self.0
    }

    /// Returns true if the amount is zero.
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Multiplies by a quantity.
    pub fn multiply(&self, quantity: u32) -> Money {
        Money(self.0 * Decimal::from(quantity))
    }

    /// Floors the amount to two decimal places.
    ///
    /// Both NGN and USD display two decimal places; flooring rather than
    /// rounding avoids over-charging on fractional cents.
    pub fn floor2(&self) -> Money {
        Money(
            self.0
                .round_dp_with_strategy(2, RoundingStrategy::ToNegativeInfinity),
        )
    }

    /// Converts to the provider's integer minor unit: `round(amount / unit)`.
    ///
    /// Saturates at the `i64` bounds; stored amounts are bounded well below
    /// that by the pricing schema.
    pub fn to_minor_units(&self, currency: Currency, config: &CurrencyConfig) -> i64 {
        let unit = config.smallest_unit(currency);
        let count = (self.0 / unit).round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
        count.to_i64().unwrap_or(i64::MAX)
    }
}

impl std::fmt::Display for Money {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

impl std::ops::Add for Money {
    type Output = Money;

    fn add(self, rhs: Self) -> Self::Output {
        Money(self.0 + rhs.0)
    }
}

impl std::ops::Sub for Money {
    type Output = Money;

    fn sub(self, rhs: Self) -> Self::Output {
        Money(self.0 - rhs.0)
    }
}

impl std::ops::AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

/// Sums `unit_price * quantity` over cart lines.
pub fn cart_subtotal<I>(lines: I) -> Money
where
    I: IntoIterator<Item = (Money, u32)>,
{
    lines
        .into_iter()
        .fold(Money::zero(), |acc, (price, qty)| acc + price.multiply(qty))
}

/// Sums `unit_weight * quantity` over cart lines, in kilograms.
pub fn cart_weight<I>(lines: I) -> Decimal
where
    I: IntoIterator<Item = (Decimal, u32)>,
{
    lines
        .into_iter()
        .fold(Decimal::ZERO, |acc, (weight, qty)| {
            acc + weight * Decimal::from(qty)
        })
}

/// Shipping cost for a cart: flat base plus a per-kilogram component.
pub fn shipping_cost(base_price: Money, price_per_kg: Money, total_weight_kg: Decimal) -> Money {
    base_price + Money::new(price_per_kg.amount() * total_weight_kg)
}

/// Cart total: `floor2(subtotal + shipping + subtotal * tax_rate)`.
pub fn grand_total(subtotal: Money, shipping: Money, tax_rate: Decimal) -> Money {
    let tax = Money::new(subtotal.amount() * tax_rate);
    (subtotal + shipping + tax).floor2()
}
