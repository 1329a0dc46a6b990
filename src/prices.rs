//! Prices
//!
//! Helpers shared by every module that stores or compares money. All
//! arithmetic happens on minor units so totals never accumulate rounding
//! drift.

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use rusty_money::{
    Money,
    iso::{BRL, Currency, EUR, GBP, USD},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Money with a statically known ISO currency, as used throughout the crate.
pub type Price = Money<'static, Currency>;

/// Errors raised while parsing or decoding prices.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PriceError {
    /// The price string was not `AMOUNT CURRENCY`.
    #[error("invalid price format: {0}")]
    InvalidFormat(String),

    /// The currency code is not one the store trades in.
    #[error("unknown currency code: {0}")]
    UnknownCurrency(String),

    /// A stored amount was negative.
    #[error("negative amount: {0}")]
    Negative(i64),
}

/// Look up a supported currency by its ISO alpha code (case-insensitive).
///
/// # Errors
///
/// Returns [`PriceError::UnknownCurrency`] for any other code.
pub fn currency_by_code(code: &str) -> Result<&'static Currency, PriceError> {
    match code.trim().to_ascii_uppercase().as_str() {
        "BRL" => Ok(BRL),
        "USD" => Ok(USD),
        "EUR" => Ok(EUR),
        "GBP" => Ok(GBP),
        _ => Err(PriceError::UnknownCurrency(code.to_string())),
    }
}

/// A zero amount in the given currency.
pub fn zero(currency: &'static Currency) -> Price {
    Money::from_minor(0, currency)
}

/// The smaller of two amounts, compared in minor units.
pub fn min_price(a: Price, b: Price) -> Price {
    if b.to_minor_units() < a.to_minor_units() {
        b
    } else {
        a
    }
}

/// Floor an amount at zero.
pub fn non_negative(price: Price) -> Price {
    if price.to_minor_units() < 0 {
        zero(price.currency())
    } else {
        price
    }
}

/// Parse a decimal amount with its currency (e.g. `"12.50 BRL"`) into minor
/// units.
///
/// # Errors
///
/// Returns an error if the string is not in the format `AMOUNT CURRENCY`, the
/// amount does not parse, is negative, or the currency is unknown.
pub fn parse_price(s: &str) -> Result<Price, PriceError> {
    let mut parts = s.split_whitespace();

    let (Some(amount), Some(code), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(PriceError::InvalidFormat(s.to_string()));
    };

    let currency = currency_by_code(code)?;
    let minor = decimal_to_minor(
        amount
            .parse::<Decimal>()
            .map_err(|_err| PriceError::InvalidFormat(s.to_string()))?,
    )
    .ok_or_else(|| PriceError::InvalidFormat(s.to_string()))?;

    if minor < 0 {
        return Err(PriceError::Negative(minor));
    }

    Ok(Money::from_minor(minor, currency))
}

/// Convert a major-unit decimal into minor units (two decimal places).
pub fn decimal_to_minor(amount: Decimal) -> Option<i64> {
    amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|value| {
            value
                .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
                .to_i64()
        })
}

/// Persisted shape of a monetary amount.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoneyRecord {
    /// Amount in minor units (cents/centavos).
    pub amount: i64,

    /// ISO alpha currency code.
    pub currency: String,
}

impl From<Price> for MoneyRecord {
    fn from(price: Price) -> Self {
        Self {
            amount: price.to_minor_units(),
            currency: price.currency().iso_alpha_code.to_string(),
        }
    }
}

impl TryFrom<MoneyRecord> for Price {
    type Error = PriceError;

    fn try_from(record: MoneyRecord) -> Result<Self, Self::Error> {
        if record.amount < 0 {
            return Err(PriceError::Negative(record.amount));
        }

        Ok(Money::from_minor(
            record.amount,
            currency_by_code(&record.currency)?,
        ))
    }
}
