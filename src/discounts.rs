//! Discounts
//!
//! Coupon discount definitions and the arithmetic that turns them into an
//! amount off a subtotal.

use std::fmt;

use decimal_percentage::Percentage;
use rust_decimal::{
    Decimal, RoundingStrategy,
    prelude::{FromPrimitive, ToPrimitive},
};
use rusty_money::Money;
use thiserror::Error;

use crate::prices::{Price, min_price, non_negative};

/// Errors specific to discount calculations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiscountError {
    /// Percentage calculation could not be safely converted.
    #[error("percentage conversion overflowed or was not finite")]
    PercentConversion,
}

/// How a coupon reduces the subtotal.
#[derive(Debug, Copy, Clone, PartialEq)]
pub enum CouponDiscount {
    /// A percentage of the subtotal (e.g. "10% off"), optionally capped.
    PercentageOff {
        /// Fraction of the subtotal taken off.
        percent: Percentage,

        /// Upper bound on the discount amount.
        max_discount: Option<Price>,
    },

    /// A fixed amount off (e.g. "R$ 30 off"). Never capped.
    AmountOff(Price),
}

impl CouponDiscount {
    /// Percentage discount from percent points (`10` means 10%).
    pub fn percentage_points(points: Decimal, max_discount: Option<Price>) -> Self {
        Self::PercentageOff {
            percent: Percentage::from(points / Decimal::ONE_HUNDRED),
            max_discount,
        }
    }

    /// The discount value in percent points, for percentage discounts.
    pub fn percent_points(&self) -> Option<Decimal> {
        match self {
            Self::PercentageOff { percent, .. } => {
                Some(((*percent) * Decimal::ONE_HUNDRED).normalize())
            }
            Self::AmountOff(_) => None,
        }
    }

    /// Discount amount for `subtotal`.
    ///
    /// The cap applies to percentage discounts only, and the result is always
    /// clamped to `[0, subtotal]` so a discount can never produce a negative
    /// total.
    pub fn amount_for(&self, subtotal: Price) -> Price {
        let currency = subtotal.currency();

        let amount = match self {
            Self::PercentageOff {
                percent,
                max_discount,
            } => {
                let raw = Money::from_minor(
                    saturating_percent_of_minor(percent, subtotal.to_minor_units()),
                    currency,
                );

                match max_discount {
                    Some(cap) => min_price(raw, Money::from_minor(cap.to_minor_units(), currency)),
                    None => raw,
                }
            }
            Self::AmountOff(value) => Money::from_minor(value.to_minor_units(), currency),
        };

        non_negative(min_price(amount, non_negative(subtotal)))
    }
}

/// Like [`percent_of_minor`], but saturates instead of failing on overflow.
fn saturating_percent_of_minor(percent: &Percentage, minor: i64) -> i64 {
    percent_of_minor(percent, minor).unwrap_or_else(|_err| {
        let negative = ((*percent) * Decimal::ONE).is_sign_negative() != (minor < 0);

        if negative { i64::MIN } else { i64::MAX }
    })
}

impl fmt::Display for CouponDiscount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::PercentageOff {
                max_discount: Some(cap),
                ..
            } => write!(
                f,
                "{}% (max {cap})",
                self.percent_points().unwrap_or_default()
            ),
            Self::PercentageOff { .. } => {
                write!(f, "{}%", self.percent_points().unwrap_or_default())
            }
            Self::AmountOff(value) => write!(f, "{value}"),
        }
    }
}

/// Calculate the discount amount in minor units based on a percentage and a
/// minor unit amount, rounding half away from zero.
///
/// # Errors
///
/// Returns [`DiscountError::PercentConversion`] if the multiplication
/// overflows or the result does not fit in an `i64`.
pub fn percent_of_minor(percent: &Percentage, minor: i64) -> Result<i64, DiscountError> {
    let minor = Decimal::from_i64(minor).ok_or(DiscountError::PercentConversion)?;

    ((*percent) * Decimal::ONE) // decimal_percentage doesn't expose the underlying Decimal
        .checked_mul(minor)
        .ok_or(DiscountError::PercentConversion)?
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or(DiscountError::PercentConversion)
}
