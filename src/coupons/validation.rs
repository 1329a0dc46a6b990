//! Coupon validation

use jiff::Timestamp;
use thiserror::Error;

use crate::{coupons::Coupon, prices::Price};

/// Why a coupon code cannot be applied.
///
/// Rejections are ordinary values that callers branch on to produce user
/// feedback; nothing about a bad code is exceptional.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum CouponRejection {
    /// No coupon has this code.
    #[error("coupon not found")]
    NotFound,

    /// The coupon has been switched off.
    #[error("coupon is inactive")]
    Inactive,

    /// The coupon's validity window has not opened yet.
    #[error("coupon is not valid until {starts_at}")]
    NotYetValid {
        /// When the coupon becomes usable
        starts_at: Timestamp,
    },

    /// The coupon's validity window has closed.
    #[error("coupon expired at {ends_at}")]
    Expired {
        /// When the coupon stopped being usable
        ends_at: Timestamp,
    },

    /// Every redemption has been used.
    #[error("coupon usage limit reached")]
    Exhausted,

    /// The cart subtotal is under the coupon's minimum purchase.
    #[error("minimum purchase amount: {minimum}")]
    BelowMinimum {
        /// Required pre-discount subtotal
        minimum: Price,
    },
}

impl CouponRejection {
    /// Stable machine-readable reason.
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::NotFound => "not-found",
            Self::Inactive => "inactive",
            Self::NotYetValid { .. } => "not-started",
            Self::Expired { .. } => "expired",
            Self::Exhausted => "exhausted",
            Self::BelowMinimum { .. } => "below-minimum",
        }
    }
}

/// Validate `code` against `coupons` for a cart with the given pre-discount
/// `subtotal` at instant `now`.
///
/// Checks run in a fixed order and the first failure wins: existence, active
/// flag, start date, end date, usage limit, minimum purchase.
///
/// # Errors
///
/// Returns the [`CouponRejection`] for the first failing check.
pub fn validate_code<'c>(
    coupons: &'c [Coupon],
    code: &str,
    subtotal: Price,
    now: Timestamp,
) -> Result<&'c Coupon, CouponRejection> {
    let coupon = coupons
        .iter()
        .find(|coupon| coupon.matches_code(code))
        .ok_or(CouponRejection::NotFound)?;

    if !coupon.is_active {
        return Err(CouponRejection::Inactive);
    }

    if now < coupon.starts_at {
        return Err(CouponRejection::NotYetValid {
            starts_at: coupon.starts_at,
        });
    }

    if now > coupon.ends_at {
        return Err(CouponRejection::Expired {
            ends_at: coupon.ends_at,
        });
    }

    if coupon.is_exhausted() {
        return Err(CouponRejection::Exhausted);
    }

    if subtotal.to_minor_units() < coupon.min_purchase.to_minor_units() {
        return Err(CouponRejection::BelowMinimum {
            minimum: coupon.min_purchase,
        });
    }

    Ok(coupon)
}
