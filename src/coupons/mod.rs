//! Coupons
//!
//! Coupon definitions, the validation rules deciding whether a code may be
//! applied to a cart, and the registry that owns them and tracks redemptions.

use jiff::Timestamp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    discounts::CouponDiscount,
    prices::{MoneyRecord, Price, PriceError},
    uuids::TypedUuid,
};

mod registry;
mod validation;

pub use registry::{CouponRegistry, welcome_coupon};
pub use validation::{CouponRejection, validate_code};

/// Coupon UUID
pub type CouponUuid = TypedUuid<Coupon>;

/// Errors from coupon administration and redemption.
#[derive(Debug, Error, PartialEq)]
pub enum CouponError {
    /// No coupon has this id.
    #[error("coupon {0} not found")]
    NotFound(CouponUuid),

    /// Another coupon already uses this code (compared case-insensitively).
    #[error("coupon code {0} is already in use")]
    DuplicateCode(String),

    /// The definition breaks one of the coupon rules.
    #[error("invalid coupon: {0}")]
    InvalidDefinition(&'static str),

    /// Redeeming would exceed the usage limit.
    #[error("coupon {0} has no uses left")]
    Exhausted(CouponUuid),

    /// A stored amount could not be decoded.
    #[error(transparent)]
    Price(#[from] PriceError),
}

/// Coupon
#[derive(Debug, Clone, PartialEq)]
pub struct Coupon {
    /// Coupon id
    pub uuid: CouponUuid,

    /// Code typed by the customer
    pub code: String,

    /// Admin-facing description
    pub description: String,

    /// Discount granted
    pub discount: CouponDiscount,

    /// Minimum pre-discount subtotal
    pub min_purchase: Price,

    /// First instant the coupon can be used
    pub starts_at: Timestamp,

    /// Last instant the coupon can be used
    pub ends_at: Timestamp,

    /// Number of redemptions allowed
    pub usage_limit: u32,

    /// Number of redemptions so far
    pub usage_count: u32,

    /// Admin on/off switch
    pub is_active: bool,

    /// Creation time
    pub created_at: Timestamp,

    /// Last modification time
    pub updated_at: Timestamp,
}

impl Coupon {
    /// Whether `code` names this coupon, ignoring case and surrounding whitespace.
    pub fn matches_code(&self, code: &str) -> bool {
        normalize_code(&self.code) == normalize_code(code)
    }

    /// Whether every redemption has been used up.
    pub fn is_exhausted(&self) -> bool {
        self.usage_count >= self.usage_limit
    }

    /// Redemptions left before the coupon is exhausted.
    pub fn remaining_uses(&self) -> u32 {
        self.usage_limit.saturating_sub(self.usage_count)
    }

    /// Whether the coupon could be redeemed at `now`, ignoring the cart.
    ///
    /// An expired or exhausted coupon is inert even while `is_active` is set.
    pub fn is_redeemable_at(&self, now: Timestamp) -> bool {
        self.is_active && now >= self.starts_at && now <= self.ends_at && !self.is_exhausted()
    }

    /// Discount this coupon grants on `subtotal`, clamped to `[0, subtotal]`.
    pub fn discount_for(&self, subtotal: Price) -> Price {
        self.discount.amount_for(subtotal)
    }
}

/// Canonical form of a coupon code used for lookups.
pub(crate) fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Data for a coupon created by an administrator.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCoupon {
    /// Code typed by the customer
    pub code: String,

    /// Admin-facing description
    pub description: String,

    /// Discount granted
    pub discount: CouponDiscount,

    /// Minimum pre-discount subtotal
    pub min_purchase: Price,

    /// First instant the coupon can be used
    pub starts_at: Timestamp,

    /// Last instant the coupon can be used
    pub ends_at: Timestamp,

    /// Number of redemptions allowed
    pub usage_limit: u32,

    /// Admin on/off switch
    pub is_active: bool,
}

/// Partial update of a coupon; `None` fields are left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CouponUpdate {
    /// New code
    pub code: Option<String>,

    /// New description
    pub description: Option<String>,

    /// New discount
    pub discount: Option<CouponDiscount>,

    /// New minimum purchase
    pub min_purchase: Option<Price>,

    /// New start
    pub starts_at: Option<Timestamp>,

    /// New end
    pub ends_at: Option<Timestamp>,

    /// New usage limit
    pub usage_limit: Option<u32>,

    /// New active flag
    pub is_active: Option<bool>,
}

/// Check the rules every stored coupon must satisfy.
pub(crate) fn check_definition(coupon: &Coupon) -> Result<(), CouponError> {
    if coupon.code.trim().is_empty() {
        return Err(CouponError::InvalidDefinition("code must not be empty"));
    }

    if coupon.usage_limit == 0 {
        return Err(CouponError::InvalidDefinition("usage limit must be positive"));
    }

    if coupon.usage_count > coupon.usage_limit {
        return Err(CouponError::InvalidDefinition(
            "usage count exceeds usage limit",
        ));
    }

    if coupon.ends_at < coupon.starts_at {
        return Err(CouponError::InvalidDefinition("coupon ends before it starts"));
    }

    if coupon.min_purchase.to_minor_units() < 0 {
        return Err(CouponError::InvalidDefinition(
            "minimum purchase must not be negative",
        ));
    }

    match coupon.discount {
        CouponDiscount::PercentageOff {
            max_discount,
            ..
        } => {
            let points = coupon.discount.percent_points().unwrap_or_default();

            if points.is_sign_negative() || points > Decimal::ONE_HUNDRED {
                return Err(CouponError::InvalidDefinition(
                    "percentage must be between 0 and 100",
                ));
            }

            if max_discount.is_some_and(|cap| cap.to_minor_units() < 0) {
                return Err(CouponError::InvalidDefinition(
                    "maximum discount must not be negative",
                ));
            }
        }
        CouponDiscount::AmountOff(value) => {
            if value.to_minor_units() < 0 {
                return Err(CouponError::InvalidDefinition(
                    "discount amount must not be negative",
                ));
            }
        }
    }

    Ok(())
}

/// Persisted discount shape, tagged by `discountType`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    tag = "discountType",
    rename_all = "lowercase",
    rename_all_fields = "camelCase"
)]
pub enum DiscountRecord {
    /// Percentage off; `discount_value` is in percent points.
    Percentage {
        /// Percent points (`10` means 10%)
        discount_value: Decimal,

        /// Optional cap on the discount amount
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max_discount_amount: Option<MoneyRecord>,
    },

    /// Fixed amount off.
    Fixed {
        /// Amount taken off
        discount_value: MoneyRecord,
    },
}

/// Persisted coupon shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CouponRecord {
    /// Coupon id
    pub id: CouponUuid,

    /// Code typed by the customer
    pub code: String,

    /// Admin-facing description
    #[serde(default)]
    pub description: String,

    /// Discount definition
    #[serde(flatten)]
    pub discount: DiscountRecord,

    /// Minimum pre-discount subtotal
    pub min_purchase_amount: MoneyRecord,

    /// First instant the coupon can be used
    pub start_date: Timestamp,

    /// Last instant the coupon can be used
    pub end_date: Timestamp,

    /// Number of redemptions allowed
    pub usage_limit: u32,

    /// Number of redemptions so far
    pub usage_count: u32,

    /// Admin on/off switch
    pub is_active: bool,

    /// Creation time
    pub created_at: Timestamp,

    /// Last modification time
    pub updated_at: Timestamp,
}

impl From<&Coupon> for CouponRecord {
    fn from(coupon: &Coupon) -> Self {
        let discount = match coupon.discount {
            CouponDiscount::PercentageOff { max_discount, .. } => DiscountRecord::Percentage {
                discount_value: coupon.discount.percent_points().unwrap_or_default(),
                max_discount_amount: max_discount.map(MoneyRecord::from),
            },
            CouponDiscount::AmountOff(value) => DiscountRecord::Fixed {
                discount_value: value.into(),
            },
        };

        Self {
            id: coupon.uuid,
            code: coupon.code.clone(),
            description: coupon.description.clone(),
            discount,
            min_purchase_amount: coupon.min_purchase.into(),
            start_date: coupon.starts_at,
            end_date: coupon.ends_at,
            usage_limit: coupon.usage_limit,
            usage_count: coupon.usage_count,
            is_active: coupon.is_active,
            created_at: coupon.created_at,
            updated_at: coupon.updated_at,
        }
    }
}

impl TryFrom<CouponRecord> for Coupon {
    type Error = CouponError;

    fn try_from(record: CouponRecord) -> Result<Self, Self::Error> {
        let discount = match record.discount {
            DiscountRecord::Percentage {
                discount_value,
                max_discount_amount,
            } => CouponDiscount::percentage_points(
                discount_value,
                max_discount_amount.map(Price::try_from).transpose()?,
            ),
            DiscountRecord::Fixed { discount_value } => {
                CouponDiscount::AmountOff(discount_value.try_into()?)
            }
        };

        let coupon = Coupon {
            uuid: record.id,
            code: record.code,
            description: record.description,
            discount,
            min_purchase: record.min_purchase_amount.try_into()?,
            starts_at: record.start_date,
            ends_at: record.end_date,
            usage_limit: record.usage_limit,
            usage_count: record.usage_count,
            is_active: record.is_active,
            created_at: record.created_at,
            updated_at: record.updated_at,
        };

        check_definition(&coupon)?;

        Ok(coupon)
    }
}
