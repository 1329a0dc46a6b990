//! Pricing
//!
//! Pure functions turning a cart subtotal and an optional applied coupon into
//! the amounts shown to the customer and copied onto orders.

use decimal_percentage::Percentage;
use rust_decimal::{Decimal, prelude::FromPrimitive};
use rusty_money::{Money, iso::Currency};

use crate::{
    cart::CartItem,
    coupons::Coupon,
    prices::{Price, non_negative, zero},
};

/// Amounts derived from a subtotal and the applied coupon.
///
/// Always satisfies `0 <= final_price <= subtotal` and
/// `discount == subtotal - final_price`.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSummary {
    /// Sum of line totals before any discount
    pub subtotal: Price,

    /// Amount taken off by the coupon
    pub discount: Price,

    /// What the customer pays
    pub final_price: Price,

    /// Code of the coupon that produced the discount
    pub coupon_code: Option<String>,
}

impl PriceSummary {
    /// Calculates the discount as a fraction of the subtotal.
    pub fn savings_percent(&self) -> Percentage {
        let discount_minor = self.discount.to_minor_units();
        let subtotal_minor = self.subtotal.to_minor_units();

        if subtotal_minor == 0 {
            return Percentage::from(0.0);
        }

        let discount_dec = Decimal::from_i64(discount_minor).unwrap_or(Decimal::ZERO);
        let subtotal_dec = Decimal::from_i64(subtotal_minor).unwrap_or(Decimal::ONE);

        Percentage::from(discount_dec / subtotal_dec)
    }

    /// Whether a coupon reduced the price.
    pub fn has_discount(&self) -> bool {
        self.discount.to_minor_units() > 0
    }
}

/// Derive the price summary for `subtotal` with the `applied` coupon.
///
/// The coupon is trusted: eligibility is checked when it is applied and again
/// at checkout, not here.
pub fn derive(subtotal: Price, applied: Option<&Coupon>) -> PriceSummary {
    let subtotal = non_negative(subtotal);
    let currency = subtotal.currency();

    let Some(coupon) = applied else {
        return PriceSummary {
            subtotal,
            discount: zero(currency),
            final_price: subtotal,
            coupon_code: None,
        };
    };

    let discount = coupon.discount_for(subtotal);
    let final_minor = subtotal
        .to_minor_units()
        .saturating_sub(discount.to_minor_units())
        .max(0);

    PriceSummary {
        subtotal,
        discount,
        final_price: Money::from_minor(final_minor, currency),
        coupon_code: Some(coupon.code.clone()),
    }
}

/// Unit price times quantity, saturating at the largest representable amount.
pub fn line_total(price: Price, quantity: u32) -> Price {
    Money::from_minor(
        price
            .to_minor_units()
            .saturating_mul(i64::from(quantity)),
        price.currency(),
    )
}

/// Calculates the total price of a list of cart lines.
///
/// An empty list totals zero in `currency`.
pub fn total_price(items: &[CartItem], currency: &'static Currency) -> Price {
    let minor = items.iter().fold(0_i64, |acc, item| {
        acc.saturating_add(line_total(item.product.price, item.quantity).to_minor_units())
    });

    Money::from_minor(minor, currency)
}
