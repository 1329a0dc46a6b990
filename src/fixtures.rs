//! Fixtures
//!
//! YAML files describing the product catalog and coupon definitions.

use std::{fs, path::Path};

use jiff::{SignedDuration, Timestamp};
use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use rusty_money::iso::Currency;
use serde::Deserialize;
use thiserror::Error;

use crate::{
    coupons::NewCoupon,
    discounts::CouponDiscount,
    prices::{Price, PriceError, parse_price, zero},
    products::{Product, ProductId},
};

/// Fixture Parsing Errors
#[derive(Debug, Error)]
pub enum FixtureError {
    /// IO error reading fixture files
    #[error("Failed to read fixture file: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error
    #[error("Failed to parse YAML: {0}")]
    Yaml(#[from] serde_norway::Error),

    /// Invalid price
    #[error(transparent)]
    Price(#[from] PriceError),

    /// Invalid percentage format
    #[error("Invalid percentage format: {0}")]
    InvalidPercentage(String),

    /// Currency mismatch between entries
    #[error("Currency mismatch: expected {0}, found {1}")]
    CurrencyMismatch(String, String),
}

/// Wrapper for products in YAML
#[derive(Debug, Deserialize)]
pub struct CatalogFixture {
    /// Map of product id -> product fixture
    pub products: FxHashMap<String, ProductFixture>,
}

/// Product Fixture
#[derive(Debug, Deserialize)]
pub struct ProductFixture {
    /// Product name
    pub name: String,

    /// Product price (e.g., "4500.00 BRL")
    pub price: String,

    /// Whether the product can be bought
    #[serde(default = "default_true")]
    pub in_stock: bool,
}

fn default_true() -> bool {
    true
}

/// Read-only product catalog.
#[derive(Debug, Clone)]
pub struct Catalog {
    products: Vec<Product>,
    currency: &'static Currency,
}

impl Catalog {
    /// Load a catalog from a YAML file. Every product must share `currency`.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, a price is
    /// invalid, or a product is priced in another currency.
    pub fn load(path: impl AsRef<Path>, currency: &'static Currency) -> Result<Self, FixtureError> {
        let contents = fs::read_to_string(path)?;

        Self::from_yaml(&contents, currency)
    }

    /// Parse a catalog from YAML text.
    ///
    /// # Errors
    ///
    /// See [`Catalog::load`].
    pub fn from_yaml(yaml: &str, currency: &'static Currency) -> Result<Self, FixtureError> {
        let fixture: CatalogFixture = serde_norway::from_str(yaml)?;

        let mut products = fixture
            .products
            .into_iter()
            .map(|(id, product)| {
                let price = parse_price(&product.price)?;

                if price.currency() != currency {
                    return Err(FixtureError::CurrencyMismatch(
                        currency.iso_alpha_code.to_string(),
                        price.currency().iso_alpha_code.to_string(),
                    ));
                }

                Ok(Product {
                    id: ProductId::new(id),
                    name: product.name,
                    price,
                    in_stock: product.in_stock,
                })
            })
            .collect::<Result<Vec<_>, FixtureError>>()?;

        products.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(Self { products, currency })
    }

    /// All products, ordered by id.
    pub fn products(&self) -> &[Product] {
        &self.products
    }

    /// Product by id.
    pub fn get(&self, id: &ProductId) -> Option<&Product> {
        self.products.iter().find(|product| &product.id == id)
    }

    /// Catalog currency.
    pub fn currency(&self) -> &'static Currency {
        self.currency
    }
}

/// Wrapper for coupons in YAML
#[derive(Debug, Deserialize)]
pub struct CouponsFixture {
    /// Map of coupon code -> coupon fixture
    pub coupons: FxHashMap<String, CouponFixture>,
}

/// Coupon Fixture
#[derive(Debug, Deserialize)]
pub struct CouponFixture {
    /// Admin-facing description
    #[serde(default)]
    pub description: String,

    /// Either a percentage ("10%") or an amount ("30.00 BRL")
    pub discount: String,

    /// Cap for percentage discounts (e.g., "50.00 BRL")
    #[serde(default)]
    pub max_discount: Option<String>,

    /// Minimum subtotal (e.g., "100.00 BRL")
    #[serde(default)]
    pub min_purchase: Option<String>,

    /// Days of validity, counted from load time
    pub valid_days: i64,

    /// How many times the coupon may be redeemed
    pub usage_limit: u32,

    /// Whether the coupon starts active
    #[serde(default = "default_true")]
    pub active: bool,
}

/// Parse coupon definitions from YAML text, valid from `now`.
///
/// Codes come out sorted so coupons are registered in a stable order.
///
/// # Errors
///
/// Returns an error if the YAML is malformed or an amount or percentage does
/// not parse.
pub fn coupons_from_yaml(
    yaml: &str,
    currency: &'static Currency,
    now: Timestamp,
) -> Result<Vec<NewCoupon>, FixtureError> {
    let fixture: CouponsFixture = serde_norway::from_str(yaml)?;

    let mut coupons = fixture
        .coupons
        .into_iter()
        .map(|(code, coupon)| {
            let max_discount = coupon
                .max_discount
                .as_deref()
                .map(|amount| parse_amount(amount, currency))
                .transpose()?;

            let min_purchase = coupon
                .min_purchase
                .as_deref()
                .map(|amount| parse_amount(amount, currency))
                .transpose()?
                .unwrap_or_else(|| zero(currency));

            let ends_at = now
                .checked_add(SignedDuration::from_hours(coupon.valid_days.saturating_mul(24)))
                .unwrap_or(Timestamp::MAX);

            Ok(NewCoupon {
                code,
                description: coupon.description,
                discount: parse_discount(&coupon.discount, max_discount, currency)?,
                min_purchase,
                starts_at: now,
                ends_at,
                usage_limit: coupon.usage_limit,
                is_active: coupon.active,
            })
        })
        .collect::<Result<Vec<_>, FixtureError>>()?;

    coupons.sort_by(|a, b| a.code.cmp(&b.code));

    Ok(coupons)
}

/// Parse a discount string: `"15%"` is a percentage, anything else an amount.
///
/// # Errors
///
/// Returns an error if the percentage or amount does not parse.
pub fn parse_discount(
    s: &str,
    max_discount: Option<Price>,
    currency: &'static Currency,
) -> Result<CouponDiscount, FixtureError> {
    let trimmed = s.trim();

    if let Some(points) = trimmed.strip_suffix('%') {
        let points = points
            .trim()
            .parse::<Decimal>()
            .map_err(|_err| FixtureError::InvalidPercentage(s.to_string()))?;

        Ok(CouponDiscount::percentage_points(points, max_discount))
    } else {
        Ok(CouponDiscount::AmountOff(parse_amount(trimmed, currency)?))
    }
}

/// Parse an amount that must be in `currency`.
///
/// # Errors
///
/// Returns an error if the amount does not parse or uses another currency.
pub fn parse_amount(s: &str, currency: &'static Currency) -> Result<Price, FixtureError> {
    let price = parse_price(s)?;

    if price.currency() == currency {
        Ok(price)
    } else {
        Err(FixtureError::CurrencyMismatch(
            currency.iso_alpha_code.to_string(),
            price.currency().iso_alpha_code.to_string(),
        ))
    }
}
