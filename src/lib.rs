//! Techstore
//!
//! Cart, coupon and pricing engine for a small electronics storefront: a
//! persisted shopping cart, a coupon registry with validation and redemption
//! tracking, pure price derivation and the checkout flow that turns a cart
//! into an order.

pub mod cart;
pub mod checkout;
pub mod config;
pub mod coupons;
pub mod discounts;
pub mod fixtures;
pub mod observability;
pub mod orders;
pub mod prelude;
pub mod prices;
pub mod pricing;
pub mod products;
pub mod receipt;
pub mod storage;
pub mod uuids;
