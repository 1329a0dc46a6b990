//! Techstore prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    cart::{Cart, CartError, CartItem, CartStore},
    checkout::{
        Checkout, CheckoutDetails, CheckoutError, PaymentGateway, PaymentOutcome, PaymentRequest,
        SimulatedGateway,
    },
    coupons::{
        Coupon, CouponError, CouponRegistry, CouponRejection, CouponUpdate, CouponUuid, NewCoupon,
    },
    discounts::CouponDiscount,
    orders::{
        Customer, Order, OrderBook, OrderDraft, OrderError, OrderMaterializer, OrderStatus,
        OrderUuid, PaymentMethod, PaymentStatus, ShippingAddress,
    },
    prices::Price,
    pricing::PriceSummary,
    products::{Product, ProductId},
    storage::{FileStore, KeyValueStore, MemoryStore},
};
