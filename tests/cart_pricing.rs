//! Integration tests for the cart store, coupon registry and pricing engine
//! working together.

use jiff::{SignedDuration, Timestamp};
use rust_decimal::Decimal;
use rusty_money::{Money, iso::BRL};
use testresult::TestResult;

use techstore::{
    cart::CartStore,
    coupons::{CouponRegistry, CouponRejection, NewCoupon},
    discounts::CouponDiscount,
    prices::Price,
    pricing::derive,
    products::{Product, ProductId},
    storage::MemoryStore,
};

fn brl(minor: i64) -> Price {
    Money::from_minor(minor, BRL)
}

fn now() -> Timestamp {
    Timestamp::from_second(1_767_225_600).unwrap_or(Timestamp::UNIX_EPOCH)
}

fn catalog() -> Vec<Product> {
    vec![
        Product::new("notebook", "Notebook Pro 14", brl(450_000)),
        Product::new("monitor", "Monitor 27\"", brl(189_990)),
        Product::new("keyboard", "Teclado Mecânico", brl(34_990)),
        Product::new("mouse", "Mouse sem fio", brl(9_990)),
    ]
}

fn assert_totals_match_lines(cart: &CartStore<MemoryStore>) {
    let expected_total: i64 = cart
        .cart()
        .items()
        .iter()
        .map(|item| item.product.price.to_minor_units() * i64::from(item.quantity))
        .sum();

    let expected_count: u64 = cart
        .cart()
        .items()
        .iter()
        .map(|item| u64::from(item.quantity))
        .sum();

    assert_eq!(cart.total_price(), brl(expected_total));
    assert_eq!(cart.cart().item_count(), expected_count);
}

#[test]
fn totals_follow_every_mutation() -> TestResult {
    let products = catalog();
    let mut cart = CartStore::init(MemoryStore::new(), BRL);

    // Deterministic pseudo-random walk over add/set/remove.
    let mut seed: u64 = 0x5eed;

    for _ in 0..500 {
        seed = seed.wrapping_mul(6_364_136_223_846_793_005).wrapping_add(1);

        let pick = usize::try_from((seed >> 33) % 4)?;
        let quantity = u32::try_from((seed >> 40) % 4)?;
        let product = products.get(pick).ok_or("no product")?;

        match (seed >> 20) % 3 {
            0 => cart.add_item(product.clone(), quantity)?,
            1 => cart.set_quantity(&product.id, quantity),
            _ => cart.remove_item(&product.id),
        }

        assert_totals_match_lines(&cart);
        assert!(cart.cart().items().iter().all(|item| item.quantity >= 1));
    }

    Ok(())
}

#[test]
fn repeated_adds_merge_into_one_line() -> TestResult {
    let mut cart = CartStore::init(MemoryStore::new(), BRL);
    let mouse = Product::new("mouse", "Mouse sem fio", brl(9_990));

    cart.add_item(mouse.clone(), 2)?;
    cart.add_item(mouse, 3)?;

    assert_eq!(cart.cart().len(), 1);
    assert_eq!(cart.find(&ProductId::new("mouse")).map(|i| i.quantity), Some(5));

    Ok(())
}

#[test]
fn removing_an_absent_product_leaves_the_cart_unchanged() -> TestResult {
    let mut cart = CartStore::init(MemoryStore::new(), BRL);
    cart.add_item(Product::new("mouse", "Mouse sem fio", brl(9_990)), 1)?;

    let before = cart.cart().clone();
    cart.remove_item(&ProductId::new("monitor"));

    assert_eq!(cart.cart(), &before);

    Ok(())
}

#[test]
fn derived_prices_stay_within_bounds() {
    let percentage = CouponDiscount::percentage_points(Decimal::from(35), Some(brl(10_000)));
    let fixed = CouponDiscount::AmountOff(brl(3_000));

    let mut coupon = techstore_coupon(percentage);

    for discount in [percentage, fixed] {
        coupon.discount = discount;

        for subtotal in (0..200_000).step_by(997) {
            let summary = derive(brl(subtotal), Some(&coupon));
            let final_minor = summary.final_price.to_minor_units();

            assert!((0..=subtotal).contains(&final_minor));
            assert_eq!(summary.discount.to_minor_units(), subtotal - final_minor);
        }
    }
}

#[test]
fn percentage_coupon_is_capped_and_fixed_coupon_is_clamped() {
    let capped = techstore_coupon(CouponDiscount::percentage_points(
        Decimal::TEN,
        Some(brl(5_000)),
    ));
    let summary = derive(brl(100_000), Some(&capped));
    assert_eq!(summary.discount, brl(5_000));

    let fixed = techstore_coupon(CouponDiscount::AmountOff(brl(3_000)));
    let summary = derive(brl(2_000), Some(&fixed));
    assert_eq!(summary.discount, brl(2_000));
    assert_eq!(summary.final_price, brl(0));
}

#[test]
fn welcome_coupon_checks_minimum_and_cap() -> TestResult {
    let registry = CouponRegistry::init_at(MemoryStore::new(), BRL, now());

    assert_eq!(
        registry.validate_at("BEMVINDO10", brl(5_000), now()),
        Err(CouponRejection::BelowMinimum {
            minimum: brl(10_000)
        })
    );

    for (subtotal, expected) in [(50_000, 5_000), (80_000, 5_000), (30_000, 3_000)] {
        let coupon = registry.validate_at("BEMVINDO10", brl(subtotal), now())?;

        assert_eq!(coupon.discount_for(brl(subtotal)), brl(expected));
    }

    Ok(())
}

#[test]
fn applying_a_second_coupon_replaces_the_first() -> TestResult {
    let mut registry = CouponRegistry::init_at(MemoryStore::new(), BRL, now());
    registry.add_coupon(NewCoupon {
        code: "FRETE30".to_string(),
        description: String::new(),
        discount: CouponDiscount::AmountOff(brl(3_000)),
        min_purchase: brl(0),
        starts_at: now(),
        ends_at: now() + SignedDuration::from_hours(24),
        usage_limit: 10,
        is_active: true,
    })?;

    let mut cart = CartStore::init(MemoryStore::new(), BRL);
    cart.add_item(Product::new("notebook", "Notebook Pro 14", brl(450_000)), 1)?;

    let first = registry.validate_at("BEMVINDO10", cart.total_price(), now())?.clone();
    let second = registry.validate_at("frete30", cart.total_price(), now())?.clone();

    cart.apply_coupon(first.clone());
    cart.apply_coupon(second);

    assert_eq!(cart.summary().coupon_code.as_deref(), Some("FRETE30"));
    assert_eq!(cart.discount(), brl(3_000));
    assert_eq!(registry.get(first.uuid).map(|c| c.usage_count), Some(0));

    Ok(())
}

#[test]
fn clear_resets_everything_at_once() -> TestResult {
    let registry = CouponRegistry::init_at(MemoryStore::new(), BRL, now());
    let mut cart = CartStore::init(MemoryStore::new(), BRL);
    cart.add_item(Product::new("notebook", "Notebook Pro 14", brl(450_000)), 2)?;
    cart.apply_coupon(registry.validate_at("BEMVINDO10", cart.total_price(), now())?.clone());

    cart.clear();

    assert!(cart.cart().is_empty());
    assert_eq!(cart.total_price(), brl(0));
    assert_eq!(cart.cart().item_count(), 0);
    assert!(cart.applied_coupon().is_none());
    assert_eq!(cart.summary(), derive(brl(0), None));

    Ok(())
}

fn techstore_coupon(discount: CouponDiscount) -> techstore::coupons::Coupon {
    let mut coupon = techstore::coupons::welcome_coupon(BRL, now());
    coupon.discount = discount;

    coupon
}
