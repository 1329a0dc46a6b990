//! Integration tests for documents stored on disk.

use std::fs;

use rusty_money::{Money, iso::BRL};
use testresult::TestResult;

use techstore::{
    cart::CartStore,
    coupons::CouponRegistry,
    orders::OrderBook,
    products::Product,
    storage::{
        CART_STORAGE_KEY, COUPONS_STORAGE_KEY, FileStore, KeyValueStore, ORDERS_STORAGE_KEY,
    },
};

#[test]
fn cart_round_trips_through_a_file_store() -> TestResult {
    let dir = tempfile::tempdir()?;

    let mut cart = CartStore::init(FileStore::new(dir.path()), BRL);
    cart.add_item(
        Product::new("ssd", "SSD NVMe 1TB", Money::from_minor(45_990, BRL)),
        2,
    )?;

    let reloaded = CartStore::init(FileStore::new(dir.path()), BRL);

    assert_eq!(reloaded.cart(), cart.cart());
    assert_eq!(reloaded.total_price(), Money::from_minor(91_980, BRL));

    Ok(())
}

#[test]
fn stored_cart_uses_camel_case_and_minor_units() -> TestResult {
    let dir = tempfile::tempdir()?;

    let mut cart = CartStore::init(FileStore::new(dir.path()), BRL);
    cart.add_item(
        Product::new("ssd", "SSD NVMe 1TB", Money::from_minor(45_990, BRL)),
        1,
    )?;

    let raw = FileStore::new(dir.path())
        .get(CART_STORAGE_KEY)?
        .ok_or("cart document missing")?;
    let json: serde_json::Value = serde_json::from_str(&raw)?;

    assert_eq!(json["itemCount"], 1);
    assert_eq!(json["total"]["amount"], 45_990);
    assert_eq!(json["total"]["currency"], "BRL");
    assert_eq!(json["items"][0]["productId"], "ssd");
    assert_eq!(json["items"][0]["product"]["inStock"], true);

    Ok(())
}

#[test]
fn corrupt_documents_fall_back_to_empty_state() -> TestResult {
    let dir = tempfile::tempdir()?;
    let mut store = FileStore::new(dir.path());

    store.set(CART_STORAGE_KEY, "{\"items\": [")?;
    store.set(COUPONS_STORAGE_KEY, "42")?;
    store.set(ORDERS_STORAGE_KEY, "null")?;

    let cart = CartStore::init(FileStore::new(dir.path()), BRL);
    let coupons = CouponRegistry::init(FileStore::new(dir.path()), BRL);
    let orders = OrderBook::init(FileStore::new(dir.path()));

    assert!(cart.cart().is_empty());
    assert!(coupons.list().is_empty());
    assert!(orders.list().is_empty());

    Ok(())
}

#[test]
fn coupon_registry_is_seeded_once() -> TestResult {
    let dir = tempfile::tempdir()?;

    let first = CouponRegistry::init(FileStore::new(dir.path()), BRL);
    let seeded = first.find_by_code("BEMVINDO10").ok_or("not seeded")?.uuid;

    let second = CouponRegistry::init(FileStore::new(dir.path()), BRL);

    assert_eq!(second.list().len(), 1);
    assert_eq!(second.find_by_code("bemvindo10").map(|c| c.uuid), Some(seeded));

    Ok(())
}

#[test]
fn write_failures_do_not_surface() -> TestResult {
    let dir = tempfile::tempdir()?;
    let blocked = dir.path().join("blocked");
    fs::write(&blocked, "not a directory")?;

    let mut cart = CartStore::init(FileStore::new(&blocked), BRL);
    cart.add_item(
        Product::new("ssd", "SSD NVMe 1TB", Money::from_minor(45_990, BRL)),
        1,
    )?;

    assert_eq!(cart.cart().item_count(), 1);

    Ok(())
}
