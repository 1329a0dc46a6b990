//! Cart
//!
//! The shopping cart and the store that owns it, its applied coupon and its
//! persisted document.

use jiff::Timestamp;
use rusty_money::iso::Currency;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::{
    coupons::Coupon,
    prices::{MoneyRecord, Price, PriceError, currency_by_code, zero},
    pricing::{PriceSummary, derive, total_price},
    products::{Product, ProductId, ProductRecord},
    storage::{CART_STORAGE_KEY, KeyValueStore, load_document, save_document},
    uuids::TypedUuid,
};

/// Cart line UUID
pub type CartItemUuid = TypedUuid<CartItem>;

/// Errors related to cart mutations.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CartError {
    /// The product's currency differs from the cart currency (product, product currency, cart currency).
    #[error("Product {0} has currency {1}, but cart has currency {2}")]
    CurrencyMismatch(ProductId, &'static str, &'static str),
}

/// One line of the cart: a product snapshot and how many of it.
#[derive(Debug, Clone, PartialEq)]
pub struct CartItem {
    /// Line id
    pub uuid: CartItemUuid,

    /// Id of the product on this line
    pub product_id: ProductId,

    /// Product as it was when first added
    pub product: Product,

    /// Quantity, at least 1
    pub quantity: u32,

    /// When the line was created
    pub added_at: Timestamp,
}

impl CartItem {
    /// Create a new line for `product`.
    pub fn new(product: Product, quantity: u32) -> Self {
        Self {
            uuid: CartItemUuid::new_v4(),
            product_id: product.id.clone(),
            product,
            quantity,
            added_at: Timestamp::now(),
        }
    }

    /// Unit price times quantity.
    pub fn line_total(&self) -> Price {
        crate::pricing::line_total(self.product.price, self.quantity)
    }
}

/// Cart
///
/// `total` and `item_count` are recomputed from the lines after every change.
#[derive(Debug, Clone, PartialEq)]
pub struct Cart {
    items: Vec<CartItem>,
    total: Price,
    item_count: u64,
    currency: &'static Currency,
}

impl Cart {
    /// Create an empty cart.
    pub fn new(currency: &'static Currency) -> Self {
        Self {
            items: Vec::new(),
            total: zero(currency),
            item_count: 0,
            currency,
        }
    }

    /// Lines, in the order they were added.
    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    /// Pre-discount subtotal.
    pub fn total(&self) -> Price {
        self.total
    }

    /// Sum of quantities across lines.
    pub fn item_count(&self) -> u64 {
        self.item_count
    }

    /// Get the currency of the cart.
    pub fn currency(&self) -> &'static Currency {
        self.currency
    }

    /// Get the number of lines in the cart.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Check if the cart is empty.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The line holding `product_id`, if any.
    pub fn find(&self, product_id: &ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| &item.product_id == product_id)
    }

    fn find_mut(&mut self, product_id: &ProductId) -> Option<&mut CartItem> {
        self.items
            .iter_mut()
            .find(|item| &item.product_id == product_id)
    }

    fn recalculate(&mut self) {
        self.total = total_price(&self.items, self.currency);
        self.item_count = self
            .items
            .iter()
            .map(|item| u64::from(item.quantity))
            .sum();
    }
}

/// Owns the cart, the coupon applied to it and the storage it is mirrored to.
#[derive(Debug)]
pub struct CartStore<S: KeyValueStore> {
    store: S,
    cart: Cart,
    applied_coupon: Option<Coupon>,
}

impl<S: KeyValueStore> CartStore<S> {
    /// Load the persisted cart, falling back to an empty cart when nothing
    /// usable is stored.
    pub fn init(store: S, currency: &'static Currency) -> Self {
        let cart = load_document::<CartRecord, _>(&store, CART_STORAGE_KEY)
            .found()
            .map_or_else(|| Cart::new(currency), |record| record.into_cart(currency));

        debug!(
            lines = cart.len(),
            item_count = cart.item_count(),
            "cart loaded"
        );

        Self {
            store,
            cart,
            applied_coupon: None,
        }
    }

    /// The current cart.
    pub fn cart(&self) -> &Cart {
        &self.cart
    }

    /// The backing store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Add `quantity` of `product`, merging into the existing line when the
    /// product is already in the cart. A zero quantity changes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::CurrencyMismatch`] if the product is priced in a
    /// different currency than the cart.
    pub fn add_item(&mut self, product: Product, quantity: u32) -> Result<(), CartError> {
        let product_currency = product.price.currency();

        if product_currency != self.cart.currency {
            return Err(CartError::CurrencyMismatch(
                product.id,
                product_currency.iso_alpha_code,
                self.cart.currency.iso_alpha_code,
            ));
        }

        if quantity == 0 {
            return Ok(());
        }

        if let Some(item) = self.cart.find_mut(&product.id) {
            item.quantity = item.quantity.saturating_add(quantity);
        } else {
            self.cart.items.push(CartItem::new(product, quantity));
        }

        self.commit("item added");

        Ok(())
    }

    /// Overwrite the quantity of a line. Zero removes it; an absent product
    /// is ignored.
    pub fn set_quantity(&mut self, product_id: &ProductId, quantity: u32) {
        if quantity == 0 {
            self.remove_item(product_id);
            return;
        }

        let Some(item) = self.cart.find_mut(product_id) else {
            return;
        };

        item.quantity = quantity;

        self.commit("quantity updated");
    }

    /// Remove the line for `product_id`, if present.
    pub fn remove_item(&mut self, product_id: &ProductId) {
        let before = self.cart.len();

        self.cart.items.retain(|item| &item.product_id != product_id);

        if self.cart.len() != before {
            self.commit("item removed");
        }
    }

    /// Empty the cart and drop the applied coupon.
    pub fn clear(&mut self) {
        self.cart.items.clear();
        self.applied_coupon = None;

        self.commit("cart cleared");
    }

    /// Whether `product_id` has a line in the cart.
    pub fn contains(&self, product_id: &ProductId) -> bool {
        self.cart.find(product_id).is_some()
    }

    /// The line for `product_id`, if any.
    pub fn find(&self, product_id: &ProductId) -> Option<&CartItem> {
        self.cart.find(product_id)
    }

    /// Apply a validated coupon, replacing any previous one.
    pub fn apply_coupon(&mut self, coupon: Coupon) {
        debug!(code = %coupon.code, "coupon applied");

        self.applied_coupon = Some(coupon);
    }

    /// Drop the applied coupon, returning it.
    pub fn remove_coupon(&mut self) -> Option<Coupon> {
        self.applied_coupon.take()
    }

    /// The coupon currently applied, if any.
    pub fn applied_coupon(&self) -> Option<&Coupon> {
        self.applied_coupon.as_ref()
    }

    /// Pre-discount subtotal.
    pub fn total_price(&self) -> Price {
        self.cart.total
    }

    /// Discount granted by the applied coupon.
    pub fn discount(&self) -> Price {
        self.summary().discount
    }

    /// Subtotal minus discount.
    pub fn final_price(&self) -> Price {
        self.summary().final_price
    }

    /// Derived amounts for the cart as it stands.
    pub fn summary(&self) -> PriceSummary {
        derive(self.cart.total, self.applied_coupon.as_ref())
    }

    fn commit(&mut self, change: &'static str) {
        self.cart.recalculate();

        debug!(
            change,
            lines = self.cart.len(),
            item_count = self.cart.item_count(),
            total = %self.cart.total,
            "cart changed"
        );

        save_document(
            &mut self.store,
            CART_STORAGE_KEY,
            &CartRecord::from(&self.cart),
        );
    }
}

/// Persisted cart line.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartItemRecord {
    /// Line id
    pub id: CartItemUuid,

    /// Product id
    pub product_id: ProductId,

    /// Product snapshot
    pub product: ProductRecord,

    /// Quantity
    pub quantity: u32,

    /// Creation time
    pub added_at: Timestamp,
}

impl From<&CartItem> for CartItemRecord {
    fn from(item: &CartItem) -> Self {
        Self {
            id: item.uuid,
            product_id: item.product_id.clone(),
            product: ProductRecord::from(&item.product),
            quantity: item.quantity,
            added_at: item.added_at,
        }
    }
}

impl TryFrom<CartItemRecord> for CartItem {
    type Error = PriceError;

    fn try_from(record: CartItemRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            uuid: record.id,
            product_id: record.product_id,
            product: record.product.try_into()?,
            quantity: record.quantity,
            added_at: record.added_at,
        })
    }
}

/// Persisted cart document.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartRecord {
    /// Lines
    pub items: Vec<CartItemRecord>,

    /// Subtotal at write time
    pub total: MoneyRecord,

    /// Item count at write time
    pub item_count: u64,

    /// Cart currency code
    pub currency: String,
}

impl From<&Cart> for CartRecord {
    fn from(cart: &Cart) -> Self {
        Self {
            items: cart.items.iter().map(CartItemRecord::from).collect(),
            total: cart.total.into(),
            item_count: cart.item_count,
            currency: cart.currency.iso_alpha_code.to_string(),
        }
    }
}

impl CartRecord {
    /// Rebuild a cart in `currency` from the stored document.
    ///
    /// Lines that do not decode, have a zero quantity, are priced in another
    /// currency or whose product id disagrees with the product are dropped. Repeated product ids are merged. Stored totals are
    /// ignored and recomputed.
    pub fn into_cart(self, currency: &'static Currency) -> Cart {
        if currency_by_code(&self.currency).ok() != Some(currency) {
            warn!(
                stored = self.currency,
                expected = currency.iso_alpha_code,
                "stored cart uses another currency, starting empty"
            );

            return Cart::new(currency);
        }

        let mut cart = Cart::new(currency);

        for record in self.items {
            let product_id = record.product_id.clone();

            let item = match CartItem::try_from(record) {
                Ok(item) => item,
                Err(error) => {
                    warn!(%product_id, %error, "dropping unreadable cart line");
                    continue;
                }
            };

            if item.quantity == 0
                || item.product.price.currency() != currency
                || item.product_id != item.product.id
            {
                warn!(%product_id, "dropping invalid cart line");
                continue;
            }

            if let Some(existing) = cart.find_mut(&item.product_id) {
                existing.quantity = existing.quantity.saturating_add(item.quantity);
                continue;
            }

            cart.items.push(item);
        }

        cart.recalculate();

        cart
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::{
        Money,
        iso::{BRL, USD},
    };
    use testresult::TestResult;

    use crate::{
        coupons::test_support::welcome_coupon, discounts::CouponDiscount, storage::MemoryStore,
    };

    use super::*;

    fn brl(minor: i64) -> Price {
        Money::from_minor(minor, BRL)
    }

    fn notebook() -> Product {
        Product::new("notebook", "Notebook Pro 14", brl(450_000))
    }

    fn mouse() -> Product {
        Product::new("mouse", "Mouse sem fio", brl(9_990))
    }

    fn empty_store() -> CartStore<MemoryStore> {
        CartStore::init(MemoryStore::new(), BRL)
    }

    #[test]
    fn adding_the_same_product_merges_lines() -> TestResult {
        let mut store = empty_store();

        store.add_item(mouse(), 1)?;
        store.add_item(mouse(), 2)?;

        assert_eq!(store.cart().len(), 1);
        assert_eq!(store.find(&"mouse".into()).map(|i| i.quantity), Some(3));
        assert_eq!(store.cart().item_count(), 3);
        assert_eq!(store.total_price(), brl(29_970));

        Ok(())
    }

    #[test]
    fn adding_zero_quantity_is_a_no_op() -> TestResult {
        let mut store = empty_store();

        store.add_item(mouse(), 0)?;

        assert!(store.cart().is_empty());
        assert!(store.store().is_empty());

        Ok(())
    }

    #[test]
    fn adding_a_foreign_currency_product_fails() {
        let mut store = empty_store();
        let product = Product::new("adapter", "Adapter", Money::from_minor(1_000, USD));

        assert_eq!(
            store.add_item(product, 1),
            Err(CartError::CurrencyMismatch(
                "adapter".into(),
                USD.iso_alpha_code,
                BRL.iso_alpha_code
            ))
        );
        assert!(store.cart().is_empty());
    }

    #[test]
    fn set_quantity_overwrites_and_zero_removes() -> TestResult {
        let mut store = empty_store();
        store.add_item(mouse(), 2)?;
        store.add_item(notebook(), 1)?;

        store.set_quantity(&"mouse".into(), 5);
        assert_eq!(store.cart().item_count(), 6);

        store.set_quantity(&"mouse".into(), 0);
        assert!(!store.contains(&"mouse".into()));
        assert_eq!(store.cart().item_count(), 1);

        store.set_quantity(&"keyboard".into(), 4);
        assert_eq!(store.cart().len(), 1);

        Ok(())
    }

    #[test]
    fn remove_item_is_idempotent() -> TestResult {
        let mut store = empty_store();
        store.add_item(mouse(), 1)?;

        store.remove_item(&"mouse".into());
        store.remove_item(&"mouse".into());

        assert!(store.cart().is_empty());
        assert_eq!(store.total_price(), brl(0));

        Ok(())
    }

    #[test]
    fn clear_drops_lines_and_coupon() -> TestResult {
        let mut store = empty_store();
        store.add_item(notebook(), 1)?;
        store.apply_coupon(welcome_coupon());

        store.clear();

        assert!(store.cart().is_empty());
        assert_eq!(store.cart().item_count(), 0);
        assert!(store.applied_coupon().is_none());
        assert_eq!(store.final_price(), brl(0));

        Ok(())
    }

    #[test]
    fn applying_a_coupon_replaces_the_previous_one() -> TestResult {
        let mut store = empty_store();
        store.add_item(notebook(), 1)?;

        store.apply_coupon(welcome_coupon());
        assert_eq!(store.discount(), brl(5_000));

        let mut fixed = welcome_coupon();
        fixed.code = "FRETE30".to_string();
        fixed.discount = CouponDiscount::AmountOff(brl(3_000));
        store.apply_coupon(fixed);

        assert_eq!(store.discount(), brl(3_000));
        assert_eq!(store.final_price(), brl(447_000));
        assert_eq!(store.summary().coupon_code.as_deref(), Some("FRETE30"));

        assert!(store.remove_coupon().is_some());
        assert_eq!(store.final_price(), store.total_price());

        Ok(())
    }

    #[test]
    fn cart_survives_a_reload() -> TestResult {
        let mut store = empty_store();
        store.add_item(notebook(), 1)?;
        store.add_item(mouse(), 2)?;
        store.apply_coupon(welcome_coupon());

        let reloaded = CartStore::init(store.store().clone(), BRL);

        assert_eq!(reloaded.cart(), store.cart());
        assert!(reloaded.applied_coupon().is_none());

        Ok(())
    }

    #[test]
    fn corrupt_document_falls_back_to_empty_cart() -> TestResult {
        let mut backing = MemoryStore::new();
        backing.set(CART_STORAGE_KEY, "not json")?;

        let store = CartStore::init(backing, BRL);

        assert!(store.cart().is_empty());
        assert_eq!(store.total_price(), brl(0));

        Ok(())
    }

    #[test]
    fn loaded_documents_are_revalidated() -> TestResult {
        let mut record = CartRecord::from(&Cart::new(BRL));
        let line = |quantity| CartItemRecord {
            id: CartItemUuid::new_v4(),
            product_id: "mouse".into(),
            product: ProductRecord::from(&mouse()),
            quantity,
            added_at: Timestamp::now(),
        };
        record.items = vec![line(2), line(0), line(1)];
        record.item_count = 999;

        let mut backing = MemoryStore::new();
        backing.set(CART_STORAGE_KEY, &serde_json::to_string(&record)?)?;

        let store = CartStore::init(backing, BRL);

        assert_eq!(store.cart().len(), 1);
        assert_eq!(store.cart().item_count(), 3);
        assert_eq!(store.total_price(), brl(29_970));

        Ok(())
    }

    #[test]
    fn lines_whose_product_id_disagrees_are_dropped() -> TestResult {
        let mut record = CartRecord::from(&Cart::new(BRL));
        record.items = vec![CartItemRecord {
            id: CartItemUuid::new_v4(),
            product_id: "keyboard".into(),
            product: ProductRecord::from(&mouse()),
            quantity: 1,
            added_at: Timestamp::now(),
        }];

        let mut backing = MemoryStore::new();
        backing.set(CART_STORAGE_KEY, &serde_json::to_string(&record)?)?;

        let mut store = CartStore::init(backing, BRL);
        assert!(store.cart().is_empty());

        store.add_item(mouse(), 1)?;
        assert_eq!(store.cart().len(), 1);

        Ok(())
    }
}
