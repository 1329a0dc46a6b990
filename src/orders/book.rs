//! Order book

use jiff::Timestamp;
use tracing::{debug, info, warn};

use crate::{
    orders::{
        Order, OrderDraft, OrderError, OrderMaterializer, OrderRecord, OrderStatus, OrderUuid,
        PaymentStatus,
    },
    storage::{KeyValueStore, ORDERS_STORAGE_KEY, load_document, save_document},
};

/// Order history, newest first, mirrored to storage.
#[derive(Debug)]
pub struct OrderBook<S: KeyValueStore> {
    store: S,
    orders: Vec<Order>,
}

impl<S: KeyValueStore> OrderBook<S> {
    /// Load the order history from `store`. Unreadable data yields an empty
    /// history; individual unreadable orders are skipped.
    pub fn init(store: S) -> Self {
        let orders: Vec<Order> = load_document::<Vec<OrderRecord>, _>(&store, ORDERS_STORAGE_KEY)
            .found()
            .unwrap_or_default()
            .into_iter()
            .filter_map(|record| {
                let id = record.id;

                Order::try_from(record)
                    .inspect_err(|error| warn!(%id, %error, "skipping stored order"))
                    .ok()
            })
            .collect();

        debug!(count = orders.len(), "loaded orders");

        Self { store, orders }
    }

    /// All orders, newest first.
    pub fn list(&self) -> &[Order] {
        &self.orders
    }

    /// Order by id.
    pub fn get(&self, uuid: OrderUuid) -> Option<&Order> {
        self.orders.iter().find(|order| order.uuid == uuid)
    }

    /// Orders placed with `email`, newest first.
    pub fn for_customer<'a>(&'a self, email: &'a str) -> impl Iterator<Item = &'a Order> + 'a {
        self.orders
            .iter()
            .filter(move |order| order.customer.email.eq_ignore_ascii_case(email))
    }

    /// Change the fulfilment status of an order.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::NotFound`] for an unknown id.
    pub fn update_status(
        &mut self,
        uuid: OrderUuid,
        status: OrderStatus,
    ) -> Result<&Order, OrderError> {
        self.update(uuid, |order| order.status = status)
    }

    /// Change the payment status of an order.
    ///
    /// # Errors
    ///
    /// Returns [`OrderError::NotFound`] for an unknown id.
    pub fn update_payment_status(
        &mut self,
        uuid: OrderUuid,
        payment_status: PaymentStatus,
    ) -> Result<&Order, OrderError> {
        self.update(uuid, |order| order.payment_status = payment_status)
    }

    fn update(
        &mut self,
        uuid: OrderUuid,
        change: impl FnOnce(&mut Order),
    ) -> Result<&Order, OrderError> {
        let idx = self
            .orders
            .iter()
            .position(|order| order.uuid == uuid)
            .ok_or(OrderError::NotFound(uuid))?;

        if let Some(order) = self.orders.get_mut(idx) {
            change(order);
            order.updated_at = Timestamp::now();

            debug!(
                %uuid,
                status = %order.status,
                payment_status = %order.payment_status,
                "order updated"
            );
        }

        self.persist();

        self.orders.get(idx).ok_or(OrderError::NotFound(uuid))
    }

    fn persist(&mut self) {
        let records: Vec<OrderRecord> = self.orders.iter().map(OrderRecord::from).collect();

        save_document(&mut self.store, ORDERS_STORAGE_KEY, &records);
    }
}

impl<S: KeyValueStore> OrderMaterializer for OrderBook<S> {
    fn materialize(&mut self, draft: OrderDraft) -> Result<Order, OrderError> {
        if draft.items.is_empty() {
            return Err(OrderError::EmptyOrder);
        }

        let now = Timestamp::now();

        let order = Order {
            uuid: OrderUuid::new_v4(),
            customer: draft.customer,
            items: draft.items,
            subtotal: draft.summary.subtotal,
            discount: draft.summary.discount,
            coupon_code: draft.summary.coupon_code,
            total: draft.summary.final_price,
            shipping_address: draft.shipping_address,
            payment_method: draft.payment_method,
            status: OrderStatus::Pending,
            payment_status: draft.payment_status,
            payment_id: draft.payment_id,
            created_at: now,
            updated_at: now,
        };

        info!(
            uuid = %order.uuid,
            total = %order.total,
            coupon_code = order.coupon_code.as_deref(),
            "order created"
        );

        self.orders.insert(0, order.clone());
        self.persist();

        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use rusty_money::{Money, iso::BRL};
    use testresult::TestResult;

    use crate::{
        cart::CartItem,
        orders::{Customer, PaymentMethod, ShippingAddress},
        pricing::derive,
        products::Product,
        storage::MemoryStore,
    };

    use super::*;

    fn draft(email: &str) -> OrderDraft {
        let item = CartItem::new(
            Product::new("notebook", "Notebook", Money::from_minor(450_000, BRL)),
            1,
        );

        OrderDraft {
            customer: Customer::guest("Ana", email),
            summary: derive(item.line_total(), None),
            items: vec![item],
            shipping_address: ShippingAddress::default(),
            payment_method: PaymentMethod::Pix,
            payment_status: PaymentStatus::Approved,
            payment_id: Some("sim-1".to_string()),
        }
    }

    #[test]
    fn materialize_copies_amounts_and_puts_newest_first() -> TestResult {
        let mut book = OrderBook::init(MemoryStore::new());

        let first = book.materialize(draft("ana@example.com"))?;
        let second = book.materialize(draft("bia@example.com"))?;

        assert_eq!(first.total, Money::from_minor(450_000, BRL));
        assert_eq!(first.status, OrderStatus::Pending);
        assert_eq!(book.list().len(), 2);
        assert_eq!(book.list().first().map(|o| o.uuid), Some(second.uuid));

        Ok(())
    }

    #[test]
    fn empty_drafts_are_rejected() {
        let mut book = OrderBook::init(MemoryStore::new());
        let mut empty = draft("ana@example.com");
        empty.items.clear();

        assert_eq!(book.materialize(empty), Err(OrderError::EmptyOrder));
        assert!(book.list().is_empty());
    }

    #[test]
    fn statuses_update_and_persist() -> TestResult {
        let mut book = OrderBook::init(MemoryStore::new());
        let order = book.materialize(draft("ana@example.com"))?;

        book.update_status(order.uuid, OrderStatus::Shipped)?;
        book.update_payment_status(order.uuid, PaymentStatus::Rejected)?;

        let reloaded = OrderBook::init(book.store.clone());
        let stored = reloaded.get(order.uuid);

        assert_eq!(stored.map(|o| o.status), Some(OrderStatus::Shipped));
        assert_eq!(
            stored.map(|o| o.payment_status),
            Some(PaymentStatus::Rejected)
        );
        assert_eq!(stored.map(|o| o.items.clone()), Some(order.items));

        Ok(())
    }

    #[test]
    fn updating_an_unknown_order_fails() {
        let mut book = OrderBook::init(MemoryStore::new());
        let uuid = OrderUuid::new_v4();

        assert_eq!(
            book.update_status(uuid, OrderStatus::Cancelled).err(),
            Some(OrderError::NotFound(uuid))
        );
    }

    #[test]
    fn for_customer_filters_by_email() -> TestResult {
        let mut book = OrderBook::init(MemoryStore::new());
        book.materialize(draft("ana@example.com"))?;
        book.materialize(draft("bia@example.com"))?;
        book.materialize(draft("ANA@example.com"))?;

        assert_eq!(book.for_customer("ana@example.com").count(), 2);

        Ok(())
    }
}
