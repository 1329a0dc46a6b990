//! Checkout
//!
//! Turns the cart into an order: re-validates the applied coupon, charges the
//! customer, materializes the order, consumes the coupon use and empties the
//! cart. Nothing is committed until the payment has been approved.

use std::time::Duration;

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    cart::CartStore,
    coupons::{CouponRegistry, CouponRejection},
    orders::{
        Customer, Order, OrderDraft, OrderError, OrderMaterializer, PaymentMethod, PaymentStatus,
        ShippingAddress,
    },
    prices::Price,
    pricing::derive,
    storage::KeyValueStore,
};

/// Default processing time of the [`SimulatedGateway`].
pub const DEFAULT_PAYMENT_DELAY: Duration = Duration::from_secs(2);

/// A charge sent to the payment gateway.
#[derive(Debug, Clone, PartialEq)]
pub struct PaymentRequest {
    /// Amount to charge
    pub amount: Price,

    /// How the customer pays
    pub method: PaymentMethod,

    /// Email of the paying customer
    pub customer_email: String,
}

/// Gateway answer to a charge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentOutcome {
    /// Whether the charge went through
    pub status: PaymentStatus,

    /// Gateway transaction reference
    pub transaction_id: String,
}

/// Failure to reach or use the gateway.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PaymentError {
    /// The gateway could not process the request.
    #[error("payment gateway unavailable: {0}")]
    Unavailable(String),
}

/// Charges customers.
#[automock]
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Charge the amount in `request`.
    ///
    /// # Errors
    ///
    /// Returns a [`PaymentError`] if the gateway cannot process the charge. A
    /// refused charge is an `Ok` outcome with a rejected status.
    async fn charge(&self, request: &PaymentRequest) -> Result<PaymentOutcome, PaymentError>;
}

/// Gateway that waits for `delay` and approves every charge.
#[derive(Debug, Clone, Copy)]
pub struct SimulatedGateway {
    delay: Duration,
}

impl SimulatedGateway {
    /// Create a gateway with the given processing delay.
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for SimulatedGateway {
    fn default() -> Self {
        Self::new(DEFAULT_PAYMENT_DELAY)
    }
}

#[async_trait]
impl PaymentGateway for SimulatedGateway {
    async fn charge(&self, request: &PaymentRequest) -> Result<PaymentOutcome, PaymentError> {
        tokio::time::sleep(self.delay).await;

        let transaction_id = format!("sim-{}", Uuid::new_v4().simple());

        info!(
            amount = %request.amount,
            method = %request.method,
            %transaction_id,
            "simulated payment approved"
        );

        Ok(PaymentOutcome {
            status: PaymentStatus::Approved,
            transaction_id,
        })
    }
}

/// Errors that stop a checkout. None of them leave partial changes behind.
#[derive(Debug, Error, PartialEq)]
pub enum CheckoutError {
    /// There is nothing to buy.
    #[error("the cart is empty")]
    EmptyCart,

    /// The applied coupon is no longer valid.
    #[error("coupon rejected: {0}")]
    Coupon(#[from] CouponRejection),

    /// The applied coupon's discount was edited after it was applied.
    #[error("coupon {0} changed since it was applied")]
    CouponChanged(String),

    /// The gateway refused the charge.
    #[error("payment declined")]
    PaymentDeclined,

    /// The gateway failed.
    #[error(transparent)]
    Payment(#[from] PaymentError),

    /// The order could not be created.
    #[error(transparent)]
    Order(#[from] OrderError),
}

/// Customer-supplied checkout data.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutDetails {
    /// Who is buying
    pub customer: Customer,

    /// Where to deliver
    pub shipping_address: ShippingAddress,

    /// How to pay
    pub payment_method: PaymentMethod,
}

/// Checkout flow over a payment gateway.
#[derive(Debug)]
pub struct Checkout<G: PaymentGateway> {
    gateway: G,
}

impl<G: PaymentGateway> Checkout<G> {
    /// Create a checkout charging through `gateway`.
    pub fn new(gateway: G) -> Self {
        Self { gateway }
    }

    /// Place an order for the current cart.
    ///
    /// # Errors
    ///
    /// Returns a [`CheckoutError`] if the cart is empty, the applied coupon no
    /// longer validates, the payment fails or the order cannot be stored.
    pub async fn place_order<C, K, O>(
        &self,
        cart: &mut CartStore<C>,
        coupons: &mut CouponRegistry<K>,
        orders: &mut O,
        details: CheckoutDetails,
    ) -> Result<Order, CheckoutError>
    where
        C: KeyValueStore,
        K: KeyValueStore,
        O: OrderMaterializer,
    {
        self.place_order_at(cart, coupons, orders, details, Timestamp::now())
            .await
    }

    /// Like [`Checkout::place_order`], validating the coupon at `now`.
    ///
    /// # Errors
    ///
    /// See [`Checkout::place_order`].
    pub async fn place_order_at<C, K, O>(
        &self,
        cart: &mut CartStore<C>,
        coupons: &mut CouponRegistry<K>,
        orders: &mut O,
        details: CheckoutDetails,
        now: Timestamp,
    ) -> Result<Order, CheckoutError>
    where
        C: KeyValueStore,
        K: KeyValueStore,
        O: OrderMaterializer,
    {
        if cart.cart().is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        let subtotal = cart.total_price();

        let redeemed = match cart.applied_coupon() {
            Some(applied) => {
                let coupon = coupons.validate_at(&applied.code, subtotal, now)?;

                // Same code, different coupon: the applied one was deleted.
                if coupon.uuid != applied.uuid {
                    return Err(CheckoutError::Coupon(CouponRejection::NotFound));
                }

                if coupon.discount != applied.discount {
                    return Err(CheckoutError::CouponChanged(coupon.code.clone()));
                }

                Some(coupon.uuid)
            }
            None => None,
        };

        let summary = derive(subtotal, cart.applied_coupon());

        let request = PaymentRequest {
            amount: summary.final_price,
            method: details.payment_method,
            customer_email: details.customer.email.clone(),
        };

        let outcome = self.gateway.charge(&request).await?;

        if outcome.status != PaymentStatus::Approved {
            warn!(amount = %request.amount, status = %outcome.status, "payment declined");

            return Err(CheckoutError::PaymentDeclined);
        }

        let order = orders.materialize(OrderDraft {
            customer: details.customer,
            items: cart.cart().items().to_vec(),
            summary,
            shipping_address: details.shipping_address,
            payment_method: details.payment_method,
            payment_status: outcome.status,
            payment_id: Some(outcome.transaction_id),
        })?;

        if let Some(uuid) = redeemed
            && let Err(error) = coupons.record_redemption(uuid)
        {
            warn!(%uuid, %error, order = %order.uuid, "coupon redemption not recorded");
        }

        cart.clear();

        info!(order = %order.uuid, total = %order.total, "checkout complete");

        Ok(order)
    }
}

#[cfg(test)]
mod tests {
    use jiff::SignedDuration;
    use rusty_money::{Money, iso::BRL};
    use testresult::TestResult;

    use crate::{
        coupons::{CouponUpdate, NewCoupon, test_support::now},
        discounts::CouponDiscount,
        orders::OrderBook,
        products::Product,
        storage::MemoryStore,
    };

    use super::*;

    fn brl(minor: i64) -> Price {
        Money::from_minor(minor, BRL)
    }

    fn details() -> CheckoutDetails {
        CheckoutDetails {
            customer: Customer::guest("Ana", "ana@example.com"),
            shipping_address: ShippingAddress::default(),
            payment_method: PaymentMethod::CreditCard,
        }
    }

    fn approving() -> MockPaymentGateway {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_charge().returning(|_| {
            Ok(PaymentOutcome {
                status: PaymentStatus::Approved,
                transaction_id: "tx-1".to_string(),
            })
        });

        gateway
    }

    struct Fixture {
        cart: CartStore<MemoryStore>,
        coupons: CouponRegistry<MemoryStore>,
        orders: OrderBook<MemoryStore>,
    }

    fn fixture() -> TestResult<Fixture> {
        let mut cart = CartStore::init(MemoryStore::new(), BRL);
        cart.add_item(Product::new("notebook", "Notebook", brl(450_000)), 1)?;

        Ok(Fixture {
            cart,
            coupons: CouponRegistry::init_at(MemoryStore::new(), BRL, now()),
            orders: OrderBook::init(MemoryStore::new()),
        })
    }

    #[tokio::test]
    async fn successful_checkout_commits_everything() -> TestResult {
        let mut f = fixture()?;
        let coupon = f.coupons.validate_at("BEMVINDO10", f.cart.total_price(), now())?.clone();
        f.cart.apply_coupon(coupon.clone());
        let shown = f.cart.summary();

        let order = Checkout::new(approving())
            .place_order_at(&mut f.cart, &mut f.coupons, &mut f.orders, details(), now())
            .await?;

        assert_eq!(order.summary(), shown);
        assert_eq!(order.payment_id.as_deref(), Some("tx-1"));
        assert_eq!(f.coupons.get(coupon.uuid).map(|c| c.usage_count), Some(1));
        assert!(f.cart.cart().is_empty());
        assert!(f.cart.applied_coupon().is_none());
        assert_eq!(f.orders.list().len(), 1);

        Ok(())
    }

    #[tokio::test]
    async fn empty_cart_is_rejected_before_charging() -> TestResult {
        let mut f = fixture()?;
        f.cart.clear();

        let mut gateway = MockPaymentGateway::new();
        gateway.expect_charge().never();

        let result = Checkout::new(gateway)
            .place_order_at(&mut f.cart, &mut f.coupons, &mut f.orders, details(), now())
            .await;

        assert_eq!(result, Err(CheckoutError::EmptyCart));
        assert!(f.orders.list().is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn declined_payment_changes_nothing() -> TestResult {
        let mut f = fixture()?;
        let coupon = f.coupons.validate_at("BEMVINDO10", f.cart.total_price(), now())?.clone();
        f.cart.apply_coupon(coupon.clone());

        let mut gateway = MockPaymentGateway::new();
        gateway.expect_charge().times(1).returning(|_| {
            Ok(PaymentOutcome {
                status: PaymentStatus::Rejected,
                transaction_id: "tx-2".to_string(),
            })
        });

        let result = Checkout::new(gateway)
            .place_order_at(&mut f.cart, &mut f.coupons, &mut f.orders, details(), now())
            .await;

        assert_eq!(result, Err(CheckoutError::PaymentDeclined));
        assert_eq!(f.cart.cart().len(), 1);
        assert!(f.cart.applied_coupon().is_some());
        assert_eq!(f.coupons.get(coupon.uuid).map(|c| c.usage_count), Some(0));
        assert!(f.orders.list().is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn coupon_that_became_invalid_blocks_checkout() -> TestResult {
        let mut f = fixture()?;
        let coupon = f.coupons.validate_at("BEMVINDO10", f.cart.total_price(), now())?.clone();
        f.cart.apply_coupon(coupon.clone());
        f.coupons.set_active(coupon.uuid, false)?;

        let mut gateway = MockPaymentGateway::new();
        gateway.expect_charge().never();

        let result = Checkout::new(gateway)
            .place_order_at(&mut f.cart, &mut f.coupons, &mut f.orders, details(), now())
            .await;

        assert_eq!(result, Err(CheckoutError::Coupon(CouponRejection::Inactive)));
        assert_eq!(f.cart.cart().len(), 1);
        assert!(f.orders.list().is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn recreated_code_does_not_redeem_the_replacement() -> TestResult {
        let mut f = fixture()?;
        let coupon = f.coupons.validate_at("BEMVINDO10", f.cart.total_price(), now())?.clone();
        f.cart.apply_coupon(coupon.clone());
        f.coupons.delete_coupon(coupon.uuid)?;

        let replacement = f
            .coupons
            .add_coupon(NewCoupon {
                code: "BEMVINDO10".to_string(),
                description: "R$ 1 off".to_string(),
                discount: CouponDiscount::AmountOff(brl(100)),
                min_purchase: brl(0),
                starts_at: now() - SignedDuration::from_hours(1),
                ends_at: now() + SignedDuration::from_hours(1),
                usage_limit: 10,
                is_active: true,
            })?
            .uuid;

        let mut gateway = MockPaymentGateway::new();
        gateway.expect_charge().never();

        let result = Checkout::new(gateway)
            .place_order_at(&mut f.cart, &mut f.coupons, &mut f.orders, details(), now())
            .await;

        assert_eq!(result, Err(CheckoutError::Coupon(CouponRejection::NotFound)));
        assert_eq!(f.coupons.get(replacement).map(|c| c.usage_count), Some(0));
        assert!(f.orders.list().is_empty());

        Ok(())
    }

    #[tokio::test]
    async fn edited_discount_must_be_reapplied() -> TestResult {
        let mut f = fixture()?;
        let coupon = f.coupons.validate_at("BEMVINDO10", f.cart.total_price(), now())?.clone();
        f.cart.apply_coupon(coupon.clone());
        f.coupons.update_coupon(
            coupon.uuid,
            CouponUpdate {
                discount: Some(CouponDiscount::AmountOff(brl(100))),
                ..CouponUpdate::default()
            },
        )?;

        let mut gateway = MockPaymentGateway::new();
        gateway.expect_charge().never();

        let result = Checkout::new(gateway)
            .place_order_at(&mut f.cart, &mut f.coupons, &mut f.orders, details(), now())
            .await;

        assert_eq!(
            result,
            Err(CheckoutError::CouponChanged("BEMVINDO10".to_string()))
        );
        assert_eq!(f.coupons.get(coupon.uuid).map(|c| c.usage_count), Some(0));
        assert!(f.orders.list().is_empty());

        let current = f.coupons.validate_at("BEMVINDO10", f.cart.total_price(), now())?.clone();
        f.cart.apply_coupon(current);

        let order = Checkout::new(approving())
            .place_order_at(&mut f.cart, &mut f.coupons, &mut f.orders, details(), now())
            .await?;

        assert_eq!(order.summary().discount, brl(100));
        assert_eq!(f.coupons.get(coupon.uuid).map(|c| c.usage_count), Some(1));

        Ok(())
    }

    #[tokio::test(start_paused = true)]
    async fn simulated_gateway_approves_after_its_delay() -> TestResult {
        let gateway = SimulatedGateway::default();
        let request = PaymentRequest {
            amount: brl(1_000),
            method: PaymentMethod::Pix,
            customer_email: "ana@example.com".to_string(),
        };

        let started = tokio::time::Instant::now();
        let outcome = gateway.charge(&request).await?;

        assert_eq!(outcome.status, PaymentStatus::Approved);
        assert!(outcome.transaction_id.starts_with("sim-"));
        assert!(started.elapsed() >= DEFAULT_PAYMENT_DELAY);

        Ok(())
    }
}
