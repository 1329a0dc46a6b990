//! Orders
//!
//! Orders are immutable snapshots of a checked-out cart. Only their
//! fulfilment and payment statuses change after creation.

use std::{fmt, str::FromStr};

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    cart::{CartItem, CartItemRecord},
    prices::{MoneyRecord, Price, PriceError},
    pricing::PriceSummary,
    uuids::TypedUuid,
};

mod book;

pub use book::OrderBook;

/// Order UUID
pub type OrderUuid = TypedUuid<Order>;

/// Customer id used for anonymous checkouts.
pub const GUEST_CUSTOMER_ID: &str = "guest";

/// Errors from creating or updating orders.
#[derive(Debug, Error, PartialEq)]
pub enum OrderError {
    /// No order has this id.
    #[error("order {0} not found")]
    NotFound(OrderUuid),

    /// An order needs at least one line.
    #[error("an order needs at least one item")]
    EmptyOrder,

    /// A status name did not match any known status.
    #[error("unknown status: {0}")]
    UnknownStatus(String),

    /// A stored amount could not be decoded.
    #[error(transparent)]
    Price(#[from] PriceError),
}

/// Fulfilment status.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    /// Placed, not yet handled
    Pending,

    /// Being prepared
    Processing,

    /// Handed to the carrier
    Shipped,

    /// Received by the customer
    Delivered,

    /// Called off
    Cancelled,
}

/// Payment status.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// Awaiting confirmation
    Pending,

    /// Charged successfully
    Approved,

    /// Refused by the gateway
    Rejected,
}

/// How the customer pays.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Credit card
    CreditCard,

    /// Instant bank transfer
    Pix,

    /// Bank slip
    Boleto,
}

macro_rules! status_names {
    ($ty:ty { $($variant:ident => $name:literal),+ $(,)? }) => {
        impl $ty {
            /// Stored name of the value.
            pub fn as_str(self) -> &'static str {
                match self {
                    $(Self::$variant => $name),+
                }
            }
        }

        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = OrderError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
                    $($name => Ok(Self::$variant),)+
                    _ => Err(OrderError::UnknownStatus(s.to_string())),
                }
            }
        }
    };
}

status_names!(OrderStatus {
    Pending => "pending",
    Processing => "processing",
    Shipped => "shipped",
    Delivered => "delivered",
    Cancelled => "cancelled",
});

status_names!(PaymentStatus {
    Pending => "pending",
    Approved => "approved",
    Rejected => "rejected",
});

status_names!(PaymentMethod {
    CreditCard => "credit_card",
    Pix => "pix",
    Boleto => "boleto",
});

/// Who placed the order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Customer {
    /// Account id, or [`GUEST_CUSTOMER_ID`]
    pub id: String,

    /// Full name
    pub name: String,

    /// Contact email
    pub email: String,
}

impl Customer {
    /// A customer checking out without an account.
    pub fn guest(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: GUEST_CUSTOMER_ID.to_string(),
            name: name.into(),
            email: email.into(),
        }
    }
}

/// Delivery address.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShippingAddress {
    /// Street name
    pub street: String,

    /// Building number
    pub number: String,

    /// Apartment, block, etc.
    #[serde(default)]
    pub complement: Option<String>,

    /// Neighbourhood
    pub neighborhood: String,

    /// City
    pub city: String,

    /// State abbreviation
    pub state: String,

    /// Postal code
    pub zip_code: String,
}

/// Everything needed to create an order, assembled by checkout.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDraft {
    /// Who is buying
    pub customer: Customer,

    /// Cart lines at commit time
    pub items: Vec<CartItem>,

    /// Amounts the customer was shown
    pub summary: PriceSummary,

    /// Where to deliver
    pub shipping_address: ShippingAddress,

    /// How it was paid
    pub payment_method: PaymentMethod,

    /// Outcome of the payment
    pub payment_status: PaymentStatus,

    /// Gateway transaction reference
    pub payment_id: Option<String>,
}

/// Order
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    /// Order id
    pub uuid: OrderUuid,

    /// Who bought
    pub customer: Customer,

    /// Lines as they were in the cart
    pub items: Vec<CartItem>,

    /// Pre-discount total
    pub subtotal: Price,

    /// Coupon discount
    pub discount: Price,

    /// Code of the coupon used, if any
    pub coupon_code: Option<String>,

    /// Amount charged
    pub total: Price,

    /// Delivery address
    pub shipping_address: ShippingAddress,

    /// Payment method
    pub payment_method: PaymentMethod,

    /// Fulfilment status
    pub status: OrderStatus,

    /// Payment status
    pub payment_status: PaymentStatus,

    /// Gateway transaction reference
    pub payment_id: Option<String>,

    /// Creation time
    pub created_at: Timestamp,

    /// Last status change
    pub updated_at: Timestamp,
}

impl Order {
    /// Number of units across all lines.
    pub fn item_count(&self) -> u64 {
        self.items.iter().map(|item| u64::from(item.quantity)).sum()
    }

    /// The amounts of the order as a price summary.
    pub fn summary(&self) -> PriceSummary {
        PriceSummary {
            subtotal: self.subtotal,
            discount: self.discount,
            final_price: self.total,
            coupon_code: self.coupon_code.clone(),
        }
    }
}

/// Turns a checkout draft into a stored order.
pub trait OrderMaterializer {
    /// Create and store an order from `draft`. Amounts are copied verbatim.
    ///
    /// # Errors
    ///
    /// Returns an [`OrderError`] if the draft cannot become an order.
    fn materialize(&mut self, draft: OrderDraft) -> Result<Order, OrderError>;
}

/// Persisted order.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    /// Order id
    pub id: OrderUuid,

    /// Customer account id
    pub user_id: String,

    /// Customer name
    pub user_name: String,

    /// Customer email
    pub user_email: String,

    /// Lines
    pub items: Vec<CartItemRecord>,

    /// Pre-discount total
    pub subtotal: MoneyRecord,

    /// Coupon discount
    pub discount: MoneyRecord,

    /// Coupon code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coupon_code: Option<String>,

    /// Amount charged
    pub total: MoneyRecord,

    /// Delivery address
    pub shipping_address: ShippingAddress,

    /// Payment method
    pub payment_method: PaymentMethod,

    /// Fulfilment status
    pub status: OrderStatus,

    /// Payment status
    pub payment_status: PaymentStatus,

    /// Gateway transaction reference
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,

    /// Creation time
    pub created_at: Timestamp,

    /// Last status change
    pub updated_at: Timestamp,
}

impl From<&Order> for OrderRecord {
    fn from(order: &Order) -> Self {
        Self {
            id: order.uuid,
            user_id: order.customer.id.clone(),
            user_name: order.customer.name.clone(),
            user_email: order.customer.email.clone(),
            items: order.items.iter().map(CartItemRecord::from).collect(),
            subtotal: order.subtotal.into(),
            discount: order.discount.into(),
            coupon_code: order.coupon_code.clone(),
            total: order.total.into(),
            shipping_address: order.shipping_address.clone(),
            payment_method: order.payment_method,
            status: order.status,
            payment_status: order.payment_status,
            payment_id: order.payment_id.clone(),
            created_at: order.created_at,
            updated_at: order.updated_at,
        }
    }
}

impl TryFrom<OrderRecord> for Order {
    type Error = OrderError;

    fn try_from(record: OrderRecord) -> Result<Self, Self::Error> {
        let items = record
            .items
            .into_iter()
            .map(CartItem::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            uuid: record.id,
            customer: Customer {
                id: record.user_id,
                name: record.user_name,
                email: record.user_email,
            },
            items,
            subtotal: record.subtotal.try_into()?,
            discount: record.discount.try_into()?,
            coupon_code: record.coupon_code,
            total: record.total.try_into()?,
            shipping_address: record.shipping_address,
            payment_method: record.payment_method,
            status: record.status,
            payment_status: record.payment_status,
            payment_id: record.payment_id,
            created_at: record.created_at,
            updated_at: record.updated_at,
        })
    }
}
