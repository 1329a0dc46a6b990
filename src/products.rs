//! Products
//!
//! Products come from the catalog, which this crate only reads. The cart keeps
//! a copy of the product as it was when the line was added.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::prices::{MoneyRecord, Price, PriceError};

/// Catalog product identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(String);

impl ProductId {
    /// Create a product id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The id as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProductId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Product
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    /// Catalog id
    pub id: ProductId,

    /// Product name
    pub name: String,

    /// Unit price
    pub price: Price,

    /// Whether the catalog currently has stock
    pub in_stock: bool,
}

impl Product {
    /// Create an in-stock product.
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>, price: Price) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            in_stock: true,
        }
    }
}

/// Persisted product snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    /// Catalog id
    pub id: ProductId,

    /// Product name
    pub name: String,

    /// Unit price
    pub price: MoneyRecord,

    /// Stock flag at snapshot time
    pub in_stock: bool,
}

impl From<&Product> for ProductRecord {
    fn from(product: &Product) -> Self {
        Self {
            id: product.id.clone(),
            name: product.name.clone(),
            price: product.price.into(),
            in_stock: product.in_stock,
        }
    }
}

impl TryFrom<ProductRecord> for Product {
    type Error = PriceError;

    fn try_from(record: ProductRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: record.id,
            name: record.name,
            price: record.price.try_into()?,
            in_stock: record.in_stock,
        })
    }
}
