//! Storage
//!
//! Durable key-value storage for whole JSON documents. Every store loads its
//! entire document on start and rewrites it in full on every mutation.

use serde::{Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{debug, warn};

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

/// Key holding the serialized cart.
pub const CART_STORAGE_KEY: &str = "techstore-cart";

/// Key holding the coupon registry working set.
pub const COUPONS_STORAGE_KEY: &str = "techstore-coupons";

/// Key holding the order history.
pub const ORDERS_STORAGE_KEY: &str = "techstore-orders";

/// Storage errors.
#[derive(Debug, Error)]
pub enum StorageError {
    /// The key is not usable as a storage name.
    #[error("invalid storage key: {0}")]
    InvalidKey(String),

    /// Underlying IO failure.
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),

    /// Document could not be encoded or decoded.
    #[error("storage document error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A string key-value store, in the spirit of browser local storage.
pub trait KeyValueStore {
    /// Read the raw document stored under `key`, if any.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be read.
    fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Replace the document stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn set(&mut self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Delete the document stored under `key`. Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backing store cannot be written.
    fn remove(&mut self, key: &str) -> Result<(), StorageError>;
}

/// Outcome of reading a document.
#[derive(Debug)]
pub enum Loaded<T> {
    /// A document was stored and decoded.
    Found(T),

    /// Nothing is stored under the key.
    Missing,

    /// Something is stored but it could not be read or decoded.
    Unreadable,
}

impl<T> Loaded<T> {
    /// The decoded document, if there was one.
    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(value) => Some(value),
            Self::Missing | Self::Unreadable => None,
        }
    }
}

/// Read and decode the document under `key`.
///
/// Failures are logged and reported as [`Loaded::Unreadable`] so callers can
/// fall back to an empty state instead of failing.
pub fn load_document<T, S>(store: &S, key: &str) -> Loaded<T>
where
    T: DeserializeOwned,
    S: KeyValueStore + ?Sized,
{
    let raw = match store.get(key) {
        Ok(Some(raw)) => raw,
        Ok(None) => return Loaded::Missing,
        Err(error) => {
            warn!(key, %error, "failed to read stored document");
            return Loaded::Unreadable;
        }
    };

    match serde_json::from_str(&raw) {
        Ok(value) => {
            debug!(key, bytes = raw.len(), "loaded stored document");
            Loaded::Found(value)
        }
        Err(error) => {
            warn!(key, %error, "stored document is corrupt, ignoring it");
            Loaded::Unreadable
        }
    }
}

/// Encode and write `value` under `key`.
///
/// Writes are fire-and-forget: a failure is logged and otherwise ignored.
pub fn save_document<T, S>(store: &mut S, key: &str, value: &T)
where
    T: Serialize + ?Sized,
    S: KeyValueStore + ?Sized,
{
    if let Err(error) = encode_and_set(store, key, value) {
        warn!(key, %error, "failed to persist document");
    }
}

fn encode_and_set<T, S>(store: &mut S, key: &str, value: &T) -> Result<(), StorageError>
where
    T: Serialize + ?Sized,
    S: KeyValueStore + ?Sized,
{
    let raw = serde_json::to_string(value)?;

    store.set(key, &raw)
}
