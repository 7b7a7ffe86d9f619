//! Inventory store: the sole owner of stock quantity mutation.
//!
//! All quantity changes go through [`InventoryStore::reserve`] and
//! [`InventoryStore::release`]. The conditional decrement inside `reserve` is
//! the concurrency-correctness mechanism; the availability check performed
//! by callers beforehand is advisory only.

use std::sync::Arc;

use thiserror::Error;

use epistock_core::ItemId;
use epistock_inventory::InventoryItem;

pub mod in_memory;

pub use in_memory::InMemoryInventoryStore;

/// Inventory store operation error.
///
/// Infrastructure errors (storage, missing rows) plus the stock gate outcome,
/// which surfaces here because the gate lives inside the atomic operation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum InventoryStoreError {
    #[error("item not found")]
    NotFound,

    /// The conditional decrement found no available unit.
    #[error("out of stock: {0}")]
    OutOfStock(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

/// Storage contract for equipment items.
///
/// Implementations must make `reserve` a single storage-level operation
/// (the equivalent of `UPDATE .. SET quantity = quantity - 1 WHERE
/// quantity > 0`): of two concurrent reservations against an item with one
/// unit left, exactly one succeeds.
pub trait InventoryStore: Send + Sync {
    /// Read one item. `NotFound` if it was never registered.
    fn get(&self, item_id: ItemId) -> Result<InventoryItem, InventoryStoreError>;

    /// Register or replace an item record (master data; used by the
    /// surrounding CRUD layer and tests).
    fn insert(&self, item: InventoryItem) -> Result<(), InventoryStoreError>;

    /// Atomically check `quantity > 0` and decrement by 1.
    fn reserve(&self, item_id: ItemId) -> Result<(), InventoryStoreError>;

    /// Atomically increment quantity by 1. No upper bound.
    fn release(&self, item_id: ItemId) -> Result<(), InventoryStoreError>;
}

/// Shared-backend services delegate through `Arc`.
impl<T: InventoryStore + ?Sized> InventoryStore for Arc<T> {
    fn get(&self, item_id: ItemId) -> Result<InventoryItem, InventoryStoreError> {
        (**self).get(item_id)
    }

    fn insert(&self, item: InventoryItem) -> Result<(), InventoryStoreError> {
        (**self).insert(item)
    }

    fn reserve(&self, item_id: ItemId) -> Result<(), InventoryStoreError> {
        (**self).reserve(item_id)
    }

    fn release(&self, item_id: ItemId) -> Result<(), InventoryStoreError> {
        (**self).release(item_id)
    }
}
