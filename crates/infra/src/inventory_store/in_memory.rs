use std::collections::HashMap;
use std::sync::RwLock;

use epistock_core::{DomainError, ItemId};
use epistock_inventory::InventoryItem;

use super::{InventoryStore, InventoryStoreError};

/// In-memory inventory store.
///
/// Intended for tests/dev. The conditional decrement runs entirely inside one
/// write-lock section, which gives it the same all-or-nothing behavior as a
/// single-row conditional `UPDATE` in a real database.
#[derive(Debug, Default)]
pub struct InMemoryInventoryStore {
    items: RwLock<HashMap<ItemId, InventoryItem>>,
}

impl InMemoryInventoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> InventoryStoreError {
    InventoryStoreError::Storage("lock poisoned".to_string())
}

impl InventoryStore for InMemoryInventoryStore {
    fn get(&self, item_id: ItemId) -> Result<InventoryItem, InventoryStoreError> {
        let items = self.items.read().map_err(|_| poisoned())?;
        items
            .get(&item_id)
            .cloned()
            .ok_or(InventoryStoreError::NotFound)
    }

    fn insert(&self, item: InventoryItem) -> Result<(), InventoryStoreError> {
        let mut items = self.items.write().map_err(|_| poisoned())?;
        items.insert(item.item_id(), item);
        Ok(())
    }

    fn reserve(&self, item_id: ItemId) -> Result<(), InventoryStoreError> {
        let mut items = self.items.write().map_err(|_| poisoned())?;
        let item = items.get(&item_id).ok_or(InventoryStoreError::NotFound)?;

        // Check-and-decrement under the same write lock: concurrent reserves
        // serialize here, so the last unit is handed out exactly once.
        let reserved = item.reserved().map_err(|e| match e {
            DomainError::OutOfStock(msg) => InventoryStoreError::OutOfStock(msg),
            other => InventoryStoreError::Storage(other.to_string()),
        })?;
        items.insert(item_id, reserved);
        Ok(())
    }

    fn release(&self, item_id: ItemId) -> Result<(), InventoryStoreError> {
        let mut items = self.items.write().map_err(|_| poisoned())?;
        let item = items.get(&item_id).ok_or(InventoryStoreError::NotFound)?;
        let released = item.released();
        items.insert(item_id, released);
        Ok(())
    }
}
