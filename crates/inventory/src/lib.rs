//! `epistock-inventory`: equipment records and the stock quantity invariant.

pub mod item;

pub use item::InventoryItem;
