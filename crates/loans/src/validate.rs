//! Pure validation gates, invoked before any store mutation.
//!
//! `check_availability` is advisory: the race-free guarantee comes from the
//! inventory store's atomic conditional decrement, not from this read. The
//! date checks are authoritative: any failure aborts the whole operation
//! before anything is written.

use chrono::NaiveDate;

use epistock_core::{DomainError, DomainResult};
use epistock_inventory::InventoryItem;

/// Checkout requires at least one available unit.
pub fn check_availability(item: &InventoryItem) -> DomainResult<()> {
    if item.is_available() {
        Ok(())
    } else {
        Err(DomainError::out_of_stock(format!(
            "'{}' is unavailable (quantity: {})",
            item.name(),
            item.quantity()
        )))
    }
}

/// The due date must come strictly after the checkout date.
pub fn check_date_order(checked_out_on: NaiveDate, due_on: NaiveDate) -> DomainResult<()> {
    if due_on > checked_out_on {
        Ok(())
    } else {
        Err(DomainError::invalid_date_range(format!(
            "due date {due_on} must come after the checkout date {checked_out_on}"
        )))
    }
}

/// The return date, when recorded, must come strictly after the checkout date.
pub fn check_return_order(checked_out_on: NaiveDate, returned_on: NaiveDate) -> DomainResult<()> {
    if returned_on > checked_out_on {
        Ok(())
    } else {
        Err(DomainError::invalid_date_range(format!(
            "return date {returned_on} must come after the checkout date {checked_out_on}"
        )))
    }
}
