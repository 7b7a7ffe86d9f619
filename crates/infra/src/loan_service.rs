//! Loan operation pipeline (application-level orchestration).
//!
//! `LoanService` composes the pure validator, the loan state machine, and the
//! two stores into the operations the surrounding CRUD layer calls:
//!
//! ```text
//! Request
//!   ↓
//! 1. Load current state (item and/or loan)
//!   ↓
//! 2. Validate + decide (pure: aggregate `handle`, produces events)
//!   ↓
//! 3. Execute stock effect through the atomic store primitive
//!   ↓
//! 4. Persist the loan record
//! ```
//!
//! Every validation failure surfaces before step 3, so no stock or loan state
//! changes on a rejected request. Checkout is the one operation with two
//! effects (reserve + persist); it is made atomic by compensation: when the
//! loan record cannot be persisted after a successful reserve, the
//! reservation is released before the error propagates, so both effects
//! commit or neither does.

use chrono::{NaiveDate, Utc};
use thiserror::Error;

use epistock_core::{Aggregate, AggregateRoot, BorrowerId, DomainError, ExpectedVersion, ItemId, LoanId};
use epistock_inventory::InventoryItem;
use epistock_loans::{
    validate, CheckoutItem, Condition, DeleteLoan, Loan, LoanCommand, RecordReturn, StockEffect,
};

use crate::inventory_store::{InventoryStore, InventoryStoreError};
use crate::loan_store::{LoanStore, LoanStoreError};

/// Error surfaced to callers of the loan service.
///
/// Flattens domain and store failures into the caller-facing taxonomy; every
/// variant identifies which precondition failed.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServiceError {
    #[error("out of stock: {0}")]
    OutOfStock(String),

    #[error("invalid date range: {0}")]
    InvalidDateRange(String),

    #[error("loan already returned")]
    AlreadyReturned,

    #[error("not found")]
    NotFound,

    /// Concurrent writers collided; reload and retry.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("validation failed: {0}")]
    Validation(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

impl From<DomainError> for ServiceError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::OutOfStock(msg) => ServiceError::OutOfStock(msg),
            DomainError::InvalidDateRange(msg) => ServiceError::InvalidDateRange(msg),
            DomainError::AlreadyReturned => ServiceError::AlreadyReturned,
            DomainError::NotFound => ServiceError::NotFound,
            DomainError::Conflict(msg) => ServiceError::Conflict(msg),
            DomainError::Validation(msg) => ServiceError::Validation(msg),
            DomainError::InvalidId(msg) => ServiceError::Validation(msg),
        }
    }
}

impl From<InventoryStoreError> for ServiceError {
    fn from(value: InventoryStoreError) -> Self {
        match value {
            InventoryStoreError::NotFound => ServiceError::NotFound,
            InventoryStoreError::OutOfStock(msg) => ServiceError::OutOfStock(msg),
            InventoryStoreError::Storage(msg) => ServiceError::Storage(msg),
        }
    }
}

impl From<LoanStoreError> for ServiceError {
    fn from(value: LoanStoreError) -> Self {
        match value {
            LoanStoreError::NotFound => ServiceError::NotFound,
            LoanStoreError::Concurrency(msg) => ServiceError::Conflict(msg),
            LoanStoreError::Storage(msg) => ServiceError::Storage(msg),
        }
    }
}

/// A checkout request from the caller (the excluded presentation layer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutRequest {
    pub loan_id: LoanId,
    pub item_id: ItemId,
    pub borrower_id: BorrowerId,
    pub checked_out_on: NaiveDate,
    /// Defaults to checkout date + 7 days when absent.
    pub due_on: Option<NaiveDate>,
    pub condition_out: Condition,
}

/// Orchestrator for loan lifecycle operations.
///
/// Generic over the store implementations so tests run against the in-memory
/// backends and the surrounding application can plug in its database.
#[derive(Debug)]
pub struct LoanService<I, L> {
    inventory: I,
    loans: L,
}

impl<I, L> LoanService<I, L> {
    pub fn new(inventory: I, loans: L) -> Self {
        Self { inventory, loans }
    }

    pub fn into_parts(self) -> (I, L) {
        (self.inventory, self.loans)
    }
}

impl<I, L> LoanService<I, L>
where
    I: InventoryStore,
    L: LoanStore,
{
    /// Register or replace an equipment item (master data passthrough).
    pub fn register_item(&self, item: InventoryItem) -> Result<(), ServiceError> {
        self.inventory.insert(item).map_err(ServiceError::from)
    }

    pub fn get_item(&self, item_id: ItemId) -> Result<InventoryItem, ServiceError> {
        self.inventory.get(item_id).map_err(ServiceError::from)
    }

    pub fn get_loan(&self, loan_id: LoanId) -> Result<Loan, ServiceError> {
        self.loans.load(loan_id).map_err(ServiceError::from)
    }

    /// Check one unit out to a borrower.
    ///
    /// Validation (availability, date order) happens before any mutation. The
    /// advisory availability check rejects early; the true race-free gate is
    /// the store's conditional decrement, which may still fail `OutOfStock`
    /// under contention.
    pub fn create_loan(&self, request: CheckoutRequest) -> Result<Loan, ServiceError> {
        let item = self.inventory.get(request.item_id)?;
        validate::check_availability(&item)?;

        let mut loan = Loan::empty(request.loan_id);
        let events = loan.handle(&LoanCommand::CheckoutItem(CheckoutItem {
            loan_id: request.loan_id,
            item_id: request.item_id,
            borrower_id: request.borrower_id,
            checked_out_on: request.checked_out_on,
            due_on: request.due_on,
            condition_out: request.condition_out,
            occurred_at: Utc::now(),
        }))?;

        // The atomic gate: decrement succeeds only if a unit is still there.
        self.inventory.reserve(request.item_id)?;

        for event in &events {
            loan.apply(event);
        }

        if let Err(err) = self.loans.save(&loan, ExpectedVersion::Exact(0)) {
            // Compensate: the unit was reserved but the loan never existed.
            tracing::warn!(
                loan_id = %request.loan_id,
                item_id = %request.item_id,
                error = %err,
                "rolling back reservation after failed loan persist"
            );
            if let Err(release_err) = self.inventory.release(request.item_id) {
                tracing::error!(
                    item_id = %request.item_id,
                    error = %release_err,
                    "failed to roll back reservation; stock count needs repair"
                );
            }
            return Err(err.into());
        }

        self.trace_events(&events);
        Ok(loan)
    }

    /// Record the return of a checked-out unit.
    ///
    /// Restockable conditions (good/usable) release the unit back to stock; a
    /// damaged unit is withheld. A second return is rejected with
    /// `AlreadyReturned` rather than silently re-processed.
    pub fn record_return(
        &self,
        loan_id: LoanId,
        returned_on: NaiveDate,
        condition_in: Condition,
    ) -> Result<Loan, ServiceError> {
        let mut loan = self.loans.load(loan_id)?;
        let expected = ExpectedVersion::Exact(loan.version());

        let events = loan.handle(&LoanCommand::RecordReturn(RecordReturn {
            loan_id,
            returned_on,
            condition_in,
            occurred_at: Utc::now(),
        }))?;

        for event in &events {
            loan.apply(event);
        }
        self.loans.save(&loan, expected)?;

        self.execute_stock_effects(&events)?;
        self.trace_events(&events);
        Ok(loan)
    }

    /// Remove a loan record.
    ///
    /// Releases the unit back to stock only when the loan was still active; a
    /// returned loan's stock was already settled by the return.
    pub fn delete_loan(&self, loan_id: LoanId) -> Result<(), ServiceError> {
        let loan = self.loans.load(loan_id)?;
        let expected = ExpectedVersion::Exact(loan.version());

        let events = loan.handle(&LoanCommand::DeleteLoan(DeleteLoan {
            loan_id,
            occurred_at: Utc::now(),
        }))?;

        // The restock decision above came from the loaded snapshot; the
        // version expectation rejects the delete if the loan transitioned
        // (e.g. was returned) in between.
        self.loans.delete(loan_id, expected)?;

        self.execute_stock_effects(&events)?;
        self.trace_events(&events);
        Ok(())
    }

    fn execute_stock_effects(&self, events: &[epistock_loans::LoanEvent]) -> Result<(), ServiceError> {
        for event in events {
            match event.stock_effect() {
                StockEffect::Release => self.inventory.release(event.item_id())?,
                StockEffect::Reserve | StockEffect::None => {}
            }
        }
        Ok(())
    }

    fn trace_events(&self, events: &[epistock_loans::LoanEvent]) {
        for event in events {
            tracing::debug!(
                event_type = event.event_type(),
                item_id = %event.item_id(),
                occurred_at = %event.occurred_at(),
                "loan event committed"
            );
        }
    }
}
