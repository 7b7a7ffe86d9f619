//! Loan store: the persistence collaborator contract for loan records.
//!
//! Each call is all-or-nothing; `save` carries an optimistic version
//! expectation so concurrent writers against the same loan are detected
//! rather than silently overwritten.

use std::sync::Arc;

use thiserror::Error;

use epistock_core::{ExpectedVersion, LoanId};
use epistock_loans::Loan;

pub mod in_memory;

pub use in_memory::InMemoryLoanStore;

/// Loan store operation error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LoanStoreError {
    #[error("loan not found")]
    NotFound,

    /// Optimistic concurrency failure (stale version).
    #[error("concurrency conflict: {0}")]
    Concurrency(String),

    #[error("storage failure: {0}")]
    Storage(String),
}

/// Storage contract for loan records.
pub trait LoanStore: Send + Sync {
    /// Load one loan. `NotFound` if it does not exist.
    fn load(&self, loan_id: LoanId) -> Result<Loan, LoanStoreError>;

    /// Persist a loan, expecting the stored record to be at `expected`
    /// version (an absent record counts as version 0).
    fn save(&self, loan: &Loan, expected: ExpectedVersion) -> Result<(), LoanStoreError>;

    /// Remove a loan record, expecting it to still be at `expected` version.
    ///
    /// The caller's stock decision was made from a loaded snapshot; the
    /// version check ensures a transition committed in between (e.g. a
    /// return) invalidates that decision instead of being overwritten.
    /// `NotFound` if the record does not exist.
    fn delete(&self, loan_id: LoanId, expected: ExpectedVersion) -> Result<(), LoanStoreError>;
}

/// Shared-backend services delegate through `Arc`.
impl<T: LoanStore + ?Sized> LoanStore for Arc<T> {
    fn load(&self, loan_id: LoanId) -> Result<Loan, LoanStoreError> {
        (**self).load(loan_id)
    }

    fn save(&self, loan: &Loan, expected: ExpectedVersion) -> Result<(), LoanStoreError> {
        (**self).save(loan, expected)
    }

    fn delete(&self, loan_id: LoanId, expected: ExpectedVersion) -> Result<(), LoanStoreError> {
        (**self).delete(loan_id, expected)
    }
}
