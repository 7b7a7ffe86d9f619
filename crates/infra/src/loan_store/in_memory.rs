use std::collections::HashMap;
use std::sync::RwLock;

use epistock_core::{AggregateRoot, ExpectedVersion, LoanId};
use epistock_loans::Loan;

use super::{LoanStore, LoanStoreError};

/// In-memory loan store with optimistic concurrency.
///
/// Intended for tests/dev. Not optimized for performance.
#[derive(Debug, Default)]
pub struct InMemoryLoanStore {
    loans: RwLock<HashMap<LoanId, Loan>>,
}

impl InMemoryLoanStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned() -> LoanStoreError {
    LoanStoreError::Storage("lock poisoned".to_string())
}

impl LoanStore for InMemoryLoanStore {
    fn load(&self, loan_id: LoanId) -> Result<Loan, LoanStoreError> {
        let loans = self.loans.read().map_err(|_| poisoned())?;
        loans.get(&loan_id).cloned().ok_or(LoanStoreError::NotFound)
    }

    fn save(&self, loan: &Loan, expected: ExpectedVersion) -> Result<(), LoanStoreError> {
        let mut loans = self.loans.write().map_err(|_| poisoned())?;
        let current = loans
            .get(&loan.id_typed())
            .map(|stored| stored.version())
            .unwrap_or(0);

        if !expected.matches(current) {
            return Err(LoanStoreError::Concurrency(format!(
                "expected {expected:?}, found {current}"
            )));
        }

        loans.insert(loan.id_typed(), loan.clone());
        Ok(())
    }

    fn delete(&self, loan_id: LoanId, expected: ExpectedVersion) -> Result<(), LoanStoreError> {
        let mut loans = self.loans.write().map_err(|_| poisoned())?;
        let current = loans
            .get(&loan_id)
            .map(|stored| stored.version())
            .ok_or(LoanStoreError::NotFound)?;

        if !expected.matches(current) {
            return Err(LoanStoreError::Concurrency(format!(
                "expected {expected:?}, found {current}"
            )));
        }

        loans.remove(&loan_id);
        Ok(())
    }
}
