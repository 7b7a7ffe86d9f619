//! `epistock-loans`: the loan lifecycle state machine.
//!
//! A [`loan::Loan`] owns all transition logic (checkout, return, delete) as a
//! pure command/event aggregate; stock side effects are described by the
//! emitted events and executed by the orchestration layer.

pub mod loan;
pub mod validate;

pub use loan::{
    CheckoutItem, Condition, DeleteLoan, Loan, LoanCheckedOut, LoanCommand, LoanDeleted, LoanEvent,
    LoanReturned, LoanStatus, RecordReturn, StockEffect, DEFAULT_LOAN_PERIOD_DAYS,
};
