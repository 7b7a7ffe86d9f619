//! Infrastructure layer: store contracts, in-memory backends, orchestration.
//!
//! The store traits here are the persistence collaborator contract the
//! surrounding application implements against its real database; the
//! in-memory implementations carry the same atomicity guarantees and back the
//! test suite.

pub mod inventory_store;
pub mod loan_service;
pub mod loan_store;

mod integration_tests;

pub use inventory_store::{InMemoryInventoryStore, InventoryStore, InventoryStoreError};
pub use loan_service::{CheckoutRequest, LoanService, ServiceError};
pub use loan_store::{InMemoryLoanStore, LoanStore, LoanStoreError};
