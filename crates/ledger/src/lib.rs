//! Business services of the balance ledger.
//!
//! This crate ties the persistence layer to the ledger's rules:
//! 1. Accounts hold user balances and accept deposits and transfers.
//! 2. Orders are priced from a product catalog and placed against an
//!    account.
//! 3. Reserving an order withdraws its amount and holds it until the
//!    order settles as revenue or refund.
//! 4. Every settlement appends one entry to the operations journal.
//!
//! Any error taxonomy failure is a recoverable, typed outcome. Callers
//! are expected to retry operations whose error reports
//! [`LedgerError::is_retryable`].

pub mod accounts;
pub mod catalog;
pub mod error;
pub mod journal;
pub mod orders;
pub mod reserves;

use store::LedgerStore;

pub use accounts::AccountLedger;
pub use catalog::{Catalog, InMemoryCatalog};
pub use error::LedgerError;
pub use journal::OperationJournal;
pub use orders::OrderWorkflow;
pub use reserves::ReservationCoordinator;

/// All ledger services wired over one shared store and catalog.
#[derive(Debug, Clone)]
pub struct Ledger<S, C> {
    /// Account opening, deposits and transfers.
    pub accounts: AccountLedger<S>,
    /// Order placement and cancellation.
    pub orders: OrderWorkflow<S, C>,
    /// Fund holds and their settlement.
    pub reserves: ReservationCoordinator<S>,
    /// Settlement reports.
    pub journal: OperationJournal<S>,
}

impl<S, C> Ledger<S, C>
where
    S: LedgerStore + Clone,
    C: Catalog,
{
    /// Wires every service over clones of the same store.
    pub fn new(store: S, catalog: C) -> Self {
        Self {
            accounts: AccountLedger::new(store.clone()),
            orders: OrderWorkflow::new(store.clone(), catalog),
            reserves: ReservationCoordinator::new(store.clone()),
            journal: OperationJournal::new(store),
        }
    }
}
