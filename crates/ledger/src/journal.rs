//! Settlement reports.

use common::AccountId;
use domain::{Operation, OperationKind};
use store::{AccountStore, OperationStore};

use crate::error::{LedgerError, Result};

/// Read-side service over the settlement journal.
///
/// Journal entries are written by settlement alone; this service only
/// reads them back, either per account with generated descriptions or
/// as the raw, unfiltered journal for accounting.
#[derive(Debug, Clone)]
pub struct OperationJournal<S> {
    store: S,
}

impl<S> OperationJournal<S>
where
    S: OperationStore + AccountStore,
{
    /// Creates a new journal service backed by the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns all settlements for one account, oldest first, each
    /// carrying a generated description.
    ///
    /// An unknown account is an error; an account with no settlements
    /// yet gets an empty report.
    #[tracing::instrument(skip(self))]
    pub async fn report_for_account(&self, account_id: AccountId) -> Result<Vec<Operation>> {
        if self.store.account_by_id(account_id).await?.is_none() {
            return Err(LedgerError::AccountNotFound(account_id));
        }

        let mut operations = self.store.operations_for_account(account_id).await?;
        for operation in &mut operations {
            operation.description = Some(describe(operation));
        }

        Ok(operations)
    }

    /// Returns the full journal across all accounts, oldest first,
    /// without descriptions. Meant for reconciliation and accounting
    /// exports.
    #[tracing::instrument(skip(self))]
    pub async fn report_for_accounting(&self) -> Result<Vec<Operation>> {
        Ok(self.store.all_operations().await?)
    }
}

/// Renders the one-line summary shown on per-account reports. The date
/// is the order's placement date, not the settlement time.
fn describe(operation: &Operation) -> String {
    let verb = match operation.kind {
        OperationKind::Revenue => "withdrawn",
        OperationKind::Refund => "credited",
    };
    format!(
        "{} money for order #{} from account #{} on {}",
        verb,
        operation.order_id,
        operation.account_id,
        operation.order_date.format("%Y-%m-%d")
    )
}
