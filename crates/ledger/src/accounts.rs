//! Account opening, deposits and transfers.

use common::{AccountId, Money, UserId};
use domain::Account;
use store::AccountStore;

use crate::error::{LedgerError, Result};

/// Service for managing user balance accounts.
///
/// Every user owns at most one account. Amounts entering the ledger
/// through this service must be positive; the stores themselves only
/// enforce that balances never drop below zero.
#[derive(Debug, Clone)]
pub struct AccountLedger<S> {
    store: S,
}

impl<S> AccountLedger<S>
where
    S: AccountStore,
{
    /// Creates a new account service backed by the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Opens an account for a user with a zero balance.
    #[tracing::instrument(skip(self))]
    pub async fn create_account(&self, user_id: UserId) -> Result<AccountId> {
        if self.store.account_by_user(user_id).await?.is_some() {
            return Err(LedgerError::AccountAlreadyExists(user_id));
        }

        let account_id = self.store.insert_account(user_id).await?;

        metrics::counter!("ledger_accounts_created_total").increment(1);
        tracing::info!(%user_id, %account_id, "account opened");

        Ok(account_id)
    }

    /// Adds funds to an account. The amount must be positive.
    #[tracing::instrument(skip(self))]
    pub async fn deposit(&self, account_id: AccountId, amount: Money) -> Result<()> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount(amount));
        }

        self.store.deposit(account_id, amount).await?;

        metrics::counter!("ledger_deposits_total").increment(1);
        tracing::info!(%account_id, %amount, "funds deposited");

        Ok(())
    }

    /// Moves funds from one account to another.
    ///
    /// The amount must be positive and the source balance must cover
    /// it. On failure neither balance changes.
    #[tracing::instrument(skip(self))]
    pub async fn transfer(&self, source: AccountId, target: AccountId, amount: Money) -> Result<()> {
        if !amount.is_positive() {
            return Err(LedgerError::InvalidAmount(amount));
        }

        self.store.transfer(source, target, amount).await?;

        metrics::counter!("ledger_transfers_total").increment(1);
        tracing::info!(%source, %target, %amount, "funds transferred");

        Ok(())
    }

    /// Returns the current balance of an account.
    pub async fn balance(&self, account_id: AccountId) -> Result<Money> {
        let account = self
            .store
            .account_by_id(account_id)
            .await?
            .ok_or(LedgerError::AccountNotFound(account_id))?;

        Ok(account.balance)
    }

    /// Returns the account owned by a user.
    pub async fn account_for_user(&self, user_id: UserId) -> Result<Account> {
        self.store
            .account_by_user(user_id)
            .await?
            .ok_or(LedgerError::NoAccountForUser(user_id))
    }
}
