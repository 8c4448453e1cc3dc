use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;

use common::{AccountId, Money, OperationId, OrderId, ProductId, ReserveId, UserId};
use domain::{Account, Operation, OperationKind, Order, OrderStatus, Reserve};

use crate::{
    Result, StoreError,
    store::{AccountStore, OperationStore, OrderStore, ReserveStore},
};

/// Mutable state behind the in-memory store's lock.
#[derive(Debug, Default)]
struct LedgerState {
    accounts: BTreeMap<AccountId, Account>,
    orders: BTreeMap<OrderId, Order>,
    reserves: BTreeMap<ReserveId, Reserve>,
    operations: Vec<Operation>,
    last_id: i64,
}

impl LedgerState {
    fn next_id(&mut self) -> i64 {
        self.last_id += 1;
        self.last_id
    }

    fn account_for_user(&self, user_id: UserId) -> Option<&Account> {
        self.accounts.values().find(|a| a.user_id == user_id)
    }
}

/// In-memory ledger store implementation for testing.
///
/// This implementation keeps all records behind one lock and provides
/// the same interface as the PostgreSQL implementation. Every mutating
/// call validates first and writes only after all checks pass, so a
/// failed call leaves no partial effects, matching the transactional
/// backend.
#[derive(Clone, Default)]
pub struct InMemoryLedgerStore {
    state: Arc<RwLock<LedgerState>>,
}

impl InMemoryLedgerStore {
    /// Creates a new empty in-memory ledger store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of journal entries recorded.
    pub async fn operation_count(&self) -> usize {
        self.state.read().await.operations.len()
    }

    /// Clears all records.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        *state = LedgerState::default();
    }

    async fn settle(&self, id: ReserveId, kind: OperationKind) -> Result<OperationId> {
        let to_status = match kind {
            OperationKind::Revenue => OrderStatus::Confirmed,
            OperationKind::Refund => OrderStatus::Cancelled,
        };

        let mut state = self.state.write().await;

        let (order_id, amount) = {
            let reserve = state
                .reserves
                .get(&id)
                .ok_or(StoreError::ReserveNotFound(id))?;
            (reserve.order_id, reserve.amount)
        };
        let (account_id, status, order_date) = {
            let order = state
                .orders
                .get(&order_id)
                .ok_or(StoreError::OrderNotFound(order_id))?;
            (order.account_id, order.status, order.created_at)
        };
        if status != OrderStatus::Processing {
            return Err(StoreError::StatusConflict {
                order_id,
                required: OrderStatus::Processing,
                actual: status,
            });
        }
        if !state.accounts.contains_key(&account_id) {
            return Err(StoreError::AccountNotFound(account_id));
        }

        // All checks passed; every write below happens under the same lock.
        state.reserves.remove(&id);
        if let Some(order) = state.orders.get_mut(&order_id) {
            order.status = to_status;
        }
        if kind == OperationKind::Refund
            && let Some(account) = state.accounts.get_mut(&account_id)
        {
            account.balance += amount;
        }

        let operation_id = OperationId::new(state.next_id());
        state.operations.push(Operation {
            id: operation_id,
            account_id,
            order_id,
            amount,
            kind,
            order_date,
            created_at: Utc::now(),
            description: None,
        });
        Ok(operation_id)
    }
}

#[async_trait]
impl AccountStore for InMemoryLedgerStore {
    async fn insert_account(&self, user_id: UserId) -> Result<AccountId> {
        let mut state = self.state.write().await;

        if state.account_for_user(user_id).is_some() {
            return Err(StoreError::AccountExists(user_id));
        }

        let id = AccountId::new(state.next_id());
        state.accounts.insert(
            id,
            Account {
                id,
                user_id,
                balance: Money::zero(),
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn account_by_id(&self, id: AccountId) -> Result<Option<Account>> {
        Ok(self.state.read().await.accounts.get(&id).cloned())
    }

    async fn account_by_user(&self, user_id: UserId) -> Result<Option<Account>> {
        Ok(self.state.read().await.account_for_user(user_id).cloned())
    }

    async fn deposit(&self, id: AccountId, amount: Money) -> Result<()> {
        let mut state = self.state.write().await;
        let account = state
            .accounts
            .get_mut(&id)
            .ok_or(StoreError::AccountNotFound(id))?;
        account.balance += amount;
        Ok(())
    }

    async fn transfer(&self, source: AccountId, target: AccountId, amount: Money) -> Result<()> {
        let mut state = self.state.write().await;

        let available = state
            .accounts
            .get(&source)
            .ok_or(StoreError::AccountNotFound(source))?
            .balance;
        if !state.accounts.contains_key(&target) {
            return Err(StoreError::AccountNotFound(target));
        }
        if available < amount {
            return Err(StoreError::InsufficientFunds {
                account_id: source,
                required: amount,
                available,
            });
        }

        if let Some(account) = state.accounts.get_mut(&source) {
            account.balance -= amount;
        }
        if let Some(account) = state.accounts.get_mut(&target) {
            account.balance += amount;
        }
        Ok(())
    }
}

#[async_trait]
impl OrderStore for InMemoryLedgerStore {
    async fn insert_order(
        &self,
        account_id: AccountId,
        product_ids: Vec<ProductId>,
        amount: Money,
    ) -> Result<OrderId> {
        let mut state = self.state.write().await;

        if !state.accounts.contains_key(&account_id) {
            return Err(StoreError::AccountNotFound(account_id));
        }

        let id = OrderId::new(state.next_id());
        state.orders.insert(
            id,
            Order {
                id,
                account_id,
                product_ids,
                amount,
                status: OrderStatus::Accepted,
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn order_by_id(&self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.state.read().await.orders.get(&id).cloned())
    }

    async fn orders_by_account(&self, account_id: AccountId) -> Result<Vec<Order>> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .values()
            .filter(|o| o.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn transition_order(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Order> {
        let mut state = self.state.write().await;
        let order = state
            .orders
            .get_mut(&id)
            .ok_or(StoreError::OrderNotFound(id))?;

        if order.status != from {
            return Err(StoreError::StatusConflict {
                order_id: id,
                required: from,
                actual: order.status,
            });
        }

        order.status = to;
        Ok(order.clone())
    }
}

#[async_trait]
impl ReserveStore for InMemoryLedgerStore {
    async fn reserve_funds(&self, order_id: OrderId) -> Result<ReserveId> {
        let mut state = self.state.write().await;

        let (account_id, amount, status) = {
            let order = state
                .orders
                .get(&order_id)
                .ok_or(StoreError::OrderNotFound(order_id))?;
            (order.account_id, order.amount, order.status)
        };
        if status != OrderStatus::Accepted {
            return Err(StoreError::StatusConflict {
                order_id,
                required: OrderStatus::Accepted,
                actual: status,
            });
        }

        let available = state
            .accounts
            .get(&account_id)
            .ok_or(StoreError::AccountNotFound(account_id))?
            .balance;
        if available < amount {
            return Err(StoreError::InsufficientFunds {
                account_id,
                required: amount,
                available,
            });
        }

        // All checks passed; every write below happens under the same lock.
        if let Some(account) = state.accounts.get_mut(&account_id) {
            account.balance -= amount;
        }
        if let Some(order) = state.orders.get_mut(&order_id) {
            order.status = OrderStatus::Processing;
        }

        let id = ReserveId::new(state.next_id());
        state.reserves.insert(
            id,
            Reserve {
                id,
                order_id,
                amount,
                created_at: Utc::now(),
            },
        );
        Ok(id)
    }

    async fn reserve_by_id(&self, id: ReserveId) -> Result<Option<Reserve>> {
        Ok(self.state.read().await.reserves.get(&id).cloned())
    }

    async fn settle_revenue(&self, id: ReserveId) -> Result<OperationId> {
        self.settle(id, OperationKind::Revenue).await
    }

    async fn settle_refund(&self, id: ReserveId) -> Result<OperationId> {
        self.settle(id, OperationKind::Refund).await
    }
}

#[async_trait]
impl OperationStore for InMemoryLedgerStore {
    async fn operations_for_account(&self, account_id: AccountId) -> Result<Vec<Operation>> {
        let state = self.state.read().await;
        Ok(state
            .operations
            .iter()
            .filter(|op| op.account_id == account_id)
            .cloned()
            .collect())
    }

    async fn all_operations(&self) -> Result<Vec<Operation>> {
        Ok(self.state.read().await.operations.clone())
    }
}
