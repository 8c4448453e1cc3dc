use async_trait::async_trait;

use common::{AccountId, Money, OperationId, OrderId, ProductId, ReserveId, UserId};
use domain::{Account, Operation, Order, OrderStatus, Reserve};

use crate::Result;

/// Account persistence.
///
/// All implementations must be thread-safe (Send + Sync). Mutating
/// operations are atomic: a failed call leaves every balance exactly
/// as it was.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Opens an account for a user with a zero balance.
    ///
    /// Fails with `AccountExists` if the user already has one.
    async fn insert_account(&self, user_id: UserId) -> Result<AccountId>;

    /// Fetches an account by its ID.
    async fn account_by_id(&self, id: AccountId) -> Result<Option<Account>>;

    /// Fetches the account owned by a user.
    async fn account_by_user(&self, user_id: UserId) -> Result<Option<Account>>;

    /// Adds funds to an account.
    async fn deposit(&self, id: AccountId, amount: Money) -> Result<()>;

    /// Moves funds between two accounts in one transaction.
    ///
    /// Both accounts must exist and the source balance must cover the
    /// amount, otherwise neither balance changes.
    async fn transfer(&self, source: AccountId, target: AccountId, amount: Money) -> Result<()>;
}

/// Order persistence.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Records a new order in `Accepted` status.
    ///
    /// The amount is fixed here and never recomputed later.
    async fn insert_order(
        &self,
        account_id: AccountId,
        product_ids: Vec<ProductId>,
        amount: Money,
    ) -> Result<OrderId>;

    /// Fetches an order by its ID.
    async fn order_by_id(&self, id: OrderId) -> Result<Option<Order>>;

    /// Fetches all orders placed against an account, oldest first.
    async fn orders_by_account(&self, account_id: AccountId) -> Result<Vec<Order>>;

    /// Moves an order from one status to another.
    ///
    /// The update applies only if the order is currently in `from`;
    /// otherwise the call fails with `StatusConflict`. Two concurrent
    /// callers can never both succeed on the same transition.
    async fn transition_order(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Order>;
}

/// Reservation holds and their settlement.
///
/// The composite operations bundle every effect of a reservation step
/// into one atomic unit, so a crash or a concurrent writer never
/// observes a half-updated ledger.
#[async_trait]
pub trait ReserveStore: Send + Sync {
    /// Places a hold for an `Accepted` order.
    ///
    /// Atomically debits the order's account by the order amount,
    /// moves the order to `Processing` and records the reserve row.
    async fn reserve_funds(&self, order_id: OrderId) -> Result<ReserveId>;

    /// Fetches a reserve by its ID.
    async fn reserve_by_id(&self, id: ReserveId) -> Result<Option<Reserve>>;

    /// Settles a hold as revenue.
    ///
    /// Atomically deletes the reserve, confirms the order and writes a
    /// `Revenue` journal entry. The held funds stay withdrawn.
    async fn settle_revenue(&self, id: ReserveId) -> Result<OperationId>;

    /// Settles a hold as a refund.
    ///
    /// Atomically deletes the reserve, cancels the order, credits the
    /// held funds back and writes a `Refund` journal entry.
    async fn settle_refund(&self, id: ReserveId) -> Result<OperationId>;
}

/// Read access to the settlement journal.
#[async_trait]
pub trait OperationStore: Send + Sync {
    /// Fetches all journal entries for one account, oldest first.
    async fn operations_for_account(&self, account_id: AccountId) -> Result<Vec<Operation>>;

    /// Fetches the full journal, oldest first.
    async fn all_operations(&self) -> Result<Vec<Operation>>;
}

/// Everything the ledger services need from persistence.
pub trait LedgerStore: AccountStore + OrderStore + ReserveStore + OperationStore {}

impl<T> LedgerStore for T where T: AccountStore + OrderStore + ReserveStore + OperationStore {}
