//! Order placement and cancellation.

use common::{AccountId, Money, OrderId, ProductId};
use domain::{Order, OrderStatus};
use store::{AccountStore, OrderStore};

use crate::catalog::Catalog;
use crate::error::{LedgerError, Result};

/// Service for placing and cancelling purchase orders.
///
/// An order's amount is the sum of its product prices as the catalog
/// quotes them at placement time. Each occurrence of a product counts,
/// so an order naming the same product twice is charged twice for it.
#[derive(Debug, Clone)]
pub struct OrderWorkflow<S, C> {
    store: S,
    catalog: C,
}

impl<S, C> OrderWorkflow<S, C>
where
    S: OrderStore + AccountStore,
    C: Catalog,
{
    /// Creates a new order service backed by the given store and catalog.
    pub fn new(store: S, catalog: C) -> Self {
        Self { store, catalog }
    }

    /// Places an order against an account.
    ///
    /// The order is priced from the catalog and recorded in `Accepted`
    /// status. Placement requires the account balance to cover the
    /// priced amount, but nothing is withdrawn until the order is
    /// reserved.
    #[tracing::instrument(skip(self))]
    pub async fn create_order(
        &self,
        account_id: AccountId,
        product_ids: Vec<ProductId>,
    ) -> Result<OrderId> {
        let account = self
            .store
            .account_by_id(account_id)
            .await?
            .ok_or(LedgerError::AccountNotFound(account_id))?;

        if product_ids.is_empty() {
            return Err(LedgerError::EmptyOrder);
        }

        let mut amount = Money::zero();
        for product_id in &product_ids {
            let price = self
                .catalog
                .price_of(*product_id)
                .await?
                .ok_or(LedgerError::ProductNotFound(*product_id))?;
            amount += price;
        }

        if account.balance < amount {
            return Err(LedgerError::InsufficientFunds {
                account_id,
                required: amount,
                available: account.balance,
            });
        }

        let order_id = self
            .store
            .insert_order(account_id, product_ids, amount)
            .await?;

        metrics::counter!("ledger_orders_created_total").increment(1);
        tracing::info!(%account_id, %order_id, %amount, "order placed");

        Ok(order_id)
    }

    /// Cancels an order that has not been reserved yet.
    ///
    /// Only `Accepted` orders can be cancelled here. Once funds are
    /// held the order leaves processing through a refund settlement
    /// instead.
    #[tracing::instrument(skip(self))]
    pub async fn cancel_order(&self, order_id: OrderId) -> Result<Order> {
        let order = self
            .store
            .order_by_id(order_id)
            .await?
            .ok_or(LedgerError::OrderNotFound(order_id))?;

        if !order.status.can_cancel() {
            return Err(LedgerError::InvalidState {
                order_id,
                required: OrderStatus::Accepted,
                actual: order.status,
            });
        }

        let order = self
            .store
            .transition_order(order_id, OrderStatus::Accepted, OrderStatus::Cancelled)
            .await?;

        tracing::info!(%order_id, "order cancelled");

        Ok(order)
    }

    /// Returns an order by its ID.
    pub async fn order_by_id(&self, order_id: OrderId) -> Result<Order> {
        self.store
            .order_by_id(order_id)
            .await?
            .ok_or(LedgerError::OrderNotFound(order_id))
    }

    /// Returns all orders placed against an account, oldest first.
    pub async fn orders_for_account(&self, account_id: AccountId) -> Result<Vec<Order>> {
        if self.store.account_by_id(account_id).await?.is_none() {
            return Err(LedgerError::AccountNotFound(account_id));
        }

        Ok(self.store.orders_by_account(account_id).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalog;
    use common::UserId;
    use store::InMemoryLedgerStore;

    async fn setup() -> (OrderWorkflow<InMemoryLedgerStore, InMemoryCatalog>, AccountId) {
        let store = InMemoryLedgerStore::new();
        let catalog = InMemoryCatalog::new();
        catalog.insert(ProductId::new(1), Money::from_cents(3_000));
        catalog.insert(ProductId::new(2), Money::from_cents(2_000));

        let account_id = store.insert_account(UserId::new(1)).await.unwrap();
        store
            .deposit(account_id, Money::from_cents(10_000))
            .await
            .unwrap();

        (OrderWorkflow::new(store, catalog), account_id)
    }

    #[tokio::test]
    async fn test_order_priced_from_catalog() {
        let (workflow, account_id) = setup().await;

        let order_id = workflow
            .create_order(account_id, vec![ProductId::new(1), ProductId::new(2)])
            .await
            .unwrap();

        let order = workflow.order_by_id(order_id).await.unwrap();
        assert_eq!(order.amount, Money::from_cents(5_000));
        assert_eq!(order.status, OrderStatus::Accepted);
        assert_eq!(order.product_ids, vec![ProductId::new(1), ProductId::new(2)]);
    }

    #[tokio::test]
    async fn test_duplicate_product_charged_per_occurrence() {
        let (workflow, account_id) = setup().await;

        let order_id = workflow
            .create_order(account_id, vec![ProductId::new(2), ProductId::new(2)])
            .await
            .unwrap();

        let order = workflow.order_by_id(order_id).await.unwrap();
        assert_eq!(order.amount, Money::from_cents(4_000));
    }

    #[tokio::test]
    async fn test_empty_order_rejected() {
        let (workflow, account_id) = setup().await;

        let result = workflow.create_order(account_id, vec![]).await;
        assert!(matches!(result, Err(LedgerError::EmptyOrder)));
    }

    #[tokio::test]
    async fn test_unknown_product_rejected() {
        let (workflow, account_id) = setup().await;

        let result = workflow
            .create_order(account_id, vec![ProductId::new(1), ProductId::new(99)])
            .await;
        assert!(matches!(
            result,
            Err(LedgerError::ProductNotFound(id)) if id == ProductId::new(99)
        ));

        let orders = workflow.orders_for_account(account_id).await.unwrap();
        assert!(orders.is_empty());
    }

    #[tokio::test]
    async fn test_order_beyond_balance_rejected() {
        let (workflow, account_id) = setup().await;

        let products = vec![ProductId::new(1); 4];
        let result = workflow.create_order(account_id, products).await;
        assert!(matches!(
            result,
            Err(LedgerError::InsufficientFunds {
                required,
                available,
                ..
            }) if required == Money::from_cents(12_000) && available == Money::from_cents(10_000)
        ));
    }

    #[tokio::test]
    async fn test_order_for_missing_account() {
        let (workflow, _) = setup().await;

        let result = workflow
            .create_order(AccountId::new(42), vec![ProductId::new(1)])
            .await;
        assert!(matches!(result, Err(LedgerError::AccountNotFound(_))));
    }

    #[tokio::test]
    async fn test_catalog_failure_surfaces() {
        let store = InMemoryLedgerStore::new();
        let catalog = InMemoryCatalog::new();
        catalog.insert(ProductId::new(1), Money::from_cents(3_000));
        let account_id = store.insert_account(UserId::new(1)).await.unwrap();
        store
            .deposit(account_id, Money::from_cents(10_000))
            .await
            .unwrap();
        catalog.set_fail_on_lookup(true);

        let workflow = OrderWorkflow::new(store, catalog);
        let result = workflow.create_order(account_id, vec![ProductId::new(1)]).await;
        assert!(matches!(result, Err(LedgerError::Catalog(_))));
    }

    #[tokio::test]
    async fn test_cancel_accepted_order() {
        let (workflow, account_id) = setup().await;
        let order_id = workflow
            .create_order(account_id, vec![ProductId::new(1)])
            .await
            .unwrap();

        let order = workflow.cancel_order(order_id).await.unwrap();
        assert_eq!(order.status, OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_cancel_is_not_repeatable() {
        let (workflow, account_id) = setup().await;
        let order_id = workflow
            .create_order(account_id, vec![ProductId::new(1)])
            .await
            .unwrap();
        workflow.cancel_order(order_id).await.unwrap();

        let result = workflow.cancel_order(order_id).await;
        assert!(matches!(
            result,
            Err(LedgerError::InvalidState {
                actual: OrderStatus::Cancelled,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_orders_listed_oldest_first() {
        let (workflow, account_id) = setup().await;
        let first = workflow
            .create_order(account_id, vec![ProductId::new(1)])
            .await
            .unwrap();
        let second = workflow
            .create_order(account_id, vec![ProductId::new(2)])
            .await
            .unwrap();

        let orders = workflow.orders_for_account(account_id).await.unwrap();
        assert_eq!(orders.len(), 2);
        assert_eq!(orders[0].id, first);
        assert_eq!(orders[1].id, second);
    }

    #[tokio::test]
    async fn test_orders_for_missing_account() {
        let (workflow, _) = setup().await;

        let result = workflow.orders_for_account(AccountId::new(42)).await;
        assert!(matches!(result, Err(LedgerError::AccountNotFound(_))));
    }
}
