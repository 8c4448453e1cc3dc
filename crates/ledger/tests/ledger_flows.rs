//! Integration tests for the complete ledger flows.

use common::{AccountId, Money, OrderId, ProductId, UserId};
use domain::{OperationKind, OrderStatus};
use ledger::{InMemoryCatalog, Ledger, LedgerError};
use store::InMemoryLedgerStore;

type TestLedger = Ledger<InMemoryLedgerStore, InMemoryCatalog>;

struct TestHarness {
    ledger: TestLedger,
    catalog: InMemoryCatalog,
}

impl TestHarness {
    fn new() -> Self {
        let store = InMemoryLedgerStore::new();
        let catalog = InMemoryCatalog::new();
        catalog.insert(ProductId::new(1), Money::from_cents(3_000));
        catalog.insert(ProductId::new(2), Money::from_cents(2_000));

        Self {
            ledger: Ledger::new(store, catalog.clone()),
            catalog,
        }
    }

    async fn funded_account(&self, user_id: i64, cents: i64) -> AccountId {
        let account_id = self
            .ledger
            .accounts
            .create_account(UserId::new(user_id))
            .await
            .unwrap();
        if cents > 0 {
            self.ledger
                .accounts
                .deposit(account_id, Money::from_cents(cents))
                .await
                .unwrap();
        }
        account_id
    }

    async fn balance(&self, account_id: AccountId) -> Money {
        self.ledger.accounts.balance(account_id).await.unwrap()
    }

    async fn order_status(&self, order_id: OrderId) -> OrderStatus {
        self.ledger.orders.order_by_id(order_id).await.unwrap().status
    }
}

#[tokio::test]
async fn test_happy_path_revenue_cycle() {
    let h = TestHarness::new();
    let account_id = h.funded_account(1, 10_000).await;

    // Place an order priced from the catalog
    let order_id = h
        .ledger
        .orders
        .create_order(account_id, vec![ProductId::new(1), ProductId::new(2)])
        .await
        .unwrap();
    let order = h.ledger.orders.order_by_id(order_id).await.unwrap();
    assert_eq!(order.amount, Money::from_cents(5_000));
    assert_eq!(order.status, OrderStatus::Accepted);

    // Reserve the funds
    let reserve_id = h.ledger.reserves.reserve(order_id).await.unwrap();
    assert_eq!(h.balance(account_id).await, Money::from_cents(5_000));
    assert_eq!(h.order_status(order_id).await, OrderStatus::Processing);

    // Settle as revenue
    h.ledger.reserves.confirm_revenue(reserve_id).await.unwrap();
    assert_eq!(h.balance(account_id).await, Money::from_cents(5_000));
    assert_eq!(h.order_status(order_id).await, OrderStatus::Confirmed);

    // Exactly one Revenue entry lands in the journal
    let report = h.ledger.journal.report_for_account(account_id).await.unwrap();
    assert_eq!(report.len(), 1);
    assert_eq!(report[0].kind, OperationKind::Revenue);
    assert_eq!(report[0].amount, Money::from_cents(5_000));
    assert_eq!(report[0].order_id, order_id);
    assert_eq!(report[0].order_date, order.created_at);
    let expected = format!(
        "withdrawn money for order #{} from account #{} on {}",
        order_id,
        account_id,
        order.created_at.format("%Y-%m-%d")
    );
    assert_eq!(report[0].description.as_deref(), Some(expected.as_str()));
}

#[tokio::test]
async fn test_refund_restores_the_balance() {
    let h = TestHarness::new();
    let account_id = h.funded_account(1, 10_000).await;
    let order_id = h
        .ledger
        .orders
        .create_order(account_id, vec![ProductId::new(1), ProductId::new(2)])
        .await
        .unwrap();
    let reserve_id = h.ledger.reserves.reserve(order_id).await.unwrap();

    h.ledger.reserves.confirm_refund(reserve_id).await.unwrap();

    assert_eq!(h.balance(account_id).await, Money::from_cents(10_000));
    assert_eq!(h.order_status(order_id).await, OrderStatus::Cancelled);

    let report = h.ledger.journal.report_for_account(account_id).await.unwrap();
    assert_eq!(report.len(), 1);
    assert_eq!(report[0].kind, OperationKind::Refund);
    assert!(
        report[0]
            .description
            .as_deref()
            .unwrap()
            .starts_with("credited money for order #")
    );
}

#[tokio::test]
async fn test_transfer_conserves_funds() {
    let h = TestHarness::new();
    let source = h.funded_account(1, 10_000).await;
    let target = h.funded_account(2, 500).await;

    h.ledger
        .accounts
        .transfer(source, target, Money::from_cents(4_000))
        .await
        .unwrap();

    assert_eq!(h.balance(source).await, Money::from_cents(6_000));
    assert_eq!(h.balance(target).await, Money::from_cents(4_500));

    // An overdraft attempt leaves both balances untouched
    let result = h
        .ledger
        .accounts
        .transfer(source, target, Money::from_cents(100_000))
        .await;
    assert!(matches!(result, Err(LedgerError::InsufficientFunds { .. })));
    assert_eq!(h.balance(source).await, Money::from_cents(6_000));
    assert_eq!(h.balance(target).await, Money::from_cents(4_500));
}

#[tokio::test]
async fn test_order_placement_checks_eligibility() {
    let h = TestHarness::new();
    let account_id = h.funded_account(1, 4_000).await;
    h.catalog.insert(ProductId::new(3), Money::from_cents(9_000));

    let result = h
        .ledger
        .orders
        .create_order(account_id, vec![ProductId::new(3)])
        .await;
    assert!(matches!(result, Err(LedgerError::InsufficientFunds { .. })));

    // Nothing was withdrawn and no order was recorded
    assert_eq!(h.balance(account_id).await, Money::from_cents(4_000));
    let orders = h.ledger.orders.orders_for_account(account_id).await.unwrap();
    assert!(orders.is_empty());

    // After another deposit the same order goes through
    h.ledger
        .accounts
        .deposit(account_id, Money::from_cents(5_000))
        .await
        .unwrap();
    h.ledger
        .orders
        .create_order(account_id, vec![ProductId::new(3)])
        .await
        .unwrap();
}

#[tokio::test]
async fn test_cancel_before_reserve() {
    let h = TestHarness::new();
    let account_id = h.funded_account(1, 10_000).await;
    let order_id = h
        .ledger
        .orders
        .create_order(account_id, vec![ProductId::new(1)])
        .await
        .unwrap();

    h.ledger.orders.cancel_order(order_id).await.unwrap();
    assert_eq!(h.order_status(order_id).await, OrderStatus::Cancelled);

    // A cancelled order can no longer be reserved
    let result = h.ledger.reserves.reserve(order_id).await;
    assert!(matches!(
        result,
        Err(LedgerError::InvalidState {
            actual: OrderStatus::Cancelled,
            ..
        })
    ));

    // Cancellation before any hold never touches the journal
    assert_eq!(h.balance(account_id).await, Money::from_cents(10_000));
    let report = h.ledger.journal.report_for_account(account_id).await.unwrap();
    assert!(report.is_empty());
}

#[tokio::test]
async fn test_reserved_order_cancels_through_refund() {
    let h = TestHarness::new();
    let account_id = h.funded_account(1, 10_000).await;
    let order_id = h
        .ledger
        .orders
        .create_order(account_id, vec![ProductId::new(1)])
        .await
        .unwrap();
    let reserve_id = h.ledger.reserves.reserve(order_id).await.unwrap();

    // Direct cancellation is refused while funds are held
    let result = h.ledger.orders.cancel_order(order_id).await;
    assert!(matches!(
        result,
        Err(LedgerError::InvalidState {
            actual: OrderStatus::Processing,
            ..
        })
    ));

    // The refund settlement is the cancellation path
    h.ledger.reserves.confirm_refund(reserve_id).await.unwrap();
    assert_eq!(h.order_status(order_id).await, OrderStatus::Cancelled);
    assert_eq!(h.balance(account_id).await, Money::from_cents(10_000));
}

#[tokio::test]
async fn test_balance_stays_non_negative_under_pressure() {
    let h = TestHarness::new();
    let account_id = h.funded_account(1, 5_000).await;
    let other = h.funded_account(2, 0).await;
    let order_id = h
        .ledger
        .orders
        .create_order(account_id, vec![ProductId::new(1)])
        .await
        .unwrap();

    // Drain the account below the order amount after placement
    h.ledger
        .accounts
        .transfer(account_id, other, Money::from_cents(3_000))
        .await
        .unwrap();

    let result = h.ledger.reserves.reserve(order_id).await;
    assert!(matches!(result, Err(LedgerError::InsufficientFunds { .. })));

    // The failed hold changed nothing
    assert_eq!(h.balance(account_id).await, Money::from_cents(2_000));
    assert_eq!(h.order_status(order_id).await, OrderStatus::Accepted);
}

#[tokio::test]
async fn test_concurrent_reserves_single_winner() {
    let h = TestHarness::new();
    let account_id = h.funded_account(1, 10_000).await;
    let order_id = h
        .ledger
        .orders
        .create_order(account_id, vec![ProductId::new(1)])
        .await
        .unwrap();

    let first = {
        let ledger = h.ledger.clone();
        tokio::spawn(async move { ledger.reserves.reserve(order_id).await })
    };
    let second = {
        let ledger = h.ledger.clone();
        tokio::spawn(async move { ledger.reserves.reserve(order_id).await })
    };
    let results = [first.await.unwrap(), second.await.unwrap()];

    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1);
    for result in &results {
        if let Err(err) = result {
            assert!(matches!(
                err,
                LedgerError::InvalidState { .. } | LedgerError::Conflict
            ));
        }
    }

    // The account was debited exactly once
    assert_eq!(h.balance(account_id).await, Money::from_cents(7_000));
    assert_eq!(h.order_status(order_id).await, OrderStatus::Processing);
}

#[tokio::test]
async fn test_accounting_report_spans_all_accounts() {
    let h = TestHarness::new();
    let first = h.funded_account(1, 10_000).await;
    let second = h.funded_account(2, 10_000).await;

    for account_id in [first, second] {
        let order_id = h
            .ledger
            .orders
            .create_order(account_id, vec![ProductId::new(2)])
            .await
            .unwrap();
        let reserve_id = h.ledger.reserves.reserve(order_id).await.unwrap();
        h.ledger.reserves.confirm_revenue(reserve_id).await.unwrap();
    }

    let full = h.ledger.journal.report_for_accounting().await.unwrap();
    assert_eq!(full.len(), 2);
    assert_eq!(full[0].account_id, first);
    assert_eq!(full[1].account_id, second);
    // The raw export carries no generated descriptions
    assert!(full.iter().all(|op| op.description.is_none()));

    let per_account = h.ledger.journal.report_for_account(first).await.unwrap();
    assert_eq!(per_account.len(), 1);
}

#[tokio::test]
async fn test_report_for_unknown_account() {
    let h = TestHarness::new();
    h.funded_account(1, 1_000).await;

    let result = h.ledger.journal.report_for_account(AccountId::new(42)).await;
    assert!(matches!(result, Err(LedgerError::AccountNotFound(_))));
}
