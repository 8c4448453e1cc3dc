use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Row, Transaction, postgres::PgRow};

use common::{AccountId, Money, OperationId, OrderId, ProductId, ReserveId, UserId};
use domain::{Account, Operation, OperationKind, Order, OrderStatus, Reserve};

use crate::{
    Result, StoreError,
    store::{AccountStore, OperationStore, OrderStore, ReserveStore},
};

/// PostgreSQL-backed ledger store implementation.
///
/// Every multi-row mutation runs inside one transaction at the
/// `SERIALIZABLE` isolation level. Conflicting concurrent writers are
/// aborted by PostgreSQL and surface as [`StoreError::Serialization`];
/// a committed transaction always reflects every effect or none.
#[derive(Clone)]
pub struct PostgresLedgerStore {
    pool: PgPool,
}

impl PostgresLedgerStore {
    /// Creates a new PostgreSQL ledger store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> std::result::Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("../../migrations").run(&self.pool).await
    }

    async fn begin_serializable(&self) -> Result<Transaction<'static, Postgres>> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("SET TRANSACTION ISOLATION LEVEL SERIALIZABLE")
            .execute(&mut *tx)
            .await?;
        Ok(tx)
    }

    /// Shared body of the two settlement paths. Deletes the reserve,
    /// finishes the order and journals the result; a refund also
    /// credits the held amount back.
    async fn settle(&self, id: ReserveId, kind: OperationKind) -> Result<OperationId> {
        let to_status = match kind {
            OperationKind::Revenue => OrderStatus::Confirmed,
            OperationKind::Refund => OrderStatus::Cancelled,
        };

        let mut tx = self.begin_serializable().await?;

        let row = sqlx::query("DELETE FROM reserves WHERE id = $1 RETURNING order_id, amount_cents")
            .bind(id.as_i64())
            .fetch_optional(&mut *tx)
            .await?;

        let row = row.ok_or(StoreError::ReserveNotFound(id))?;
        let order_id = OrderId::new(row.try_get("order_id")?);
        let amount = Money::from_cents(row.try_get("amount_cents")?);

        let order_row = sqlx::query(
            r#"
            UPDATE orders SET status = $1
            WHERE id = $2 AND status = $3
            RETURNING account_id, created_at
            "#,
        )
        .bind(to_status.as_str())
        .bind(order_id.as_i64())
        .bind(OrderStatus::Processing.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(order_row) = order_row else {
            return Err(status_conflict(&mut tx, order_id, OrderStatus::Processing).await);
        };
        let account_id = AccountId::new(order_row.try_get("account_id")?);
        let order_date: DateTime<Utc> = order_row.try_get("created_at")?;

        if kind == OperationKind::Refund {
            credit(&mut tx, account_id, amount).await?;
        }

        let op_row = sqlx::query(
            r#"
            INSERT INTO operations (account_id, order_id, amount_cents, kind, order_date)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(account_id.as_i64())
        .bind(order_id.as_i64())
        .bind(amount.cents())
        .bind(kind.as_str())
        .bind(order_date)
        .fetch_one(&mut *tx)
        .await?;
        let operation_id = OperationId::new(op_row.try_get("id")?);

        tx.commit().await?;
        Ok(operation_id)
    }

    fn row_to_account(row: PgRow) -> Result<Account> {
        Ok(Account {
            id: AccountId::new(row.try_get("id")?),
            user_id: UserId::new(row.try_get("user_id")?),
            balance: Money::from_cents(row.try_get("balance_cents")?),
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_order(row: PgRow) -> Result<Order> {
        let status_text: String = row.try_get("status")?;
        let status = OrderStatus::parse(&status_text).ok_or_else(|| StoreError::Decode {
            column: "orders.status",
            value: status_text,
        })?;

        let product_ids: Vec<i64> = row.try_get("product_ids")?;

        Ok(Order {
            id: OrderId::new(row.try_get("id")?),
            account_id: AccountId::new(row.try_get("account_id")?),
            product_ids: product_ids.into_iter().map(ProductId::new).collect(),
            amount: Money::from_cents(row.try_get("amount_cents")?),
            status,
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_reserve(row: PgRow) -> Result<Reserve> {
        Ok(Reserve {
            id: ReserveId::new(row.try_get("id")?),
            order_id: OrderId::new(row.try_get("order_id")?),
            amount: Money::from_cents(row.try_get("amount_cents")?),
            created_at: row.try_get("created_at")?,
        })
    }

    fn row_to_operation(row: PgRow) -> Result<Operation> {
        let kind_text: String = row.try_get("kind")?;
        let kind = OperationKind::parse(&kind_text).ok_or_else(|| StoreError::Decode {
            column: "operations.kind",
            value: kind_text,
        })?;

        Ok(Operation {
            id: OperationId::new(row.try_get("id")?),
            account_id: AccountId::new(row.try_get("account_id")?),
            order_id: OrderId::new(row.try_get("order_id")?),
            amount: Money::from_cents(row.try_get("amount_cents")?),
            kind,
            order_date: row.try_get("order_date")?,
            created_at: row.try_get("created_at")?,
            description: None,
        })
    }
}

/// Reads an account balance inside the transaction.
///
/// Fails with `AccountNotFound` if the row is absent.
async fn balance_of(tx: &mut Transaction<'static, Postgres>, id: AccountId) -> Result<Money> {
    let row = sqlx::query("SELECT balance_cents FROM accounts WHERE id = $1")
        .bind(id.as_i64())
        .fetch_optional(&mut **tx)
        .await?;

    let row = row.ok_or(StoreError::AccountNotFound(id))?;
    Ok(Money::from_cents(row.try_get("balance_cents")?))
}

/// Subtracts from an account balance. Callers check the balance
/// beforehand in the same transaction; the schema CHECK constraint
/// backstops them.
async fn debit(tx: &mut Transaction<'static, Postgres>, id: AccountId, amount: Money) -> Result<()> {
    let result = sqlx::query("UPDATE accounts SET balance_cents = balance_cents - $1 WHERE id = $2")
        .bind(amount.cents())
        .bind(id.as_i64())
        .execute(&mut **tx)
        .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::AccountNotFound(id));
    }
    Ok(())
}

/// Adds to an account balance.
async fn credit(tx: &mut Transaction<'static, Postgres>, id: AccountId, amount: Money) -> Result<()> {
    let result = sqlx::query("UPDATE accounts SET balance_cents = balance_cents + $1 WHERE id = $2")
        .bind(amount.cents())
        .bind(id.as_i64())
        .execute(&mut **tx)
        .await?;

    if result.rows_affected() == 0 {
        return Err(StoreError::AccountNotFound(id));
    }
    Ok(())
}

/// Builds the error for a failed conditional status update by looking
/// at what the order actually is.
async fn status_conflict(
    tx: &mut Transaction<'static, Postgres>,
    order_id: OrderId,
    required: OrderStatus,
) -> StoreError {
    let row = sqlx::query("SELECT status FROM orders WHERE id = $1")
        .bind(order_id.as_i64())
        .fetch_optional(&mut **tx)
        .await;

    match row {
        Ok(Some(row)) => match row.try_get::<String, _>("status") {
            Ok(text) => match OrderStatus::parse(&text) {
                Some(actual) => StoreError::StatusConflict {
                    order_id,
                    required,
                    actual,
                },
                None => StoreError::Decode {
                    column: "orders.status",
                    value: text,
                },
            },
            Err(err) => err.into(),
        },
        Ok(None) => StoreError::OrderNotFound(order_id),
        Err(err) => err.into(),
    }
}

#[async_trait]
impl AccountStore for PostgresLedgerStore {
    async fn insert_account(&self, user_id: UserId) -> Result<AccountId> {
        let row = sqlx::query("INSERT INTO accounts (user_id) VALUES ($1) RETURNING id")
            .bind(user_id.as_i64())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                // Unique violation on user_id means the user already has an account
                if let sqlx::Error::Database(ref db_err) = e
                    && db_err.constraint() == Some("accounts_user_id_key")
                {
                    return StoreError::AccountExists(user_id);
                }
                StoreError::from(e)
            })?;

        Ok(AccountId::new(row.try_get("id")?))
    }

    async fn account_by_id(&self, id: AccountId) -> Result<Option<Account>> {
        let row =
            sqlx::query("SELECT id, user_id, balance_cents, created_at FROM accounts WHERE id = $1")
                .bind(id.as_i64())
                .fetch_optional(&self.pool)
                .await?;

        row.map(Self::row_to_account).transpose()
    }

    async fn account_by_user(&self, user_id: UserId) -> Result<Option<Account>> {
        let row = sqlx::query(
            "SELECT id, user_id, balance_cents, created_at FROM accounts WHERE user_id = $1",
        )
        .bind(user_id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_account).transpose()
    }

    async fn deposit(&self, id: AccountId, amount: Money) -> Result<()> {
        let result =
            sqlx::query("UPDATE accounts SET balance_cents = balance_cents + $1 WHERE id = $2")
                .bind(amount.cents())
                .bind(id.as_i64())
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::AccountNotFound(id));
        }
        Ok(())
    }

    async fn transfer(&self, source: AccountId, target: AccountId, amount: Money) -> Result<()> {
        let mut tx = self.begin_serializable().await?;

        let available = balance_of(&mut tx, source).await?;
        balance_of(&mut tx, target).await?;

        if available < amount {
            return Err(StoreError::InsufficientFunds {
                account_id: source,
                required: amount,
                available,
            });
        }

        debit(&mut tx, source, amount).await?;
        credit(&mut tx, target, amount).await?;

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl OrderStore for PostgresLedgerStore {
    async fn insert_order(
        &self,
        account_id: AccountId,
        product_ids: Vec<ProductId>,
        amount: Money,
    ) -> Result<OrderId> {
        let ids: Vec<i64> = product_ids.iter().map(|p| p.as_i64()).collect();

        let row = sqlx::query(
            r#"
            INSERT INTO orders (account_id, product_ids, amount_cents, status)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(account_id.as_i64())
        .bind(&ids)
        .bind(amount.cents())
        .bind(OrderStatus::Accepted.as_str())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(ref db_err) = e
                && db_err.constraint() == Some("orders_account_id_fkey")
            {
                return StoreError::AccountNotFound(account_id);
            }
            StoreError::from(e)
        })?;

        Ok(OrderId::new(row.try_get("id")?))
    }

    async fn order_by_id(&self, id: OrderId) -> Result<Option<Order>> {
        let row = sqlx::query(
            r#"
            SELECT id, account_id, product_ids, amount_cents, status, created_at
            FROM orders
            WHERE id = $1
            "#,
        )
        .bind(id.as_i64())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_order).transpose()
    }

    async fn orders_by_account(&self, account_id: AccountId) -> Result<Vec<Order>> {
        let rows = sqlx::query(
            r#"
            SELECT id, account_id, product_ids, amount_cents, status, created_at
            FROM orders
            WHERE account_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(account_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_order).collect()
    }

    async fn transition_order(
        &self,
        id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
    ) -> Result<Order> {
        let mut tx = self.begin_serializable().await?;

        let row = sqlx::query(
            r#"
            UPDATE orders SET status = $1
            WHERE id = $2 AND status = $3
            RETURNING id, account_id, product_ids, amount_cents, status, created_at
            "#,
        )
        .bind(to.as_str())
        .bind(id.as_i64())
        .bind(from.as_str())
        .fetch_optional(&mut *tx)
        .await?;

        let Some(row) = row else {
            return Err(status_conflict(&mut tx, id, from).await);
        };

        let order = Self::row_to_order(row)?;
        tx.commit().await?;
        Ok(order)
    }
}

#[async_trait]
impl ReserveStore for PostgresLedgerStore {
    async fn reserve_funds(&self, order_id: OrderId) -> Result<ReserveId> {
        let mut tx = self.begin_serializable().await?;

        let row = sqlx::query("SELECT account_id, amount_cents FROM orders WHERE id = $1")
            .bind(order_id.as_i64())
            .fetch_optional(&mut *tx)
            .await?;

        let row = row.ok_or(StoreError::OrderNotFound(order_id))?;
        let account_id = AccountId::new(row.try_get("account_id")?);
        let amount = Money::from_cents(row.try_get("amount_cents")?);

        // The conditional update is the gate: of two racing callers,
        // at most one finds the order still accepted.
        let updated = sqlx::query("UPDATE orders SET status = $1 WHERE id = $2 AND status = $3")
            .bind(OrderStatus::Processing.as_str())
            .bind(order_id.as_i64())
            .bind(OrderStatus::Accepted.as_str())
            .execute(&mut *tx)
            .await?;

        if updated.rows_affected() == 0 {
            return Err(status_conflict(&mut tx, order_id, OrderStatus::Accepted).await);
        }

        let available = balance_of(&mut tx, account_id).await?;
        if available < amount {
            return Err(StoreError::InsufficientFunds {
                account_id,
                required: amount,
                available,
            });
        }
        debit(&mut tx, account_id, amount).await?;

        let row = sqlx::query("INSERT INTO reserves (order_id, amount_cents) VALUES ($1, $2) RETURNING id")
            .bind(order_id.as_i64())
            .bind(amount.cents())
            .fetch_one(&mut *tx)
            .await?;
        let reserve_id = ReserveId::new(row.try_get("id")?);

        tx.commit().await?;
        Ok(reserve_id)
    }

    async fn reserve_by_id(&self, id: ReserveId) -> Result<Option<Reserve>> {
        let row =
            sqlx::query("SELECT id, order_id, amount_cents, created_at FROM reserves WHERE id = $1")
                .bind(id.as_i64())
                .fetch_optional(&self.pool)
                .await?;

        row.map(Self::row_to_reserve).transpose()
    }

    async fn settle_revenue(&self, id: ReserveId) -> Result<OperationId> {
        self.settle(id, OperationKind::Revenue).await
    }

    async fn settle_refund(&self, id: ReserveId) -> Result<OperationId> {
        self.settle(id, OperationKind::Refund).await
    }
}

#[async_trait]
impl OperationStore for PostgresLedgerStore {
    async fn operations_for_account(&self, account_id: AccountId) -> Result<Vec<Operation>> {
        let rows = sqlx::query(
            r#"
            SELECT id, account_id, order_id, amount_cents, kind, order_date, created_at
            FROM operations
            WHERE account_id = $1
            ORDER BY id ASC
            "#,
        )
        .bind(account_id.as_i64())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_operation).collect()
    }

    async fn all_operations(&self) -> Result<Vec<Operation>> {
        let rows = sqlx::query(
            r#"
            SELECT id, account_id, order_id, amount_cents, kind, order_date, created_at
            FROM operations
            ORDER BY id ASC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(Self::row_to_operation).collect()
    }
}
