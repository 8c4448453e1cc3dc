use thiserror::Error;

use common::{AccountId, Money, OrderId, ReserveId, UserId};
use domain::OrderStatus;

/// Errors that can occur when interacting with the ledger store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The account was not found.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// The order was not found.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The reserve was not found.
    #[error("Reserve not found: {0}")]
    ReserveNotFound(ReserveId),

    /// An account for this user already exists.
    #[error("An account already exists for user {0}")]
    AccountExists(UserId),

    /// The account balance cannot cover the requested amount.
    #[error(
        "Insufficient funds in account {account_id}: required {required}, available {available}"
    )]
    InsufficientFunds {
        account_id: AccountId,
        required: Money,
        available: Money,
    },

    /// The order was not in the status the operation requires.
    #[error("Status conflict for order {order_id}: expected {required}, found {actual}")]
    StatusConflict {
        order_id: OrderId,
        required: OrderStatus,
        actual: OrderStatus,
    },

    /// The transaction was aborted by the serializable isolation
    /// checker. Retrying the whole operation is expected to succeed.
    #[error("Transaction aborted by serialization conflict")]
    Serialization,

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A stored value could not be decoded.
    #[error("Invalid {column} value in database: {value}")]
    Decode {
        column: &'static str,
        value: String,
    },
}

impl StoreError {
    /// Returns true for failures a retry of the whole operation can
    /// reasonably be expected to clear.
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Serialization => true,
            StoreError::Database(err) => {
                matches!(err, sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut)
            }
            _ => false,
        }
    }
}

/// Maps SQLSTATE 40001/40P01 aborts to [`StoreError::Serialization`];
/// everything else becomes [`StoreError::Database`].
impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(ref db_err) = err
            && let Some(code) = db_err.code()
            && (code == "40001" || code == "40P01")
        {
            return StoreError::Serialization;
        }
        StoreError::Database(err)
    }
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
