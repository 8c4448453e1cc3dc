//! Ledger error types.

use common::{AccountId, Money, OrderId, ProductId, ReserveId, UserId};
use domain::OrderStatus;
use store::StoreError;
use thiserror::Error;

/// Errors that can occur during ledger operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// The account was not found.
    #[error("Account not found: {0}")]
    AccountNotFound(AccountId),

    /// The user has no account.
    #[error("No account for user {0}")]
    NoAccountForUser(UserId),

    /// The order was not found.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    /// The reserve was not found.
    #[error("Reserve not found: {0}")]
    ReserveNotFound(ReserveId),

    /// The catalog has no price for this product.
    #[error("Product not found in catalog: {0}")]
    ProductNotFound(ProductId),

    /// An account for this user already exists.
    #[error("An account already exists for user {0}")]
    AccountAlreadyExists(UserId),

    /// The amount must be positive.
    #[error("Invalid amount: {0}")]
    InvalidAmount(Money),

    /// The account balance cannot cover the requested amount.
    #[error(
        "Insufficient funds in account {account_id}: required {required}, available {available}"
    )]
    InsufficientFunds {
        account_id: AccountId,
        required: Money,
        available: Money,
    },

    /// The order is in an invalid state for the requested operation.
    #[error("Invalid state for order {order_id}: expected {required}, actual {actual}")]
    InvalidState {
        order_id: OrderId,
        required: OrderStatus,
        actual: OrderStatus,
    },

    /// An order must contain at least one product.
    #[error("Order contains no products")]
    EmptyOrder,

    /// A concurrent operation won the race. Retrying is expected to succeed.
    #[error("Operation aborted by a concurrent conflict")]
    Conflict,

    /// Catalog service error.
    #[error("Catalog service error: {0}")]
    Catalog(String),

    /// Storage error.
    #[error("Storage error: {0}")]
    Storage(StoreError),
}

impl LedgerError {
    /// Returns true for failures a retry of the whole operation can
    /// reasonably be expected to clear.
    pub fn is_retryable(&self) -> bool {
        match self {
            LedgerError::Conflict => true,
            LedgerError::Storage(err) => err.is_transient(),
            _ => false,
        }
    }
}

/// Lifts store failures into their ledger counterparts so callers see
/// one error vocabulary regardless of which layer refused.
impl From<StoreError> for LedgerError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AccountNotFound(id) => LedgerError::AccountNotFound(id),
            StoreError::OrderNotFound(id) => LedgerError::OrderNotFound(id),
            StoreError::ReserveNotFound(id) => LedgerError::ReserveNotFound(id),
            StoreError::AccountExists(user_id) => LedgerError::AccountAlreadyExists(user_id),
            StoreError::InsufficientFunds {
                account_id,
                required,
                available,
            } => LedgerError::InsufficientFunds {
                account_id,
                required,
                available,
            },
            StoreError::StatusConflict {
                order_id,
                required,
                actual,
            } => LedgerError::InvalidState {
                order_id,
                required,
                actual,
            },
            StoreError::Serialization => LedgerError::Conflict,
            other => LedgerError::Storage(other),
        }
    }
}

/// Convenience type alias for ledger results.
pub type Result<T> = std::result::Result<T, LedgerError>;
