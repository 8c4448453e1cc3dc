//! Balance accounts.

use chrono::{DateTime, Utc};
use common::{AccountId, Money, UserId};
use serde::{Deserialize, Serialize};

/// A user's balance account.
///
/// The balance is the amount available for new orders and transfers.
/// It never goes below zero: funds held by an active reservation have
/// already been debited from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Storage-assigned identifier.
    pub id: AccountId,

    /// The owning user. At most one account exists per user.
    pub user_id: UserId,

    /// Current available balance.
    pub balance: Money,

    /// When the account was opened.
    pub created_at: DateTime<Utc>,
}
