//! The settlement journal.

use chrono::{DateTime, Utc};
use common::{AccountId, Money, OperationId, OrderId};
use serde::{Deserialize, Serialize};

/// How a reservation was settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    /// The held funds were kept as revenue.
    Revenue,

    /// The held funds were credited back to the account.
    Refund,
}

impl OperationKind {
    /// Returns the kind as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Revenue => "revenue",
            OperationKind::Refund => "refund",
        }
    }

    /// Parses a kind from its database representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "revenue" => Some(OperationKind::Revenue),
            "refund" => Some(OperationKind::Refund),
            _ => None,
        }
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One journal entry, written when a reservation settles.
///
/// The journal is append-only. Deposits and transfers do not appear in
/// it; only settled reservations do.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    /// Storage-assigned identifier.
    pub id: OperationId,

    /// The account whose funds were settled.
    pub account_id: AccountId,

    /// The order the settlement belongs to.
    pub order_id: OrderId,

    /// The settled amount.
    pub amount: Money,

    /// Whether the settlement kept or returned the funds.
    pub kind: OperationKind,

    /// When the settled order was placed. Report descriptions quote
    /// this date, not the settlement time.
    pub order_date: DateTime<Utc>,

    /// When the settlement happened.
    pub created_at: DateTime<Utc>,

    /// Human-readable summary, attached by per-account reporting.
    /// Never persisted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
