//! Purchase orders and their state machine.

use chrono::{DateTime, Utc};
use common::{AccountId, Money, OrderId, ProductId};
use serde::{Deserialize, Serialize};

/// The status of an order in its lifecycle.
///
/// Status transitions:
/// ```text
/// Accepted ──┬──► Processing ──┬──► Confirmed
///            │                 │
///            └─────────────────┴──► Cancelled
/// ```
///
/// `Processing` means a reservation currently holds the order's funds.
/// Leaving `Processing` always settles that reservation, either as
/// revenue (`Confirmed`) or as a refund (`Cancelled`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum OrderStatus {
    /// Order was placed, no funds are held yet.
    #[default]
    Accepted,

    /// Funds are reserved, awaiting settlement.
    Processing,

    /// Settled as revenue (terminal state).
    Confirmed,

    /// Cancelled before reservation, or settled as a refund (terminal state).
    Cancelled,
}

impl OrderStatus {
    /// Returns true if funds can be reserved in this status.
    pub fn can_reserve(&self) -> bool {
        matches!(self, OrderStatus::Accepted)
    }

    /// Returns true if the order can be cancelled outright in this status.
    ///
    /// A `Processing` order cannot: its held funds must first be
    /// settled as a refund, which cancels the order as a side effect.
    pub fn can_cancel(&self) -> bool {
        matches!(self, OrderStatus::Accepted)
    }

    /// Returns true if the order's reservation can be settled in this status.
    pub fn can_settle(&self) -> bool {
        matches!(self, OrderStatus::Processing)
    }

    /// Returns true if this is a terminal status (no further transitions possible).
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Confirmed | OrderStatus::Cancelled)
    }

    /// Returns the status name as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Accepted => "accepted",
            OrderStatus::Processing => "processing",
            OrderStatus::Confirmed => "confirmed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    /// Parses a status from its database representation.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "accepted" => Some(OrderStatus::Accepted),
            "processing" => Some(OrderStatus::Processing),
            "confirmed" => Some(OrderStatus::Confirmed),
            "cancelled" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A purchase order against a balance account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    /// Storage-assigned identifier.
    pub id: OrderId,

    /// The account that pays for this order.
    pub account_id: AccountId,

    /// Products contained in the order. Duplicates are allowed and
    /// each occurrence is charged.
    pub product_ids: Vec<ProductId>,

    /// Total price, fixed when the order was placed.
    pub amount: Money,

    /// Current lifecycle status.
    pub status: OrderStatus,

    /// When the order was placed.
    pub created_at: DateTime<Utc>,
}
