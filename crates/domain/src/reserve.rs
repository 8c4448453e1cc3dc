//! Reservation holds.

use chrono::{DateTime, Utc};
use common::{Money, OrderId, ReserveId};
use serde::{Deserialize, Serialize};

/// A hold on funds backing one order.
///
/// A reserve exists exactly while its order is `Processing`. Creating
/// it debits the account; settlement deletes it again and either keeps
/// the money as revenue or credits it back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reserve {
    /// Storage-assigned identifier.
    pub id: ReserveId,

    /// The order whose funds are held. One reserve per order.
    pub order_id: OrderId,

    /// The held amount, equal to the order's amount.
    pub amount: Money,

    /// When the hold was placed.
    pub created_at: DateTime<Utc>,
}
