//! Fund reservation and settlement.

use common::{OperationId, OrderId, ReserveId};
use domain::{OrderStatus, Reserve};
use store::{OrderStore, ReserveStore};

use crate::error::{LedgerError, Result};

/// Service for holding order funds and settling the holds.
///
/// A reserve withdraws the order amount from the account and parks it
/// until the order outcome is known. Settling as revenue keeps the
/// funds withdrawn; settling as a refund returns them. Either way the
/// reserve is consumed and a journal entry is written.
#[derive(Debug, Clone)]
pub struct ReservationCoordinator<S> {
    store: S,
}

impl<S> ReservationCoordinator<S>
where
    S: ReserveStore + OrderStore,
{
    /// Creates a new reservation service backed by the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Places a hold on the funds of an `Accepted` order.
    ///
    /// The store re-checks the status atomically, so two racing calls
    /// can never both place a hold for the same order.
    #[tracing::instrument(skip(self))]
    pub async fn reserve(&self, order_id: OrderId) -> Result<ReserveId> {
        metrics::counter!("ledger_reservations_total").increment(1);

        let order = self
            .store
            .order_by_id(order_id)
            .await?
            .ok_or(LedgerError::OrderNotFound(order_id))?;

        if !order.status.can_reserve() {
            return Err(LedgerError::InvalidState {
                order_id,
                required: OrderStatus::Accepted,
                actual: order.status,
            });
        }

        let reserve_id = self.store.reserve_funds(order_id).await?;

        tracing::info!(%order_id, %reserve_id, "funds reserved");

        Ok(reserve_id)
    }

    /// Settles a hold as revenue: the order is confirmed and the held
    /// funds stay withdrawn.
    #[tracing::instrument(skip(self))]
    pub async fn confirm_revenue(&self, reserve_id: ReserveId) -> Result<OperationId> {
        let start = std::time::Instant::now();

        let operation_id = match self.store.settle_revenue(reserve_id).await {
            Ok(operation_id) => operation_id,
            Err(err) => {
                metrics::counter!("ledger_settlements_failed_total").increment(1);
                tracing::warn!(%reserve_id, error = %err, "revenue settlement failed");
                return Err(err.into());
            }
        };

        metrics::counter!("ledger_settlements_revenue_total").increment(1);
        metrics::histogram!("ledger_settlement_duration_seconds")
            .record(start.elapsed().as_secs_f64());
        tracing::info!(%reserve_id, %operation_id, "reserve settled as revenue");

        Ok(operation_id)
    }

    /// Settles a hold as a refund: the order is cancelled and the held
    /// funds return to the account.
    #[tracing::instrument(skip(self))]
    pub async fn confirm_refund(&self, reserve_id: ReserveId) -> Result<OperationId> {
        let start = std::time::Instant::now();

        let operation_id = match self.store.settle_refund(reserve_id).await {
            Ok(operation_id) => operation_id,
            Err(err) => {
                metrics::counter!("ledger_settlements_failed_total").increment(1);
                tracing::warn!(%reserve_id, error = %err, "refund settlement failed");
                return Err(err.into());
            }
        };

        metrics::counter!("ledger_settlements_refund_total").increment(1);
        metrics::histogram!("ledger_settlement_duration_seconds")
            .record(start.elapsed().as_secs_f64());
        tracing::info!(%reserve_id, %operation_id, "reserve settled as refund");

        Ok(operation_id)
    }

    /// Returns a reserve by its ID.
    pub async fn reserve_by_id(&self, reserve_id: ReserveId) -> Result<Reserve> {
        self.store
            .reserve_by_id(reserve_id)
            .await?
            .ok_or(LedgerError::ReserveNotFound(reserve_id))
    }
}
