//! Accrual worker
//!
//! One Tokio task per order polls the calculator until it reports a terminal
//! status, then finalizes the order and credits the owner in one ledger call.
//! Rate-limit delays are honoured as reported, everything else that is not
//! final waits one poll interval.

use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::client::{AccrualSource, PollResult};
use crate::store::{OrderStatus, Store, StoreError};

pub struct AccrualWorker {
    store: Arc<dyn Store>,
    source: Arc<dyn AccrualSource>,
    poll_interval: Duration,
}

impl AccrualWorker {
    pub fn new(
        store: Arc<dyn Store>,
        source: Arc<dyn AccrualSource>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            store,
            source,
            poll_interval,
        }
    }

    /// Drive `number` in the background
    pub fn spawn(self: &Arc<Self>, owner: String, number: String) -> JoinHandle<()> {
        let worker = Arc::clone(self);
        tokio::spawn(async move {
            match worker.run(&owner, &number).await {
                Ok(status) => debug!(order = %number, status = %status, "Accrual worker done"),
                Err(e) => error!(order = %number, user = %owner, error = %e, "Accrual worker aborted"),
            }
        })
    }

    /// Re-drive every order left in `NEW` or `PROCESSING`, e.g. by a restart
    pub async fn resume_pending(self: &Arc<Self>) -> Result<usize, StoreError> {
        let pending = self.store.get_pending_orders().await?;
        let count = pending.len();
        for order in pending {
            self.spawn(order.owner, order.number);
        }
        if count > 0 {
            info!(count, "Resumed pending accrual workers");
        }
        Ok(count)
    }

    /// Poll until terminal and finalize. Returns the final status.
    pub async fn run(&self, owner: &str, number: &str) -> Result<OrderStatus, StoreError> {
        let mut marked_processing = false;

        let (status, accrual) = loop {
            match self.source.query(number).await {
                PollResult::RateLimited(delay) => {
                    tokio::time::sleep(delay).await;
                }
                PollResult::Transient => {
                    tokio::time::sleep(self.poll_interval).await;
                }
                PollResult::Ready { status, accrual } => {
                    if let Some(terminal) = status.terminal() {
                        let accrual = match terminal {
                            OrderStatus::Invalid => Decimal::ZERO,
                            _ => accrual.max(Decimal::ZERO),
                        };
                        break (terminal, accrual);
                    }
                    if !marked_processing {
                        marked_processing = self.mark_processing(number).await?;
                    }
                    tokio::time::sleep(self.poll_interval).await;
                }
            }
        };

        loop {
            match self.store.finalize_order(owner, number, status, accrual).await {
                Ok(true) => {
                    info!(order = %number, user = %owner, status = %status, accrual = %accrual, "Accrual applied");
                    return Ok(status);
                }
                Ok(false) => {
                    warn!(order = %number, "Order finalized elsewhere, skipping credit");
                    return Ok(status);
                }
                Err(StoreError::Database(e)) => {
                    error!(order = %number, error = %e, "Finalize failed, retrying");
                    tokio::time::sleep(self.poll_interval).await;
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// `NEW -> PROCESSING` once the calculator has the order. A refused
    /// transition means the order already moved on; keep polling anyway.
    async fn mark_processing(&self, number: &str) -> Result<bool, StoreError> {
        match self
            .store
            .update_order(number, OrderStatus::Processing, Decimal::ZERO)
            .await
        {
            Ok(()) => Ok(true),
            Err(StoreError::InvalidTransition { from, .. }) => {
                debug!(order = %number, from = %from, "Order not movable to PROCESSING");
                Ok(true)
            }
            Err(StoreError::Database(e)) => {
                warn!(order = %number, error = %e, "Failed to mark order PROCESSING");
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}
