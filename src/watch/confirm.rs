//! Confirmation tracker.
//!
//! One task per chain on a fixed 5-second cadence. Each tick reads the
//! current head over HTTP and advances every pending deposit of its chain
//! through the state machine. A head-query failure aborts only the current
//! tick; per-deposit store failures are logged and the tick moves on, so
//! the next tick retries the update from scratch.

use crate::error::WatchError;
use crate::model::DepositStatus;
use crate::notifier::Notifier;
use crate::rpc::RpcClient;
use crate::store::DepositStore;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const CONFIRMATION_INTERVAL: Duration = Duration::from_secs(5);

pub struct ConfirmationTracker {
    chain: String,
    required_confirmations: u64,
    store: Arc<dyn DepositStore>,
    notifier: Arc<dyn Notifier>,
}

impl ConfirmationTracker {
    pub fn new(
        chain: String,
        required_confirmations: u64,
        store: Arc<dyn DepositStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            chain,
            required_confirmations,
            store,
            notifier,
        }
    }

    pub async fn run(self, client: RpcClient, cancel: CancellationToken) {
        info!(
            "[{}] Confirmation tracker started | requiredConfirmations={}",
            self.chain, self.required_confirmations
        );

        let mut interval = tokio::time::interval(CONFIRMATION_INTERVAL);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    info!("[{}] Confirmation tracker stopped", self.chain);
                    return;
                }
                _ = interval.tick() => {
                    let head = match client.block_number().await {
                        Ok(head) => head,
                        Err(e) => {
                            warn!("[{}] Head query failed, skipping tick: {}", self.chain, e);
                            continue;
                        }
                    };
                    if let Err(e) = self.tick(head).await {
                        warn!("[{}] Confirmation tick failed: {}", self.chain, e);
                    }
                }
            }
        }
    }

    /// Advance all pending deposits of this chain against the given head.
    pub async fn tick(&self, head: u64) -> Result<(), WatchError> {
        let pending = self.store.find_pending().await?;
        if pending.is_empty() {
            return Ok(());
        }

        for deposit in pending
            .iter()
            .filter(|d| d.chain.eq_ignore_ascii_case(&self.chain))
        {
            let confirm_count = head as i64 - deposit.block_number;
            if confirm_count < 0 {
                // Tracked head briefly lags the ingestor's reported block.
                debug!(
                    "[{}] Head {} behind block {} for tx={}, skipping",
                    self.chain, head, deposit.block_number, deposit.tx_hash
                );
                continue;
            }

            if confirm_count as u64 >= self.required_confirmations {
                match self
                    .store
                    .update_status(deposit.id, DepositStatus::Confirmed, confirm_count)
                    .await
                {
                    Ok(()) => {
                        info!(
                            "[{}] Deposit confirmed: tx={} (+{} confirmations)",
                            self.chain, deposit.tx_hash, confirm_count
                        );
                        let mut confirmed = deposit.clone();
                        confirmed.status = DepositStatus::Confirmed;
                        confirmed.confirmations = confirm_count;
                        self.notifier.on_deposit_confirmed(&confirmed).await;
                    }
                    Err(e) => {
                        warn!(
                            "[{}] Failed to confirm tx={}: {}",
                            self.chain, deposit.tx_hash, e
                        );
                    }
                }
            } else if let Err(e) = self
                .store
                .update_status(deposit.id, DepositStatus::Confirming, confirm_count)
                .await
            {
                warn!(
                    "[{}] Failed to update confirmations for tx={}: {}",
                    self.chain, deposit.tx_hash, e
                );
            } else {
                info!(
                    "[{}] Deposit confirming: tx={} ({}/{})",
                    self.chain, deposit.tx_hash, confirm_count, self.required_confirmations
                );
            }
        }

        Ok(())
    }
}
