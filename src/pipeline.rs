//! Deposit pipeline: the single funnel both ingestion paths feed.
//!
//! Idempotent on `tx_hash`: the block scan, the log subscription and the
//! polled fallback may all hand over the same transfer and exactly one row
//! (and one notification) results.

use crate::error::WatchError;
use crate::model::NewDeposit;
use crate::notifier::Notifier;
use crate::store::DepositStore;
use rust_decimal::Decimal;
use std::sync::Arc;
use tracing::{debug, info};

pub struct DepositPipeline {
    store: Arc<dyn DepositStore>,
    notifier: Arc<dyn Notifier>,
}

impl DepositPipeline {
    pub fn new(store: Arc<dyn DepositStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self { store, notifier }
    }

    /// Record a detected transfer. Duplicate observations return silently.
    pub async fn record(&self, deposit: NewDeposit) -> Result<(), WatchError> {
        if deposit.amount <= Decimal::ZERO {
            debug!(
                "[{}] Ignoring non-positive transfer: {}",
                deposit.chain, deposit.tx_hash
            );
            return Ok(());
        }

        if self.store.find_by_tx_hash(&deposit.tx_hash).await?.is_some() {
            debug!(
                "[{}] Skip (already recorded): {}",
                deposit.chain, deposit.tx_hash
            );
            return Ok(());
        }

        match self.store.insert(deposit).await? {
            Some(saved) => {
                info!(
                    "[{}] Deposit recorded: tx={} asset={} amount={} block={}",
                    saved.chain, saved.tx_hash, saved.asset, saved.amount, saved.block_number
                );
                self.notifier.on_new_deposit(&saved).await;
            }
            None => {
                // A concurrent observer inserted the same tx_hash between
                // our lookup and our insert; that is a successful dedup.
                debug!("Lost insert race, transfer already recorded");
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Asset, DepositStatus};
    use crate::notifier::RecordingNotifier;
    use crate::store::MemoryDepositStore;

    fn native_deposit(tx_hash: &str, amount: Decimal) -> NewDeposit {
        NewDeposit {
            tx_hash: tx_hash.to_string(),
            monitored_address: "0xd8da6bf26964af9d7eed9e03e53415d37aa96045".to_string(),
            chain: "ETH".to_string(),
            token_address: None,
            asset: Asset::Native,
            amount,
            decimals: 18,
            block_number: 100,
        }
    }

    fn setup() -> (
        Arc<MemoryDepositStore>,
        Arc<RecordingNotifier>,
        DepositPipeline,
    ) {
        let store = Arc::new(MemoryDepositStore::new());
        let notifier = Arc::new(RecordingNotifier::default());
        let pipeline = DepositPipeline::new(store.clone(), notifier.clone());
        (store, notifier, pipeline)
    }

    #[tokio::test]
    async fn test_record_inserts_and_notifies_once() {
        let (store, notifier, pipeline) = setup();

        pipeline
            .record(native_deposit("0xTX1", Decimal::new(1, 0)))
            .await
            .unwrap();
        pipeline
            .record(native_deposit("0xTX1", Decimal::new(1, 0)))
            .await
            .unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(notifier.new_deposits.lock().unwrap().len(), 1);

        let saved = store.find_by_tx_hash("0xTX1").await.unwrap().unwrap();
        assert_eq!(saved.status, DepositStatus::Unconfirmed);
        assert_eq!(saved.confirmations, 0);
    }

    #[tokio::test]
    async fn test_record_skips_non_positive_amounts() {
        let (store, notifier, pipeline) = setup();

        pipeline
            .record(native_deposit("0xZERO", Decimal::ZERO))
            .await
            .unwrap();

        assert!(store.is_empty());
        assert!(notifier.new_deposits.lock().unwrap().is_empty());
    }
}
