//! Downstream notification seam.
//!
//! The engine reports state changes through this trait and never depends on
//! what happens on the other side. Implementations must be fast and must
//! swallow their own failures.

use crate::model::Deposit;
use async_trait::async_trait;
use std::sync::Mutex;
use tracing::info;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn on_new_deposit(&self, deposit: &Deposit);
    async fn on_deposit_confirmed(&self, deposit: &Deposit);
}

/// Default notifier: writes both callbacks to the log.
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn on_new_deposit(&self, deposit: &Deposit) {
        info!(
            "[{}] New deposit: tx={} asset={} amount={}",
            deposit.chain, deposit.tx_hash, deposit.asset, deposit.amount
        );
    }

    async fn on_deposit_confirmed(&self, deposit: &Deposit) {
        info!(
            "[{}] Deposit confirmed: tx={} amount={} (+{} confirmations)",
            deposit.chain, deposit.tx_hash, deposit.amount, deposit.confirmations
        );
    }
}

/// Captures every callback; used by tests and local dry runs.
#[derive(Default)]
pub struct RecordingNotifier {
    pub new_deposits: Mutex<Vec<Deposit>>,
    pub confirmed: Mutex<Vec<Deposit>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn on_new_deposit(&self, deposit: &Deposit) {
        self.new_deposits.lock().unwrap().push(deposit.clone());
    }

    async fn on_deposit_confirmed(&self, deposit: &Deposit) {
        self.confirmed.lock().unwrap().push(deposit.clone());
    }
}
