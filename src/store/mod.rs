//! Deposit ledger.
//!
//! `DepositStore` is the storage contract the engine is written against;
//! `tx_hash` uniqueness at the storage layer is the serialization mechanism
//! that turns at-least-once delivery into effectively-once recording.

pub mod memory;
pub mod pg;

pub use memory::MemoryDepositStore;
pub use pg::PgDepositStore;

use crate::error::StoreError;
use crate::model::{Deposit, DepositStatus, NewDeposit};
use async_trait::async_trait;

#[async_trait]
pub trait DepositStore: Send + Sync {
    async fn find_by_tx_hash(&self, tx_hash: &str) -> Result<Option<Deposit>, StoreError>;

    /// Insert-if-new keyed by `tx_hash`. Returns `None` when the hash is
    /// already recorded; concurrent duplicate inserts lose silently.
    async fn insert(&self, deposit: NewDeposit) -> Result<Option<Deposit>, StoreError>;

    /// All deposits still in the confirmation state machine
    /// (`UNCONFIRMED` or `CONFIRMING`), across all chains.
    async fn find_pending(&self) -> Result<Vec<Deposit>, StoreError>;

    /// The only mutation the confirmation tracker performs. Also bumps
    /// `updated_at`.
    async fn update_status(
        &self,
        id: i64,
        status: DepositStatus,
        confirmations: i64,
    ) -> Result<(), StoreError>;

    /// Every stored deposit, for the read-only listing endpoint.
    async fn list_all(&self) -> Result<Vec<Deposit>, StoreError>;
}
