//! deposit-sentinel: multi-chain deposit detection and confirmation engine.
//!
//! Watches configured EVM chains for incoming native-coin and ERC-20
//! transfers to monitored wallets, records each transfer exactly once
//! (dedup on transaction hash), and advances it through the confirmation
//! state machine until final.
//!
//! # Modules
//!
//! - [`config`] - YAML service configuration (chains, monitors, logging)
//! - [`registry`] - Per-chain RPC client bundle (HTTP + optional WS)
//! - [`rpc`] - Request/response and pubsub chain clients
//! - [`events`] - ERC-20 `Transfer` event binding and decoding
//! - [`model`] - Deposit entity, state machine, amount scaling
//! - [`store`] - Deposit ledger contract plus PostgreSQL / in-memory backends
//! - [`pipeline`] - Idempotent recording funnel shared by all ingestors
//! - [`watch`] - Block/event ingestors and the confirmation tracker
//! - [`notifier`] - Downstream state-change notification seam
//! - [`api`] - Read-only HTTP listing endpoint

pub mod api;
pub mod config;
pub mod error;
pub mod events;
pub mod logging;
pub mod model;
pub mod notifier;
pub mod pipeline;
pub mod registry;
pub mod rpc;
pub mod store;
pub mod watch;

// Convenient re-exports at crate root
pub use config::AppConfig;
pub use error::{RpcError, StoreError, WatchError};
pub use model::{Asset, Deposit, DepositStatus, NewDeposit};
pub use notifier::{LogNotifier, Notifier};
pub use pipeline::DepositPipeline;
pub use registry::{ChainHandle, ChainRegistry, Monitor};
pub use store::{DepositStore, MemoryDepositStore, PgDepositStore};
pub use watch::Sentinel;
