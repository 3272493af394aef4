//! Watch service: per-chain ingestion and confirmation tasks.
//!
//! For every chain in the registry the service spawns:
//! - a block-header consumer (native transfers) when streaming is available,
//! - one log consumer per watched token contract when streaming is
//!   available, or a single polling consumer otherwise,
//! - a confirmation tracker on a fixed 5-second cadence.
//!
//! Task handles are retained in a concurrent map keyed by chain; shutdown
//! cancels every task through a shared token and then waits for them,
//! which drops the subscriptions before the clients are released.

pub mod block;
pub mod confirm;
pub mod event;

pub use confirm::ConfirmationTracker;

use crate::notifier::Notifier;
use crate::pipeline::DepositPipeline;
use crate::registry::ChainRegistry;
use crate::store::DepositStore;
use alloy::primitives::Address;
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

pub struct Sentinel {
    registry: Arc<ChainRegistry>,
    store: Arc<dyn DepositStore>,
    notifier: Arc<dyn Notifier>,
    pipeline: Arc<DepositPipeline>,
    poll_interval: Duration,
    cancel: CancellationToken,
    tasks: DashMap<String, Vec<JoinHandle<()>>>,
}

impl Sentinel {
    pub fn new(
        registry: Arc<ChainRegistry>,
        store: Arc<dyn DepositStore>,
        notifier: Arc<dyn Notifier>,
        poll_interval: Duration,
    ) -> Self {
        let pipeline = Arc::new(DepositPipeline::new(store.clone(), notifier.clone()));
        Self {
            registry,
            store,
            notifier,
            pipeline,
            poll_interval,
            cancel: CancellationToken::new(),
            tasks: DashMap::new(),
        }
    }

    /// Token other components (the HTTP server) can tie their shutdown to.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Spawn ingestion and confirmation tasks for every supported chain.
    pub fn start(&self) {
        let chains: Vec<String> = self
            .registry
            .supported_chains()
            .map(str::to_string)
            .collect();
        info!("Sentinel starting with {} chain(s)", chains.len());

        for chain in chains {
            self.start_chain(chain);
        }
    }

    fn start_chain(&self, chain: String) {
        let Some(handle) = self.registry.get(&chain) else {
            return;
        };

        info!(
            "[{}] Starting monitor | requiredConfirmations={} | streaming={}",
            chain,
            handle.required_confirmations,
            handle.stream.is_some()
        );

        let mut tasks = Vec::new();

        if handle.stream.is_some() {
            tasks.push(tokio::spawn(block::run(
                self.registry.clone(),
                chain.clone(),
                self.pipeline.clone(),
                self.cancel.clone(),
            )));

            let tokens: BTreeSet<Address> = handle
                .monitors
                .iter()
                .filter_map(|m| m.token_address)
                .collect();
            for token in tokens {
                tasks.push(tokio::spawn(event::run_stream(
                    self.registry.clone(),
                    chain.clone(),
                    token,
                    self.pipeline.clone(),
                    self.cancel.clone(),
                )));
            }
        } else {
            tasks.push(tokio::spawn(event::run_polling(
                self.registry.clone(),
                chain.clone(),
                self.poll_interval,
                self.pipeline.clone(),
                self.cancel.clone(),
            )));
        }

        let tracker = ConfirmationTracker::new(
            chain.clone(),
            handle.required_confirmations,
            self.store.clone(),
            self.notifier.clone(),
        );
        tasks.push(tokio::spawn(
            tracker.run(handle.http.clone(), self.cancel.clone()),
        ));

        self.tasks.insert(chain, tasks);
    }

    /// Cancel every task and wait for it to exit. In-flight ticks complete;
    /// nothing here panics out of the shutdown path.
    pub async fn shutdown(&self) {
        info!("Stopping all subscriptions and workers");
        self.cancel.cancel();

        let chains: Vec<String> = self.tasks.iter().map(|e| e.key().clone()).collect();
        for chain in chains {
            if let Some((_, tasks)) = self.tasks.remove(&chain) {
                for task in tasks {
                    let _ = task.await;
                }
                info!("[{}] Monitor stopped", chain);
            }
        }
    }
}
