use anyhow::{Context, Result, bail};
use deposit_sentinel::config::AppConfig;
use deposit_sentinel::notifier::{LogNotifier, Notifier};
use deposit_sentinel::registry::ChainRegistry;
use deposit_sentinel::store::{DepositStore, PgDepositStore};
use deposit_sentinel::watch::Sentinel;
use deposit_sentinel::{api, logging};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

fn main() -> Result<()> {
    // Stream consumers and confirmation workers share this pool; keep at
    // least 5 workers even on small hosts.
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(worker_count())
        .enable_all()
        .build()
        .context("failed to build async runtime")?;

    runtime.block_on(run())
}

fn worker_count() -> usize {
    std::thread::available_parallelism()
        .map(usize::from)
        .unwrap_or(1)
        .max(5)
}

async fn run() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "config/sentinel.yaml".to_string());
    let config = AppConfig::from_file(&config_path)
        .with_context(|| format!("failed to load config from {config_path}"))?;

    let _guard = logging::init_logging(&config);
    info!("Starting deposit sentinel");

    let registry = Arc::new(ChainRegistry::init(&config.chains).await);
    if registry.is_empty() {
        bail!("no usable chain configured");
    }

    let store: Arc<dyn DepositStore> = Arc::new(
        PgDepositStore::connect(&config.database.url)
            .await
            .context("failed to connect to PostgreSQL")?,
    );
    let notifier: Arc<dyn Notifier> = Arc::new(LogNotifier);

    let sentinel = Sentinel::new(
        registry,
        store.clone(),
        notifier,
        Duration::from_millis(config.poll_interval_ms),
    );
    sentinel.start();

    tokio::spawn(api::run_server(
        config.server.host.clone(),
        config.server.port,
        store,
        sentinel.cancellation_token(),
    ));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for shutdown signal")?;
    info!("Shutdown signal received");

    sentinel.shutdown().await;
    info!("Deposit sentinel stopped");
    Ok(())
}
