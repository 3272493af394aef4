//! Event ingestor: ERC-20 deposit detection.
//!
//! Preferred path: one log subscription per `(chain, token)` on the
//! streaming client, open-ended from the current head. Fallback path (only
//! for chains without a streaming client): poll the head and issue bounded
//! per-block log queries, with linear backoff on rate-limit responses.

use crate::error::{RpcError, WatchError};
use crate::events::decode_transfer;
use crate::model::{Asset, NewDeposit, format_address, scale_units};
use crate::pipeline::DepositPipeline;
use crate::registry::{ChainHandle, ChainRegistry};
use alloy::primitives::Address;
use alloy::rpc::types::Log;
use futures::StreamExt;
use std::collections::BTreeSet;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{MissedTickBehavior, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Bounded log queries give up after this many attempts when throttled.
pub const MAX_LOG_QUERY_ATTEMPTS: u32 = 5;

/// Streaming consumer for one `(chain, token)` pair.
pub async fn run_stream(
    registry: Arc<ChainRegistry>,
    chain_name: String,
    token: Address,
    pipeline: Arc<DepositPipeline>,
    cancel: CancellationToken,
) {
    let Some(chain) = registry.get(&chain_name) else {
        return;
    };
    let Some(stream_client) = &chain.stream else {
        return;
    };

    let sub = match stream_client.subscribe_transfer_logs(token).await {
        Ok(sub) => sub,
        Err(e) => {
            error!(
                "[{}] ERC20 log subscription failed for token {}: {}",
                chain_name,
                format_address(&token),
                e
            );
            return;
        }
    };
    info!(
        "[{}] ERC20 subscription started: token={}",
        chain_name,
        format_address(&token)
    );

    let mut stream = sub.into_stream();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!(
                    "[{}] ERC20 ingestor stopped: token={}",
                    chain_name,
                    format_address(&token)
                );
                return;
            }
            log = stream.next() => {
                let Some(log) = log else {
                    warn!(
                        "[{}] ERC20 log stream ended: token={}",
                        chain_name,
                        format_address(&token)
                    );
                    return;
                };
                if let Err(e) = handle_transfer_log(chain, token, &log, &pipeline).await {
                    warn!("[{}] Error handling transfer log: {}", chain_name, e);
                }
            }
        }
    }
}

/// Decode one `Transfer` log and record a deposit for every monitor of this
/// token whose wallet matches the indexed `to`.
pub async fn handle_transfer_log(
    chain: &ChainHandle,
    token: Address,
    log: &Log,
    pipeline: &DepositPipeline,
) -> Result<(), WatchError> {
    let event = match decode_transfer(log) {
        Ok(event) => event,
        Err(e) => {
            warn!(
                "[{}] Failed to decode Transfer log (tx={:?}): {}",
                chain.name, log.transaction_hash, e
            );
            return Ok(());
        }
    };

    let Some(tx_hash) = log.transaction_hash else {
        warn!("[{}] Transfer log without tx hash, skipping", chain.name);
        return Ok(());
    };
    let Some(block_number) = log.block_number else {
        // Mined logs always carry a block number; anything else is a
        // pending log we must not feed the confirmation tracker.
        warn!(
            "[{}] Transfer log for tx {} has no block number, skipping",
            chain.name, tx_hash
        );
        return Ok(());
    };

    if event.value.is_zero() {
        return Ok(());
    }

    for monitor in chain
        .monitors
        .iter()
        .filter(|m| m.token_address == Some(token))
    {
        if event.to != monitor.wallet_address {
            continue;
        }
        let Some(amount) = scale_units(event.value, monitor.token_decimals) else {
            warn!(
                "[{}] ERC20 value out of range in tx {}, skipping",
                chain.name, tx_hash
            );
            continue;
        };
        info!(
            "[{}] Detected ERC20 deposit: tx={} amount={}",
            chain.name, tx_hash, amount
        );
        pipeline
            .record(NewDeposit {
                tx_hash: tx_hash.to_string(),
                monitored_address: format_address(&monitor.wallet_address),
                chain: chain.name.clone(),
                token_address: Some(format_address(&token)),
                asset: Asset::Erc20,
                amount,
                decimals: monitor.token_decimals,
                block_number,
            })
            .await?;
    }

    Ok(())
}

/// Polling consumer for a chain without a streaming client. Each tick reads
/// the head and queries every newly observed height, one bounded log query
/// per token. A failed query drops the rest of the tick; the next tick
/// resumes after the last fully processed height.
pub async fn run_polling(
    registry: Arc<ChainRegistry>,
    chain_name: String,
    poll_interval: Duration,
    pipeline: Arc<DepositPipeline>,
    cancel: CancellationToken,
) {
    let Some(chain) = registry.get(&chain_name) else {
        return;
    };

    let tokens: BTreeSet<Address> = chain
        .monitors
        .iter()
        .filter_map(|m| m.token_address)
        .collect();
    if tokens.is_empty() {
        return;
    }

    info!(
        "[{}] No streaming client, polling ERC20 logs every {:?} ({} tokens)",
        chain_name,
        poll_interval,
        tokens.len()
    );

    let mut interval = tokio::time::interval(poll_interval);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut last_height: Option<u64> = None;

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("[{}] ERC20 poller stopped", chain_name);
                return;
            }
            _ = interval.tick() => {
                let head = match chain.http.block_number().await {
                    Ok(head) => head,
                    Err(e) => {
                        warn!("[{}] Head query failed: {}", chain_name, e);
                        continue;
                    }
                };
                let start = match last_height {
                    Some(h) => h + 1,
                    None => {
                        // First tick establishes the watermark; the filter
                        // is open-ended from the current head forward.
                        last_height = Some(head);
                        continue;
                    }
                };
                for height in start..=head {
                    match poll_block(chain, &tokens, height, &pipeline).await {
                        Ok(()) => last_height = Some(height),
                        Err(e) => {
                            warn!(
                                "[{}] Log poll failed at block {}, dropping tick: {}",
                                chain_name, height, e
                            );
                            break;
                        }
                    }
                }
            }
        }
    }
}

async fn poll_block(
    chain: &ChainHandle,
    tokens: &BTreeSet<Address>,
    height: u64,
    pipeline: &DepositPipeline,
) -> Result<(), WatchError> {
    for token in tokens {
        let logs =
            retry_rate_limited(|| chain.http.transfer_logs_in_block(*token, height)).await?;
        for log in &logs {
            handle_transfer_log(chain, *token, log, pipeline).await?;
        }
    }
    Ok(())
}

/// Run a log query with linear backoff on rate-limit responses: sleep
/// 1s, 2s, 3s, 4s between attempts, up to `MAX_LOG_QUERY_ATTEMPTS` total.
/// Any other error aborts immediately.
pub async fn retry_rate_limited<T, F, Fut>(op: F) -> Result<T, RpcError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, RpcError>>,
{
    let mut attempt: u32 = 1;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_rate_limited() && attempt < MAX_LOG_QUERY_ATTEMPTS => {
                warn!(
                    "Rate limited (attempt {}/{}), backing off {}s",
                    attempt, MAX_LOG_QUERY_ATTEMPTS, attempt
                );
                sleep(Duration::from_secs(u64::from(attempt))).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_retry_backs_off_linearly_on_429() {
        let attempts = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result = retry_rate_limited(|| {
            let n = attempts.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n <= 2 {
                    Err(RpcError::Transport("HTTP status 429".to_string()))
                } else {
                    Ok(n)
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result, 3);
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
        // Two backoffs: 1s after the first failure, 2s after the second.
        assert_eq!(started.elapsed(), Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_gives_up_after_max_attempts() {
        let attempts = AtomicU32::new(0);

        let result: Result<(), _> = retry_rate_limited(|| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(RpcError::Transport("429 Too Many Requests".to_string())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), MAX_LOG_QUERY_ATTEMPTS);
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_aborts_immediately_on_other_errors() {
        let attempts = AtomicU32::new(0);
        let started = tokio::time::Instant::now();

        let result: Result<(), _> = retry_rate_limited(|| {
            attempts.fetch_add(1, Ordering::SeqCst);
            async { Err(RpcError::Transport("connection refused".to_string())) }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(started.elapsed(), Duration::ZERO);
    }
}
