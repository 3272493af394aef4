//! Block ingestor: native-coin deposit detection.
//!
//! Subscribes to new block headers on the chain's streaming client. Headers
//! arrive without transaction bodies, so each block with native monitors is
//! re-fetched in full over HTTP before scanning. On subscription error the
//! task ends; confirmation polling keeps the chain live. Reconnection, if
//! any, is the streaming client's business, not ours.

use crate::error::WatchError;
use crate::model::{Asset, NATIVE_DECIMALS, NewDeposit, format_address, wei_to_coin};
use crate::pipeline::DepositPipeline;
use crate::registry::{ChainHandle, ChainRegistry, Monitor};
use alloy::consensus::Transaction as _;
use alloy::network::TransactionResponse;
use alloy::primitives::{Address, B256, U256};
use futures::StreamExt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

pub async fn run(
    registry: Arc<ChainRegistry>,
    chain_name: String,
    pipeline: Arc<DepositPipeline>,
    cancel: CancellationToken,
) {
    let Some(chain) = registry.get(&chain_name) else {
        return;
    };
    let Some(stream_client) = &chain.stream else {
        return;
    };

    let sub = match stream_client.subscribe_blocks().await {
        Ok(sub) => sub,
        Err(e) => {
            error!("[{}] Block subscription failed: {}", chain_name, e);
            return;
        }
    };
    info!("[{}] Subscribed to new block headers", chain_name);

    let mut stream = sub.into_stream();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                info!("[{}] Block ingestor stopped", chain_name);
                return;
            }
            header = stream.next() => {
                let Some(header) = header else {
                    warn!("[{}] Block stream ended", chain_name);
                    return;
                };
                if let Err(e) = process_block(chain, header.number, &pipeline).await {
                    warn!(
                        "[{}] Error processing block {}: {}",
                        chain_name, header.number, e
                    );
                }
            }
        }
    }
}

/// Scan one block for native transfers to monitored wallets. Blocks whose
/// transaction list is hash-only are skipped silently.
pub async fn process_block(
    chain: &ChainHandle,
    height: u64,
    pipeline: &DepositPipeline,
) -> Result<(), WatchError> {
    debug!("[{}] New block: {}", chain.name, height);

    if !chain.monitors.iter().any(|m| m.token_address.is_none()) {
        return Ok(());
    }

    let Some(block) = chain.http.block_with_transactions(height).await? else {
        warn!("[{}] Block {} not available yet", chain.name, height);
        return Ok(());
    };
    let Some(txs) = block.transactions.as_transactions() else {
        return Ok(());
    };

    let candidates = txs
        .iter()
        .filter_map(|tx| Some((tx.tx_hash(), tx.to()?, tx.value())));

    for deposit in match_native_transfers(&chain.name, height, candidates, &chain.monitors) {
        info!(
            "[{}] Detected native deposit: tx={} amount={}",
            chain.name, deposit.tx_hash, deposit.amount
        );
        pipeline.record(deposit).await?;
    }

    Ok(())
}

/// Match `(tx_hash, to, value)` triples against the chain's native
/// monitors. Zero-value transfers are never recorded.
pub fn match_native_transfers(
    chain: &str,
    height: u64,
    txs: impl IntoIterator<Item = (B256, Address, U256)>,
    monitors: &[Monitor],
) -> Vec<NewDeposit> {
    let wallets: Vec<&Monitor> = monitors
        .iter()
        .filter(|m| m.token_address.is_none())
        .collect();

    let mut deposits = Vec::new();
    for (tx_hash, to, value) in txs {
        if value.is_zero() {
            continue;
        }
        for monitor in &wallets {
            if to != monitor.wallet_address {
                continue;
            }
            let Some(amount) = wei_to_coin(value) else {
                warn!(
                    "[{}] Native value out of range in tx {}, skipping",
                    chain, tx_hash
                );
                continue;
            };
            deposits.push(NewDeposit {
                tx_hash: tx_hash.to_string(),
                monitored_address: format_address(&monitor.wallet_address),
                chain: chain.to_string(),
                token_address: None,
                asset: Asset::Native,
                amount,
                decimals: NATIVE_DECIMALS,
                block_number: height,
            });
        }
    }
    deposits
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use std::str::FromStr;

    const ONE_ETH: u64 = 1_000_000_000_000_000_000;

    fn monitor(wallet: &str) -> Monitor {
        Monitor {
            wallet_address: Address::from_str(wallet).unwrap(),
            token_address: None,
            token_decimals: 18,
        }
    }

    fn tx(hash_byte: u8, to: &str, value: u64) -> (B256, Address, U256) {
        (
            B256::repeat_byte(hash_byte),
            Address::from_str(to).unwrap(),
            U256::from(value),
        )
    }

    #[test]
    fn test_matches_monitored_wallet_and_scales_amount() {
        let monitors = [monitor("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa")];
        let txs = [tx(1, "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", ONE_ETH)];

        let deposits = match_native_transfers("ETH", 100, txs, &monitors);

        assert_eq!(deposits.len(), 1);
        let dep = &deposits[0];
        assert_eq!(dep.amount, Decimal::new(1, 0));
        assert_eq!(dep.asset, Asset::Native);
        assert_eq!(dep.block_number, 100);
        assert_eq!(dep.decimals, 18);
        assert_eq!(
            dep.monitored_address,
            "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa"
        );
    }

    #[test]
    fn test_address_match_is_case_insensitive() {
        // Monitor configured with a checksummed address, tx carries lowercase.
        let monitors = [monitor("0xd8dA6BF26964aF9D7eEd9e03E53415D37aA96045")];
        let txs = [tx(1, "0xd8da6bf26964af9d7eed9e03e53415d37aa96045", ONE_ETH)];

        let deposits = match_native_transfers("ETH", 100, txs, &monitors);
        assert_eq!(deposits.len(), 1);
    }

    #[test]
    fn test_ignores_non_monitored_recipient() {
        let monitors = [monitor("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa")];
        let txs = [tx(1, "0x00000000000000000000000000000000deadbeef", 10 * ONE_ETH)];

        assert!(match_native_transfers("ETH", 100, txs, &monitors).is_empty());
    }

    #[test]
    fn test_ignores_zero_value_transfer() {
        let monitors = [monitor("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa")];
        let txs = [tx(1, "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", 0)];

        assert!(match_native_transfers("ETH", 100, txs, &monitors).is_empty());
    }

    #[test]
    fn test_token_monitors_do_not_match_native_path() {
        let mut m = monitor("0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");
        m.token_address =
            Some(Address::from_str("0xbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb").unwrap());
        let txs = [tx(1, "0xaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa", ONE_ETH)];

        assert!(match_native_transfers("ETH", 100, txs, &[m]).is_empty());
    }
}
