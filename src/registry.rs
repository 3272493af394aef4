//! Chain client registry.
//!
//! Built once from configuration at startup and read concurrently without
//! locks thereafter. Per chain it owns the required HTTP client, the
//! optional WebSocket client, the confirmation depth and the parsed monitor
//! list. A chain entry that cannot be parsed is skipped with a warning; a
//! failed WebSocket connection downgrades the chain to HTTP-only.

use crate::config::{ChainConfig, DEFAULT_REQUIRED_CONFIRMATIONS, MonitorConfig};
use crate::rpc::{RpcClient, StreamClient};
use alloy::primitives::Address;
use std::collections::HashMap;
use tracing::{error, info, warn};

/// One watched `(wallet, optional token, decimals)` triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Monitor {
    pub wallet_address: Address,
    pub token_address: Option<Address>,
    pub token_decimals: u8,
}

/// Per-chain handle bundle.
pub struct ChainHandle {
    pub name: String,
    pub http: RpcClient,
    pub stream: Option<StreamClient>,
    pub required_confirmations: u64,
    pub monitors: Vec<Monitor>,
}

pub struct ChainRegistry {
    chains: HashMap<String, ChainHandle>,
}

impl ChainRegistry {
    pub async fn init(configs: &[ChainConfig]) -> Self {
        let mut chains = HashMap::new();

        for cfg in configs {
            let (Some(name), Some(http_url)) = (&cfg.name, &cfg.http_url) else {
                warn!("Skipping chain entry with missing name or httpUrl");
                continue;
            };

            let monitors = match parse_monitors(&cfg.monitor) {
                Ok(monitors) => monitors,
                Err(bad) => {
                    warn!(
                        "[{}] Skipping chain: unparseable address in monitor list: {}",
                        name, bad
                    );
                    continue;
                }
            };

            let http = match RpcClient::connect(http_url) {
                Ok(client) => {
                    info!("[{}] HTTP client initialized: {}", name, http_url);
                    client
                }
                Err(e) => {
                    warn!("[{}] Skipping chain: {}", name, e);
                    continue;
                }
            };

            let stream = match cfg.ws_url.as_deref() {
                Some(ws_url) if !ws_url.is_empty() => {
                    match StreamClient::connect(ws_url).await {
                        Ok(client) => Some(client),
                        Err(e) => {
                            error!(
                                "[{}] Failed to connect WS {}: {}, continuing with HTTP only",
                                name, ws_url, e
                            );
                            None
                        }
                    }
                }
                _ => {
                    info!("[{}] No wsUrl configured, streaming disabled", name);
                    None
                }
            };

            if monitors.is_empty() {
                info!("[{}] No monitor list configured", name);
            } else {
                info!(
                    "[{}] Monitor list loaded with {} entries",
                    name,
                    monitors.len()
                );
            }

            chains.insert(
                name.clone(),
                ChainHandle {
                    name: name.clone(),
                    http,
                    stream,
                    required_confirmations: cfg.required_confirmations,
                    monitors,
                },
            );
        }

        Self { chains }
    }

    /// Chains with a valid request/response client.
    pub fn supported_chains(&self) -> impl Iterator<Item = &str> {
        self.chains.keys().map(String::as_str)
    }

    pub fn get(&self, chain: &str) -> Option<&ChainHandle> {
        self.chains.get(chain)
    }

    pub fn handles(&self) -> impl Iterator<Item = &ChainHandle> {
        self.chains.values()
    }

    pub fn is_empty(&self) -> bool {
        self.chains.is_empty()
    }

    pub fn required_confirmations(&self, chain: &str) -> u64 {
        self.get(chain)
            .map(|c| c.required_confirmations)
            .unwrap_or(DEFAULT_REQUIRED_CONFIRMATIONS)
    }

    pub fn monitors(&self, chain: &str) -> &[Monitor] {
        self.get(chain).map(|c| c.monitors.as_slice()).unwrap_or(&[])
    }
}

/// Parse config monitor entries into typed addresses. Returns the offending
/// input string on failure so the caller can log it.
fn parse_monitors(entries: &[MonitorConfig]) -> Result<Vec<Monitor>, String> {
    let mut monitors = Vec::with_capacity(entries.len());
    for entry in entries {
        let wallet_address = entry
            .wallet_address
            .parse::<Address>()
            .map_err(|_| entry.wallet_address.clone())?;
        let token_address = match &entry.token_address {
            Some(raw) => Some(raw.parse::<Address>().map_err(|_| raw.clone())?),
            None => None,
        };
        monitors.push(Monitor {
            wallet_address,
            token_address,
            token_decimals: entry.token_decimals,
        });
    }
    Ok(monitors)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain_entry(name: &str, http_url: Option<&str>) -> ChainConfig {
        ChainConfig {
            name: Some(name.to_string()),
            http_url: http_url.map(str::to_string),
            ws_url: None,
            required_confirmations: 3,
            monitor: vec![],
        }
    }

    #[tokio::test]
    async fn test_init_skips_entry_without_http_url() {
        let registry =
            ChainRegistry::init(&[chain_entry("ETH", None), chain_entry("BSC", Some("http://127.0.0.1:8545"))])
                .await;

        assert!(registry.get("ETH").is_none());
        assert!(registry.get("BSC").is_some());
        assert_eq!(registry.supported_chains().count(), 1);
    }

    #[tokio::test]
    async fn test_init_skips_entry_with_bad_monitor_address() {
        let mut cfg = chain_entry("ETH", Some("http://127.0.0.1:8545"));
        cfg.monitor.push(MonitorConfig {
            wallet_address: "not-an-address".to_string(),
            token_address: None,
            token_decimals: 18,
        });

        let registry = ChainRegistry::init(&[cfg]).await;
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn test_required_confirmations_default_for_unknown_chain() {
        let registry = ChainRegistry::init(&[chain_entry("ETH", Some("http://127.0.0.1:8545"))]).await;

        assert_eq!(registry.required_confirmations("ETH"), 3);
        assert_eq!(
            registry.required_confirmations("UNKNOWN"),
            DEFAULT_REQUIRED_CONFIRMATIONS
        );
        assert!(registry.monitors("UNKNOWN").is_empty());
    }

    #[tokio::test]
    async fn test_monitors_parse_mixed_case_addresses() {
        let mut cfg = chain_entry("ETH", Some("http://127.0.0.1:8545"));
        cfg.monitor.push(MonitorConfig {
            wallet_address: "0xD8DA6BF26964AF9D7EED9E03E53415D37AA96045".to_string(),
            token_address: Some("0xa0b86991c6218b36c1d19d4a2e9eb0ce3606eb48".to_string()),
            token_decimals: 6,
        });

        let registry = ChainRegistry::init(&[cfg]).await;
        let monitors = registry.monitors("ETH");
        assert_eq!(monitors.len(), 1);
        assert_eq!(
            monitors[0].wallet_address,
            "0xd8da6bf26964af9d7eed9e03e53415d37aa96045"
                .parse::<Address>()
                .unwrap()
        );
        assert_eq!(monitors[0].token_decimals, 6);
    }
}
