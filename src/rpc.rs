//! Chain RPC clients.
//!
//! Two client flavors per chain: `RpcClient` over HTTP for request/response
//! calls (head queries, block bodies, bounded log queries) and
//! `StreamClient` over WebSocket for pubsub subscriptions (new heads,
//! filtered logs). Both are thin wrappers around `alloy` providers; retry
//! policy lives with the callers, which know which failures abort a tick
//! and which back off.

use crate::error::RpcError;
use crate::events;
use alloy::primitives::Address;
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::pubsub::Subscription;
use alloy::rpc::types::{Block, Filter, Header, Log};
use alloy::transports::ws::WsConnect;
use tracing::info;

/// Request/response JSON-RPC client over HTTP. Cheap to clone.
#[derive(Clone)]
pub struct RpcClient {
    provider: DynProvider,
    url: String,
}

impl RpcClient {
    /// Build the client. The underlying connection is lazy; this only fails
    /// on an unparseable endpoint URL.
    pub fn connect(url: &str) -> Result<Self, RpcError> {
        let parsed = url
            .parse()
            .map_err(|_| RpcError::Endpoint(url.to_string()))?;
        let provider = ProviderBuilder::new().connect_http(parsed).erased();
        Ok(Self {
            provider,
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Current chain head height.
    pub async fn block_number(&self) -> Result<u64, RpcError> {
        self.provider
            .get_block_number()
            .await
            .map_err(RpcError::transport)
    }

    /// Fetch a block with full transaction bodies. `None` when the node
    /// does not (yet) have the block.
    pub async fn block_with_transactions(&self, height: u64) -> Result<Option<Block>, RpcError> {
        self.provider
            .get_block_by_number(height.into())
            .full()
            .await
            .map_err(RpcError::transport)
    }

    /// Bounded query for ERC-20 `Transfer` logs of one token contract in a
    /// single block (`fromBlock = toBlock = height`).
    pub async fn transfer_logs_in_block(
        &self,
        token: Address,
        height: u64,
    ) -> Result<Vec<Log>, RpcError> {
        let filter = Filter::new()
            .address(token)
            .event_signature(events::transfer_topic())
            .from_block(height)
            .to_block(height);
        self.provider
            .get_logs(&filter)
            .await
            .map_err(RpcError::transport)
    }
}

/// Pubsub JSON-RPC client over WebSocket. Created only for chains with a
/// configured streaming endpoint, and only if the initial connection
/// succeeds.
#[derive(Clone)]
pub struct StreamClient {
    provider: DynProvider,
    url: String,
}

impl StreamClient {
    pub async fn connect(url: &str) -> Result<Self, RpcError> {
        let ws = WsConnect::new(url);
        let provider = ProviderBuilder::new()
            .connect_ws(ws)
            .await
            .map_err(RpcError::transport)?
            .erased();
        info!("WS client connected: {}", url);
        Ok(Self {
            provider,
            url: url.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Subscribe to new block headers.
    pub async fn subscribe_blocks(&self) -> Result<Subscription<Header>, RpcError> {
        self.provider
            .subscribe_blocks()
            .await
            .map_err(|e| RpcError::Subscribe(e.to_string()))
    }

    /// Subscribe to ERC-20 `Transfer` logs of one token contract,
    /// open-ended from the current head.
    pub async fn subscribe_transfer_logs(
        &self,
        token: Address,
    ) -> Result<Subscription<Log>, RpcError> {
        let filter = Filter::new()
            .address(token)
            .event_signature(events::transfer_topic());
        self.provider
            .subscribe_logs(&filter)
            .await
            .map_err(|e| RpcError::Subscribe(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_connect_rejects_invalid_url() {
        assert!(RpcClient::connect("not a url").is_err());
    }

    #[test]
    fn test_connect_is_lazy() {
        // No listener on this port; construction must still succeed.
        let client = RpcClient::connect("http://127.0.0.1:1").unwrap();
        assert_eq!(client.url(), "http://127.0.0.1:1");
    }
}
